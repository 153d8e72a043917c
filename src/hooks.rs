//! Collaborator hooks: error sink, file I/O and the boolean string table.
//!
//! All three are per-console values handed to the registries at
//! construction rather than process-wide globals, so parallel consoles in
//! tests cannot step on each other.

use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::rc::Rc;

use crate::error::ConsoleError;
use crate::term::color;

// ========================================================
// Error sink
// ========================================================

type SinkHandler = Box<dyn FnMut(&str)>;

struct SinkState {
    handler: SinkHandler,
    muted: bool,
}

/// Destination for user-facing error messages.
///
/// Cheap to clone; all clones share the same handler and mute switch, so a
/// console and its registries report through one channel. The default
/// handler writes the message to stderr in red.
#[derive(Clone)]
pub struct ErrorSink {
    state: Rc<RefCell<SinkState>>,
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new(Box::new(|message| {
            eprintln!("{}{}{}", color::red(), message, color::restore());
        }))
    }
}

impl ErrorSink {
    /// Create a sink with a custom handler.
    pub fn new(handler: SinkHandler) -> Self {
        Self {
            state: Rc::new(RefCell::new(SinkState {
                handler,
                muted: false,
            })),
        }
    }

    /// Replace the handler. Passing `None` restores the stderr default.
    pub fn set_handler(&self, handler: Option<SinkHandler>) {
        let handler = handler.unwrap_or_else(|| {
            Box::new(|message: &str| {
                eprintln!("{}{}{}", color::red(), message, color::restore());
            })
        });
        self.state.borrow_mut().handler = handler;
    }

    /// Suppress or re-enable all reports.
    pub fn silence(&self, silent: bool) {
        self.state.borrow_mut().muted = silent;
    }

    /// Whether reports are currently suppressed.
    pub fn silenced(&self) -> bool {
        self.state.borrow().muted
    }

    /// Route a message to the handler unless muted.
    pub fn report(&self, message: fmt::Arguments<'_>) {
        let mut state = self.state.borrow_mut();
        if !state.muted {
            (state.handler)(&message.to_string());
        }
    }

    /// Report a [`ConsoleError`] and hand it back, so call sites can write
    /// `return Err(sink.error(err))`.
    pub fn error(&self, err: ConsoleError) -> ConsoleError {
        self.report(format_args!("{err}"));
        err
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink")
            .field("muted", &self.state.borrow().muted)
            .finish_non_exhaustive()
    }
}

// ========================================================
// File I/O
// ========================================================

/// File access collaborator used by config and history persistence.
///
/// Swap it out to read configs from an archive, a virtual filesystem or a
/// test fixture. The returned readers/writers are plain std trait objects;
/// EOF and line iteration come with [`BufRead`].
pub trait FileIo {
    /// Open `path` for text reading.
    fn open_read(&mut self, path: &str) -> io::Result<Box<dyn BufRead>>;

    /// Open (create or truncate) `path` for text writing.
    fn open_write(&mut self, path: &str) -> io::Result<Box<dyn Write>>;
}

/// Default collaborator backed by `std::fs`.
#[derive(Debug, Default)]
pub struct StdFileIo;

impl FileIo for StdFileIo {
    fn open_read(&mut self, path: &str) -> io::Result<Box<dyn BufRead>> {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }

    fn open_write(&mut self, path: &str) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(File::create(path)?))
    }
}

// ========================================================
// Boolean value strings
// ========================================================

/// Spellings that map to boolean values.
///
/// The first pair is canonical for rendering; every pair is accepted when
/// parsing. Shared between a registry and its CVars.
#[derive(Debug, Clone)]
pub struct BoolStrings {
    pairs: Vec<(String, String)>,
}

impl Default for BoolStrings {
    fn default() -> Self {
        Self {
            pairs: [("true", "false"), ("yes", "no"), ("on", "off"), ("1", "0")]
                .iter()
                .map(|&(t, f)| (t.to_string(), f.to_string()))
                .collect(),
        }
    }
}

impl BoolStrings {
    /// Replace the table. The first pair becomes the canonical rendering.
    /// An empty `pairs` restores the defaults.
    pub fn set(&mut self, pairs: &[(&str, &str)]) {
        if pairs.is_empty() {
            *self = Self::default();
        } else {
            self.pairs = pairs
                .iter()
                .map(|&(t, f)| (t.to_string(), f.to_string()))
                .collect();
        }
    }

    /// Canonical spelling for `value`.
    pub fn render(&self, value: bool) -> &str {
        let (t, f) = &self.pairs[0];
        if value {
            t
        } else {
            f
        }
    }

    /// Parse a spelling from any pair. `eq` carries the value-string case
    /// policy of the owning registry.
    pub fn parse(&self, text: &str, eq: impl Fn(&str, &str) -> bool) -> Option<bool> {
        for (t, f) in &self.pairs {
            if eq(t, text) {
                return Some(true);
            }
            if eq(f, text) {
                return Some(false);
            }
        }
        None
    }

    /// Iterate over the (true, false) spelling pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(t, f)| (t.as_str(), f.as_str()))
    }
}

/// Shared handle to a [`BoolStrings`] table.
pub type SharedBoolStrings = Rc<RefCell<BoolStrings>>;
