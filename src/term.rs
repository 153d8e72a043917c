//! Terminal output seam.
//!
//! The console never touches a TTY directly. Everything it prints goes
//! through the [`Term`] trait, so the same core drives a raw Unix terminal,
//! a game overlay or a test capture buffer. Decoding keystrokes is the
//! embedder's job; see [`Key`](crate::editor::Key) for the input side.

use std::cell::RefCell;
use std::io::{self, IsTerminal, Write};
use std::rc::Rc;

/// Output backend for the console and the line editor.
///
/// Only `print` is required. The editor's redraw protocol is plain text
/// (`\r`, blanks and the newline marker), so a dumb byte sink is enough.
pub trait Term {
    /// Print a string verbatim, no newline appended.
    fn print(&mut self, text: &str);

    /// Print a string followed by a newline.
    fn print_ln(&mut self, text: &str) {
        self.print(text);
        self.print("\n");
    }

    /// Clear the backing screen, if there is one.
    fn clear_screen(&mut self) {}

    /// Store a string in the clipboard, if one exists.
    fn set_clipboard(&mut self, _text: &str) {}

    /// Fetch the clipboard contents, if any.
    fn clipboard(&mut self) -> Option<String> {
        None
    }
}

/// Default backend: writes to stdout, flushing after every call so the
/// editor's partial-line redraws show up immediately.
#[derive(Debug, Default)]
pub struct StdoutTerm {
    clipboard: String,
}

impl StdoutTerm {
    /// Create a stdout-backed terminal.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Term for StdoutTerm {
    fn print(&mut self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn clear_screen(&mut self) {
        // ANSI clear + home. Good enough for the terminals we care about.
        self.print("\x1b[2J\x1b[H");
    }

    fn set_clipboard(&mut self, text: &str) {
        // Process-local clipboard; real OS integration belongs to the
        // embedder's Term implementation.
        self.clipboard = text.to_string();
    }

    fn clipboard(&mut self) -> Option<String> {
        if self.clipboard.is_empty() {
            None
        } else {
            Some(self.clipboard.clone())
        }
    }
}

/// In-memory backend used by tests and headless embedders.
///
/// The captured output is shared, so it stays readable after the terminal
/// is boxed into a [`Console`](crate::Console):
///
/// ```
/// use devcon::{Console, MemoryTerm};
///
/// let term = MemoryTerm::new();
/// let log = term.log();
/// let mut console = Console::new().with_term(Box::new(term));
/// console.print_ln("hello");
/// assert_eq!(log.borrow().as_str(), "hello\n");
/// ```
#[derive(Debug, Default)]
pub struct MemoryTerm {
    out: Rc<RefCell<String>>,
    clipboard: Rc<RefCell<String>>,
    cleared: usize,
}

impl MemoryTerm {
    /// Create an empty capture terminal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to everything printed so far.
    pub fn log(&self) -> Rc<RefCell<String>> {
        Rc::clone(&self.out)
    }

    /// Shared handle to the fake clipboard.
    pub fn clipboard_handle(&self) -> Rc<RefCell<String>> {
        Rc::clone(&self.clipboard)
    }
}

impl Term for MemoryTerm {
    fn print(&mut self, text: &str) {
        self.out.borrow_mut().push_str(text);
    }

    fn clear_screen(&mut self) {
        self.out.borrow_mut().clear();
        self.cleared += 1;
    }

    fn set_clipboard(&mut self, text: &str) {
        *self.clipboard.borrow_mut() = text.to_string();
    }

    fn clipboard(&mut self) -> Option<String> {
        let s = self.clipboard.borrow();
        if s.is_empty() {
            None
        } else {
            Some(s.clone())
        }
    }
}

/// ANSI color codes, empty when stdout or stderr is redirected.
pub mod color {
    use super::*;

    /// True when both stdout and stderr are attached to a terminal.
    pub fn enabled() -> bool {
        io::stdout().is_terminal() && io::stderr().is_terminal()
    }

    macro_rules! ansi {
        ($($name:ident => $code:literal),* $(,)?) => {
            $(
                /// ANSI escape for this color, or `""` when redirected.
                pub fn $name() -> &'static str {
                    if enabled() { $code } else { "" }
                }
            )*
        };
    }

    ansi! {
        restore => "\x1b[0;1m",
        red     => "\x1b[31;1m",
        green   => "\x1b[32;1m",
        yellow  => "\x1b[33;1m",
        blue    => "\x1b[34;1m",
        magenta => "\x1b[35;1m",
        cyan    => "\x1b[36;1m",
        white   => "\x1b[37;1m",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_term_capture() {
        let mut term = MemoryTerm::new();
        let log = term.log();

        term.print("abc");
        term.print_ln("def");
        assert_eq!(log.borrow().as_str(), "abcdef\n");

        term.clear_screen();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_memory_term_clipboard() {
        let mut term = MemoryTerm::new();
        assert_eq!(term.clipboard(), None);

        term.set_clipboard("copy me");
        assert_eq!(term.clipboard().as_deref(), Some("copy me"));
    }
}
