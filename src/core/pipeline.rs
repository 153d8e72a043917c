//! Command pipeline: stream splitting, `$()` CVar expansion, execution
//! modes and the buffered execute loop.
//!
//! The loop's central invariant: the buffer is shifted past a command's
//! bytes *before* its handler runs, so a handler may `exec_append` or
//! `exec_insert` more text without corrupting the dispatch cursor.

use crate::core::args::{CommandArgs, MAX_COMMAND_ARG_STR_LEN};
use crate::core::buffer::COMMAND_SEPARATOR;
use crate::core::command::{CommandKind, ExecMode, DISABLE_ALL, MAX_COMMAND_NAME_LEN};
use crate::core::console::Console;
use crate::error::ConsoleError;

/// Pass to [`Console::exec_buffered_commands`] to drain the whole buffer.
pub const EXEC_ALL: u32 = u32::MAX;

/// Commands executed in a single buffered pass before the loop assumes a
/// runaway reentrant command and bails out.
pub const MAX_REENTRANT_COMMANDS: u32 = 999_999;

/// Nesting limit for `$( $(…) )` expansions.
pub const EXPANSION_RECURSION_LIMIT: u32 = 15;

/// One command pulled out of a command stream.
struct Extracted {
    text: String,
    /// Truncation or a failed expansion; the caller discards the rest.
    overflowed: bool,
}

const SEP: u8 = COMMAND_SEPARATOR as u8;

/// Length of the UTF-8 sequence starting with this leading byte.
fn utf8_len(leading: u8) -> usize {
    match leading {
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        b if b >= 0xC0 => 2,
        _ => 1,
    }
}

impl Console {
    // ========================================================
    // Execution entry points
    // ========================================================

    /// Execute `text` immediately, splitting on separators and newlines.
    /// Nothing is buffered.
    pub fn exec_now(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut pos = 0usize;
        while let Some(extracted) = self.extract_next_command(text, &mut pos) {
            if extracted.overflowed {
                self.sink.report(format_args!(
                    "Discarding rest of command line due to malformed string..."
                ));
                break;
            }
            let args = CommandArgs::parse(&extracted.text, &self.sink);
            self.exec_tokenized(&args);
        }
    }

    /// Prepend `text` to the command buffer for a future buffered pass.
    pub fn exec_insert(&mut self, text: &str) {
        let sink = self.sink.clone();
        self.buffer.insert(text, &sink);
    }

    /// Append `text` to the command buffer for a future buffered pass.
    pub fn exec_append(&mut self, text: &str) {
        let sink = self.sink.clone();
        self.buffer.append(text, &sink);
    }

    /// Execute `text` under any of the modes.
    pub fn execute(&mut self, mode: ExecMode, text: &str) {
        match mode {
            ExecMode::Immediate => self.exec_now(text),
            ExecMode::Insert => self.exec_insert(text),
            ExecMode::Append => self.exec_append(text),
        }
    }

    /// Run up to `max` buffered commands ([`EXEC_ALL`] for everything).
    /// Returns the number dispatched.
    ///
    /// Termination, in priority order: overflow during extraction clears
    /// the buffer; [`MAX_REENTRANT_COMMANDS`] clears the buffer and
    /// reports; hitting `max` leaves the remainder buffered; an exhausted
    /// buffer ends the pass (trailing separators are dropped).
    pub fn exec_buffered_commands(&mut self, max: u32) -> u32 {
        if self.buffer.is_empty() || max == 0 {
            return 0;
        }

        let mut executed = 0u32;
        loop {
            let mut contents = self.buffer.take();
            let mut pos = 0usize;
            match self.extract_next_command(&contents, &mut pos) {
                // Only separators and whitespace left; the buffer stays
                // cleared.
                None => break,
                Some(extracted) if extracted.overflowed => {
                    self.sink.report(format_args!(
                        "Discarding rest of command buffer due to malformed command string..."
                    ));
                    break;
                }
                Some(extracted) => {
                    // Shift the consumed bytes off *before* dispatch, so a
                    // reentrant handler sees only its own additions.
                    contents.drain(..pos);
                    self.buffer.restore(contents);

                    let args = CommandArgs::parse(&extracted.text, &self.sink);
                    self.exec_tokenized(&args);
                    executed += 1;

                    if executed == MAX_REENTRANT_COMMANDS {
                        self.buffer.clear();
                        self.sink.error(ConsoleError::Reentrant(executed));
                        break;
                    }
                    if max != EXEC_ALL && executed == max {
                        break;
                    }
                    if self.buffer.is_empty() {
                        break;
                    }
                }
            }
        }
        executed
    }

    /// Process the program's startup arguments (`argv[0]` is skipped).
    ///
    /// `+` tokens split the arguments into sub-commands. `set`/`reset`
    /// sub-commands run immediately inside the init-only override window so
    /// they may target `InitOnly` CVars; everything else is appended to the
    /// buffer.
    pub fn exec_startup_command_line(&mut self, argv: &[&str]) {
        self.cvars.set_allow_writing_init_only(true);

        let mut cmdline = String::new();
        let mut set_cmd = false;

        for arg in argv.iter().skip(1) {
            let mut arg: &str = arg;
            if let Some(stripped) = arg.strip_prefix('+') {
                if !cmdline.is_empty() {
                    if set_cmd {
                        self.exec_now(&cmdline.clone());
                    } else {
                        self.exec_append(&cmdline.clone());
                    }
                }
                cmdline.clear();
                arg = stripped;
                set_cmd =
                    self.cmds.names_equal(arg, "set") || self.cmds.names_equal(arg, "reset");
            }

            if cmdline.len() + arg.len() + 1 >= MAX_COMMAND_ARG_STR_LEN {
                break;
            }
            cmdline.push_str(arg);
            cmdline.push(' ');
        }

        if !cmdline.is_empty() {
            if set_cmd {
                self.exec_now(&cmdline.clone());
            } else {
                self.exec_append(&cmdline.clone());
            }
        }

        self.cvars.set_allow_writing_init_only(false);
    }

    // ========================================================
    // Dispatch
    // ========================================================

    /// Validate and run one tokenized command. Failures are reported and
    /// the command is skipped; the batch continues.
    pub(crate) fn exec_tokenized(&mut self, args: &CommandArgs) {
        let name = args.command_name();
        if name.len() >= MAX_COMMAND_NAME_LEN {
            self.sink.report(format_args!(
                "Command name too long! Max command name length is {MAX_COMMAND_NAME_LEN} characters."
            ));
            return;
        }

        let Some(cmd) = self.cmds.find(name) else {
            self.sink.report(format_args!("{name}: Command not found."));
            return;
        };

        let disabled = self.cmds.disabled_flags();
        if disabled != 0 {
            if disabled == DISABLE_ALL {
                self.sink
                    .report(format_args!("Command execution is globally disabled!"));
                return;
            }
            if cmd.flags() & disabled != 0 {
                self.sink.error(ConsoleError::Disabled(name.to_string()));
                return;
            }
        }

        if let Some(min) = cmd.min_args() {
            if (args.len() as u32) < min {
                self.sink.report(format_args!(
                    "{name}: Not enough arguments! Expected at least {min}."
                ));
                return;
            }
        }
        if let Some(max) = cmd.max_args() {
            if (args.len() as u32) > max {
                self.sink.report(format_args!(
                    "{name}: Too many arguments provided! Expected up to {max}."
                ));
                return;
            }
        }

        // An alias just re-enters the pipeline with its stored text.
        if let CommandKind::Alias { target, mode } = &cmd.kind {
            let (target, mode) = (target.to_string(), *mode);
            self.execute(mode, &target);
            return;
        }

        // Take the handler out for the duration of the call so it can
        // receive `&mut Console`, then put it back.
        let Some((key, mut entry)) = self.cmds.take_handler(name) else {
            self.sink.report(format_args!(
                "{name}: handler is already executing, skipping reentrant call"
            ));
            return;
        };
        entry.invoke(self, args);
        self.cmds.put_handler(key, entry);
    }

    // ========================================================
    // Command-stream splitting
    // ========================================================

    /// Copy the next command out of `input` starting at `*pos`, leaving
    /// `*pos` past the consumed bytes. Returns `None` when only separators
    /// and whitespace remain.
    fn extract_next_command(&self, input: &str, pos: &mut usize) -> Option<Extracted> {
        let bytes = input.as_bytes();

        // Pre-consume leading whitespace and separators left over from a
        // previous pass.
        while *pos < bytes.len() {
            let c = bytes[*pos];
            if c > b' ' && c != SEP {
                break;
            }
            *pos += 1;
        }

        let mut text = String::new();
        let mut overflowed = false;
        let mut quote_count = 0usize;
        let mut quoted = false;
        let mut single_quote = false;
        let mut backslash = false;
        let mut done = false;

        while !done && *pos < bytes.len() && text.len() < MAX_COMMAND_ARG_STR_LEN {
            let c = bytes[*pos];
            match c {
                // Windows carriage returns are silently dropped.
                b'\r' => {
                    *pos += 1;
                    continue;
                }
                // A backslash at the end of a fragment continues onto the
                // next physical line.
                b'\\' => {
                    backslash = true;
                    *pos += 1;
                    continue;
                }
                b'\n' => {
                    done = !backslash && !quoted;
                    backslash = false;
                }
                b'"' => {
                    quote_count += 1;
                    quoted = quote_count & 1 == 1;
                }
                b'\'' => {
                    if !quoted {
                        quote_count += 1;
                        quoted = quote_count & 1 == 1;
                        single_quote = true;
                    } else if single_quote {
                        quote_count += 1;
                        quoted = quote_count & 1 == 1;
                        single_quote = false;
                    }
                }
                c if c == SEP => {
                    done = !quoted;
                }
                b'$' if bytes.get(*pos + 1) == Some(&b'(') => {
                    if self.expand_cvar(input, pos, &mut text, 1).is_err() {
                        // Skip the rest of the broken command; the caller
                        // discards everything already copied.
                        while *pos < bytes.len() && bytes[*pos] != b'\n' && bytes[*pos] != SEP {
                            *pos += 1;
                        }
                        overflowed = true;
                        done = true;
                    }
                    *pos += 1;
                    continue;
                }
                _ => {}
            }

            // A stray backslash not followed by whitespace is a leftover
            // from collapsing a line; drop it.
            if backslash && !(c == b' ' || c == b'\t') {
                backslash = false;
            }

            if !done {
                if c.is_ascii() {
                    text.push(c as char);
                    *pos += 1;
                } else {
                    // Copy a whole multi-byte sequence; all delimiters are
                    // ASCII so `pos` always sits on a char boundary here.
                    let len = utf8_len(c);
                    let end = (*pos + len).min(bytes.len());
                    text.push_str(&input[*pos..end]);
                    *pos = end;
                }
            } else {
                *pos += 1;
            }
        }

        if text.len() >= MAX_COMMAND_ARG_STR_LEN {
            overflowed = true;
            self.sink.report(format_args!(
                "Command string too long! Can't parse all arguments from it..."
            ));
        }

        if text.is_empty() && !overflowed {
            None
        } else {
            Some(Extracted { text, overflowed })
        }
    }

    // ========================================================
    // CVar substitution
    // ========================================================

    /// Expand one `$(name)` occurrence. Entered with `*pos` on the `$`;
    /// leaves it on the closing parenthesis. Nested `$(…)` inside the name
    /// expands recursively up to [`EXPANSION_RECURSION_LIMIT`]. The CVar's
    /// string value is appended to `dest`.
    fn expand_cvar(
        &self,
        input: &str,
        pos: &mut usize,
        dest: &mut String,
        depth: u32,
    ) -> Result<(), ConsoleError> {
        let bytes = input.as_bytes();
        debug_assert_eq!(bytes[*pos], b'$');

        let mut name = String::new();
        let mut parenthesis = 0i32;

        *pos += 1;
        while *pos < bytes.len() {
            let c = bytes[*pos];
            if c == b'\n' || c == SEP {
                break;
            }
            if c == b'(' {
                parenthesis += 1;
            } else if c == b')' {
                parenthesis -= 1;
                break;
            } else if c == b'$' && bytes.get(*pos + 1) == Some(&b'(') {
                if depth == EXPANSION_RECURSION_LIMIT {
                    return Err(self.sink.error(ConsoleError::RecursionLimit));
                }
                self.expand_cvar(input, pos, &mut name, depth + 1)?;
            } else if c > b' ' {
                // Whitespace inside the name is ignored; everything else
                // concatenates into the name.
                if name.len() == MAX_COMMAND_ARG_STR_LEN {
                    return Err(self.sink.error(ConsoleError::BufferOverflow(
                        "CVar name expansion".to_string(),
                    )));
                }
                name.push(c as char);
            }
            *pos += 1;
        }

        if parenthesis != 0 {
            return Err(self.sink.error(ConsoleError::ParseError(
                "unbalanced opening or closing parenthesis in CVar argument expansion".to_string(),
            )));
        }
        if name.is_empty() {
            return Err(self.sink.error(ConsoleError::ParseError(
                "missing CVar name in argument expansion".to_string(),
            )));
        }
        if !self.cvars.is_valid_name(&name) {
            return Err(self.sink.error(ConsoleError::InvalidName(name)));
        }

        let Some(cvar) = self.cvars.find(&name) else {
            return Err(self.sink.error(ConsoleError::NotFound(format!("$({name})"))));
        };

        let value = cvar.value_string();
        if dest.len() + value.len() >= MAX_COMMAND_ARG_STR_LEN {
            return Err(self.sink.error(ConsoleError::BufferOverflow(
                "CVar value expansion".to_string(),
            )));
        }
        dest.push_str(&value);
        Ok(())
    }
}
