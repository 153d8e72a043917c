//! Command tokenizer.
//!
//! Splits a single command text (no semicolons at this stage) into the
//! command name plus an ordered argument list. Double quotes open a quoted
//! region; single quotes may open one too, or appear literally inside a
//! double-quoted region. Matching quotes enclosing a token are stripped.

use crate::hooks::ErrorSink;

/// Maximum number of argument strings for a single command.
pub const MAX_COMMAND_ARGS: usize = 64;

/// Maximum total length in bytes of a command's argument text.
pub const MAX_COMMAND_ARG_STR_LEN: usize = 2048;

/// A tokenized command: name plus arguments.
///
/// ```
/// use devcon::{CommandArgs, ErrorSink};
///
/// let args = CommandArgs::parse(r#"cmd "hello 'world'" arg2"#, &ErrorSink::default());
/// assert_eq!(args.command_name(), "cmd");
/// assert_eq!(args.get(0), Some("hello 'world'"));
/// assert_eq!(args.get(1), Some("arg2"));
/// assert_eq!(args.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    name: String,
    args: Vec<String>,
}

impl CommandArgs {
    /// Tokenize a command string. Capacity overruns and an unterminated
    /// quote are reported through `sink`; already collected tokens remain
    /// usable either way.
    pub fn parse(text: &str, sink: &ErrorSink) -> Self {
        let mut out = Self::default();
        out.parse_into(text, sink);
        out
    }

    /// Build from pre-split argv-style strings; the first entry is the
    /// command/program name.
    pub fn from_args<'a>(argv: impl IntoIterator<Item = &'a str>, sink: &ErrorSink) -> Self {
        let mut out = Self::default();
        let mut used = 0usize;
        for (i, arg) in argv.into_iter().enumerate() {
            if used + arg.len() >= MAX_COMMAND_ARG_STR_LEN {
                sink.report(format_args!(
                    "Command argument string too long! Max is {} characters.",
                    MAX_COMMAND_ARG_STR_LEN - 1
                ));
                break;
            }
            used += arg.len() + 1;
            if i == 0 {
                out.name = arg.to_string();
            } else if !out.push_arg(arg, sink) {
                break;
            }
        }
        out
    }

    fn parse_into(&mut self, text: &str, sink: &ErrorSink) {
        let bytes = text.as_bytes();

        let mut quote_count = 0usize;
        let mut quoted = false;
        let mut single_quote = false;
        let mut first_arg = true;
        let mut arg_start: Option<usize> = None;
        let mut used = 0usize;
        let mut done = false;

        let mut i = 0;
        while i < bytes.len() && !done {
            match bytes[i] {
                b'"' => {
                    quote_count += 1;
                    quoted = quote_count & 1 == 1;
                    arg_start.get_or_insert(i);
                }
                // Single quotes start a block only outside a double-quoted
                // one, and close only the block they opened.
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
                    arg_start.get_or_insert(i);
                }
                b' ' | b'\t' | b'\n' | b'\r' if !quoted => {
                    if let Some(start) = arg_start.take() {
                        done = !self.take_token(&text[start..i], &mut first_arg, &mut used, sink);
                    }
                }
                _ => {
                    arg_start.get_or_insert(i);
                }
            }
            i += 1;
        }

        // End reached with an open quote? The tokens so far are still
        // usable; failing is up to the command handler.
        if quoted {
            sink.report(format_args!(
                "Attention! Command string ended with open quotation block!"
            ));
        }

        if let Some(start) = arg_start {
            self.take_token(&text[start..], &mut first_arg, &mut used, sink);
        }
    }

    /// Returns false once a capacity limit aborts further collection.
    fn take_token(
        &mut self,
        token: &str,
        first_arg: &mut bool,
        used: &mut usize,
        sink: &ErrorSink,
    ) -> bool {
        if *used + token.len() >= MAX_COMMAND_ARG_STR_LEN {
            sink.report(format_args!(
                "Command argument string too long! Max is {} characters.",
                MAX_COMMAND_ARG_STR_LEN - 1
            ));
            return false;
        }
        *used += token.len() + 1;

        // Strip one pair of enclosing quotes; the tokenizer guarantees the
        // opening one, the closing one may be missing on malformed input.
        let token = if token.len() >= 2 && (token.starts_with('"') || token.starts_with('\'')) {
            &token[1..token.len() - 1]
        } else {
            token
        };

        if *first_arg {
            self.name = token.to_string();
            *first_arg = false;
            true
        } else {
            self.push_arg(token, sink)
        }
    }

    fn push_arg(&mut self, arg: &str, sink: &ErrorSink) -> bool {
        if self.args.len() == MAX_COMMAND_ARGS {
            sink.report(format_args!("Too many arguments! Ignoring extraneous ones..."));
            return false;
        }
        self.args.push(arg.to_string());
        true
    }

    /// The first token: the command or program name.
    #[inline]
    pub fn command_name(&self) -> &str {
        &self.name
    }

    /// Number of arguments, not counting the command name.
    #[inline]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// True when there are no arguments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Argument by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(|s| s.as_str())
    }

    /// Argument by index, or a default.
    #[inline]
    pub fn get_or<'a>(&'a self, index: usize, default: &'a str) -> &'a str {
        self.get(index).unwrap_or(default)
    }

    /// Try to parse an argument as a `FromStr` type.
    pub fn parse_arg<T: std::str::FromStr>(&self, index: usize) -> Option<T> {
        self.get(index).and_then(|s| s.parse().ok())
    }

    /// Iterate over the arguments.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|s| s.as_str())
    }

    /// Join all arguments with a separator.
    pub fn join(&self, separator: &str) -> String {
        self.args.join(separator)
    }

    /// Join the arguments starting at `start`.
    pub fn join_from(&self, start: usize, separator: &str) -> String {
        self.args.get(start..).unwrap_or(&[]).join(separator)
    }
}

impl std::ops::Index<usize> for CommandArgs {
    type Output = str;

    fn index(&self, index: usize) -> &Self::Output {
        &self.args[index]
    }
}
