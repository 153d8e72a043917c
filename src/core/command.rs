//! Console commands: handler variants, metadata and the command registry.
//!
//! A command wraps one of four handler forms: a plain function pointer, a
//! capturing closure, a bound method (a receiver object implementing
//! [`CommandReceiver`]) or an alias that re-enters the pipeline with stored
//! text. Handlers are stored apart from the metadata so dispatch can take a
//! handler out, hand it `&mut Console`, and put it back afterwards.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::core::args::CommandArgs;
use crate::core::console::Console;
use crate::core::index::{CasePolicy, NameIndex};
use crate::error::{ConsoleError, DuplicateKind};
use crate::hooks::ErrorSink;

/// Maximum command name length; names must be strictly shorter.
pub const MAX_COMMAND_NAME_LEN: usize = 32;

/// Mask value for [`CommandRegistry::disable_with_flags`] that suppresses
/// every command regardless of its flags.
pub const DISABLE_ALL: u32 = u32::MAX;

/// How command text enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Run immediately, bypassing the command buffer.
    Immediate,
    /// Prepend to the command buffer; runs on the next buffered pass.
    Insert,
    /// Append to the command buffer; runs on the next buffered pass.
    #[default]
    Append,
}

impl ExecMode {
    /// The `-append`-style flag word used in config files.
    pub fn flag_word(self) -> &'static str {
        match self {
            ExecMode::Immediate => "-immediate",
            ExecMode::Insert => "-insert",
            ExecMode::Append => "-append",
        }
    }

    /// Parse a `-append`-style flag word.
    pub fn from_flag_word(word: &str) -> Option<Self> {
        match word {
            "-immediate" => Some(ExecMode::Immediate),
            "-insert" => Some(ExecMode::Insert),
            "-append" => Some(ExecMode::Append),
            _ => None,
        }
    }
}

/// Plain function handler.
pub type CommandFn = fn(&mut Console, &CommandArgs);

/// Argument completion hook: partial argument and output cap in, matches
/// (capped) and total count out.
pub type ArgCompletionFn = Box<dyn Fn(&Console, &str, usize) -> (Vec<String>, usize)>;

/// Bound-method command handler: an object registered as the receiver of
/// one or more commands.
pub trait CommandReceiver {
    /// Execute the command.
    fn exec_command(&mut self, console: &mut Console, args: &CommandArgs);

    /// Complete a partial argument. Defaults to no matches.
    fn complete_argument(
        &self,
        _console: &Console,
        _partial: &str,
        _max: usize,
    ) -> (Vec<String>, usize) {
        (Vec::new(), 0)
    }
}

/// The executable part of a registered command.
pub(crate) enum CommandAction {
    Function(CommandFn),
    Closure(Box<dyn FnMut(&mut Console, &CommandArgs)>),
    Method(Rc<RefCell<dyn CommandReceiver>>),
}

pub(crate) struct HandlerEntry {
    pub(crate) action: CommandAction,
    pub(crate) completion: Option<ArgCompletionFn>,
}

impl HandlerEntry {
    pub(crate) fn invoke(&mut self, console: &mut Console, args: &CommandArgs) {
        match &mut self.action {
            CommandAction::Function(f) => f(console, args),
            CommandAction::Closure(c) => c(console, args),
            CommandAction::Method(receiver) => match receiver.try_borrow_mut() {
                Ok(mut r) => r.exec_command(console, args),
                Err(_) => {
                    console.sink().report(format_args!(
                        "{}: receiver is already executing, skipping reentrant call",
                        args.command_name()
                    ));
                }
            },
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum CommandKind {
    Handler,
    Alias { target: Box<str>, mode: ExecMode },
}

/// Metadata of a registered command.
#[derive(Debug, Clone)]
pub struct Command {
    name: Box<str>,
    desc: Box<str>,
    flags: u32,
    min_args: Option<u32>,
    max_args: Option<u32>,
    pub(crate) kind: CommandKind,
}

impl Command {
    /// Command name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description, empty if none was given.
    #[inline]
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Opaque user flag bits.
    #[inline]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Replace the flag bits.
    pub fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }

    /// Minimum accepted argument count, if validated.
    #[inline]
    pub fn min_args(&self) -> Option<u32> {
        self.min_args
    }

    /// Maximum accepted argument count, if validated.
    #[inline]
    pub fn max_args(&self) -> Option<u32> {
        self.max_args
    }

    /// Is this command an alias?
    pub fn is_alias(&self) -> bool {
        matches!(self.kind, CommandKind::Alias { .. })
    }

    /// Aliased command text and execution mode, for aliases.
    pub fn alias_target(&self) -> Option<(&str, ExecMode)> {
        match &self.kind {
            CommandKind::Alias { target, mode } => Some((target, *mode)),
            CommandKind::Handler => None,
        }
    }

    /// Render an alias as its config-file `alias` line.
    pub fn config_line(&self) -> Option<String> {
        let (target, mode) = self.alias_target()?;
        let mut line = format!("alias {} \"{}\" {}", self.name, target, mode.flag_word());
        if !self.desc.is_empty() {
            line.push_str(&format!(" \"{}\"", self.desc));
        }
        Some(line)
    }
}

/// Builder for command registration.
///
/// ```no_run
/// use devcon::{CommandDef, Console};
///
/// let mut console = Console::new();
/// console
///     .register_command(
///         CommandDef::new("greet", |console, args| {
///             let who = args.get_or(0, "world");
///             console.print_ln(&format!("hello {who}"));
///         })
///         .description("Print a greeting")
///         .max_args(1),
///     )
///     .unwrap();
/// ```
pub struct CommandDef {
    pub(crate) name: String,
    pub(crate) desc: String,
    pub(crate) flags: u32,
    pub(crate) min_args: Option<u32>,
    pub(crate) max_args: Option<u32>,
    pub(crate) action: CommandAction,
    pub(crate) completion: Option<ArgCompletionFn>,
}

impl CommandDef {
    fn with_action(name: impl Into<String>, action: CommandAction) -> Self {
        Self {
            name: name.into(),
            desc: String::new(),
            flags: 0,
            min_args: None,
            max_args: None,
            action,
            completion: None,
        }
    }

    /// Command backed by a plain function pointer.
    pub fn new(name: impl Into<String>, handler: CommandFn) -> Self {
        Self::with_action(name, CommandAction::Function(handler))
    }

    /// Command backed by a capturing closure.
    pub fn closure(
        name: impl Into<String>,
        handler: impl FnMut(&mut Console, &CommandArgs) + 'static,
    ) -> Self {
        Self::with_action(name, CommandAction::Closure(Box::new(handler)))
    }

    /// Command bound to a receiver object's method.
    pub fn method(name: impl Into<String>, receiver: Rc<RefCell<dyn CommandReceiver>>) -> Self {
        Self::with_action(name, CommandAction::Method(receiver))
    }

    /// Set the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    /// Set the opaque flag bits.
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Require at least this many arguments.
    pub fn min_args(mut self, min: u32) -> Self {
        self.min_args = Some(min);
        self
    }

    /// Allow at most this many arguments.
    pub fn max_args(mut self, max: u32) -> Self {
        self.max_args = Some(max);
        self
    }

    /// Install an argument completion hook.
    pub fn completion(
        mut self,
        hook: impl Fn(&Console, &str, usize) -> (Vec<String>, usize) + 'static,
    ) -> Self {
        self.completion = Some(Box::new(hook));
        self
    }
}

/// Check a string against the command naming rules: starts with a letter or
/// underscore, body of letters, digits and underscores, bounded length.
/// Dots are not allowed in command names.
pub fn is_valid_command_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let Some(&first) = bytes.first() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return false;
    }
    if !bytes[1..]
        .iter()
        .all(|&c| c.is_ascii_alphanumeric() || c == b'_')
    {
        return false;
    }
    name.len() < MAX_COMMAND_NAME_LEN
}

/// Keyed store of commands and aliases.
///
/// Command names are case-insensitive by default. Execution goes through
/// [`Console`]; the registry only stores and validates.
pub struct CommandRegistry {
    index: NameIndex<Command>,
    handlers: HashMap<Box<str>, HandlerEntry>,
    disabled_flags: u32,
    alias_count: usize,
    sink: ErrorSink,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Registry with the default (case-insensitive) name policy.
    pub fn new() -> Self {
        Self::with_policy(CasePolicy::Insensitive, ErrorSink::default())
    }

    /// Registry with an explicit name policy and error sink.
    pub fn with_policy(name_case: CasePolicy, sink: ErrorSink) -> Self {
        Self {
            index: NameIndex::new(name_case),
            handlers: HashMap::new(),
            disabled_flags: 0,
            alias_count: 0,
            sink,
        }
    }

    /// Test a string against the command naming rules.
    pub fn is_valid_name(&self, name: &str) -> bool {
        is_valid_command_name(name)
    }

    /// Name equality under the registry's case policy.
    pub fn names_equal(&self, a: &str, b: &str) -> bool {
        self.index.policy().eq(a, b)
    }

    /// Number of registered commands, aliases included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of registered aliases.
    pub fn alias_count(&self) -> usize {
        self.alias_count
    }

    fn validate_new_name(&self, name: &str) -> Result<(), ConsoleError> {
        if !is_valid_command_name(name) {
            return Err(self.sink.error(ConsoleError::InvalidName(name.to_string())));
        }
        if self.index.contains(name) {
            return Err(self.sink.error(ConsoleError::Duplicate {
                name: name.to_string(),
                kind: DuplicateKind::Name,
            }));
        }
        Ok(())
    }

    /// Register a command built with [`CommandDef`].
    pub fn register(&mut self, def: CommandDef) -> Result<(), ConsoleError> {
        self.validate_new_name(&def.name)?;

        let key: Box<str> = self.index.policy().fold(&def.name).into();
        self.handlers.insert(
            key,
            HandlerEntry {
                action: def.action,
                completion: def.completion,
            },
        );

        let name: Box<str> = def.name.into();
        let command = Command {
            name: name.clone(),
            desc: def.desc.into(),
            flags: def.flags,
            min_args: def.min_args,
            max_args: def.max_args,
            kind: CommandKind::Handler,
        };
        self.index.link(&name, command);
        Ok(())
    }

    /// Register an alias: invoking `name` re-enters the pipeline with
    /// `target` under `mode`.
    pub fn create_alias(
        &mut self,
        name: &str,
        target: &str,
        mode: ExecMode,
        desc: &str,
    ) -> Result<(), ConsoleError> {
        if target.is_empty() {
            return Err(self
                .sink
                .error(ConsoleError::ParseError("empty alias command string".into())));
        }
        self.validate_new_name(name)?;

        self.index.link(
            name,
            Command {
                name: name.into(),
                desc: desc.into(),
                flags: 0,
                min_args: None,
                max_args: None,
                kind: CommandKind::Alias {
                    target: target.into(),
                    mode,
                },
            },
        );
        self.alias_count += 1;
        Ok(())
    }

    /// Exact lookup by name.
    pub fn find(&self, name: &str) -> Option<&Command> {
        self.index.get(name)
    }

    /// Exact lookup by name, mutable.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.index.get_mut(name)
    }

    /// Commands whose name starts with `prefix`: up to `max` sorted
    /// results plus the total match count.
    pub fn find_partial(&self, prefix: &str, max: usize) -> (Vec<&Command>, usize) {
        let (ids, total) = self.index.find_partial(prefix, max);
        (ids.into_iter().map(|id| self.index.value(id)).collect(), total)
    }

    /// Like [`find_partial`](Self::find_partial) but with owned names.
    pub fn find_partial_names(&self, prefix: &str, max: usize) -> (Vec<String>, usize) {
        let (ids, total) = self.index.find_partial(prefix, max);
        (
            ids.into_iter()
                .map(|id| self.index.name(id).to_string())
                .collect(),
            total,
        )
    }

    /// Commands whose flags intersect `flags`, sorted, plus the total.
    pub fn find_with_flags(&self, flags: u32, max: usize) -> (Vec<&Command>, usize) {
        let (ids, total) = self.index.find_with_flags(flags, max, |c| c.flags);
        (ids.into_iter().map(|id| self.index.value(id)).collect(), total)
    }

    /// Walk all commands, most recently registered first.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.index.iter().map(|(_, c)| c)
    }

    /// Call `visit` for each command until it returns `false`.
    pub fn enumerate(&self, mut visit: impl FnMut(&Command) -> bool) {
        for cmd in self.iter() {
            if !visit(cmd) {
                return;
            }
        }
    }

    /// Remove a command or alias by name. Returns false when absent.
    pub fn remove(&mut self, name: &str) -> bool {
        if !is_valid_command_name(name) {
            self.sink.report(format_args!(
                "'{name}' is not a valid command name! Nothing to remove."
            ));
            return false;
        }
        match self.index.unlink(name) {
            Some(cmd) => {
                if cmd.is_alias() {
                    self.alias_count -= 1;
                } else {
                    self.handlers.remove(self.index.policy().fold(name).as_ref());
                }
                true
            }
            None => false,
        }
    }

    /// Remove a command only if it is an alias; fails on normal commands.
    pub fn remove_alias(&mut self, name: &str) -> bool {
        let is_alias = self.find(name).is_some_and(|cmd| cmd.is_alias());
        is_alias && self.remove(name)
    }

    /// Remove every command and alias.
    pub fn remove_all(&mut self) {
        self.index.clear();
        self.handlers.clear();
        self.alias_count = 0;
    }

    /// Remove every alias; normal commands are untouched.
    pub fn remove_all_aliases(&mut self) {
        let aliases: Vec<String> = self
            .iter()
            .filter(|c| c.is_alias())
            .map(|c| c.name().to_string())
            .collect();
        for name in aliases {
            self.remove(&name);
        }
    }

    /// Suppress execution of every command whose flags intersect `flags`.
    /// [`DISABLE_ALL`] suppresses everything.
    pub fn disable_with_flags(&mut self, flags: u32) {
        self.disabled_flags = flags;
    }

    /// Restore execution of all commands.
    pub fn enable_all(&mut self) {
        self.disabled_flags = 0;
    }

    /// The currently disabled flag mask.
    pub fn disabled_flags(&self) -> u32 {
        self.disabled_flags
    }

    /// Argument completion for a command: its hook, or the receiver's
    /// completion method for bound-method commands.
    pub fn argument_completion(
        &self,
        console: &Console,
        name: &str,
        partial: &str,
        max: usize,
    ) -> (Vec<String>, usize) {
        let key = self.index.policy().fold(name);
        match self.handlers.get(key.as_ref()) {
            Some(entry) => match (&entry.completion, &entry.action) {
                (Some(hook), _) => hook(console, partial, max),
                (None, CommandAction::Method(receiver)) => match receiver.try_borrow() {
                    Ok(r) => r.complete_argument(console, partial, max),
                    Err(_) => (Vec::new(), 0),
                },
                _ => (Vec::new(), 0),
            },
            None => (Vec::new(), 0),
        }
    }

    pub(crate) fn take_handler(&mut self, name: &str) -> Option<(Box<str>, HandlerEntry)> {
        let key: Box<str> = self.index.policy().fold(name).into();
        let entry = self.handlers.remove(&key)?;
        Some((key, entry))
    }

    pub(crate) fn put_handler(&mut self, key: Box<str>, entry: HandlerEntry) {
        self.handlers.insert(key, entry);
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("len", &self.len())
            .field("aliases", &self.alias_count)
            .field("disabled_flags", &self.disabled_flags)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> CommandRegistry {
        CommandRegistry::with_policy(CasePolicy::Insensitive, ErrorSink::new(Box::new(|_| {})))
    }

    fn noop(_: &mut Console, _: &CommandArgs) {}

    #[test]
    fn test_command_name_rules() {
        assert!(is_valid_command_name("listCmds"));
        assert!(is_valid_command_name("_debug"));
        assert!(is_valid_command_name("cmd_2"));

        assert!(!is_valid_command_name(""));
        assert!(!is_valid_command_name("9cmd"));
        assert!(!is_valid_command_name("has space"));
        assert!(!is_valid_command_name("dotted.name"));
        assert!(!is_valid_command_name(&"x".repeat(MAX_COMMAND_NAME_LEN)));
        assert!(is_valid_command_name(&"x".repeat(MAX_COMMAND_NAME_LEN - 1)));
    }

    #[test]
    fn test_register_and_find_case_insensitive() {
        let mut reg = quiet();
        reg.register(CommandDef::new("listCmds", noop).description("list"))
            .unwrap();

        assert!(reg.find("listcmds").is_some());
        assert_eq!(reg.find("LISTCMDS").unwrap().name(), "listCmds");
        assert_eq!(reg.len(), 1);
        assert!(!reg.find("listCmds").unwrap().is_alias());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut reg = quiet();
        reg.register(CommandDef::new("echo", noop)).unwrap();
        assert!(matches!(
            reg.register(CommandDef::new("ECHO", noop)),
            Err(ConsoleError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_alias_bookkeeping() {
        let mut reg = quiet();
        reg.register(CommandDef::new("quit", noop)).unwrap();
        reg.create_alias("q", "quit", ExecMode::Immediate, "shortcut")
            .unwrap();

        assert_eq!(reg.alias_count(), 1);
        let alias = reg.find("q").unwrap();
        assert!(alias.is_alias());
        assert_eq!(alias.alias_target(), Some(("quit", ExecMode::Immediate)));
        assert_eq!(
            alias.config_line().unwrap(),
            "alias q \"quit\" -immediate \"shortcut\""
        );

        // remove_alias refuses normal commands.
        assert!(!reg.remove_alias("quit"));
        assert!(reg.remove_alias("q"));
        assert_eq!(reg.alias_count(), 0);
        assert!(reg.find("q").is_none());
    }

    #[test]
    fn test_remove_all_aliases_keeps_commands() {
        let mut reg = quiet();
        reg.register(CommandDef::new("one", noop)).unwrap();
        reg.create_alias("a1", "one", ExecMode::Append, "").unwrap();
        reg.create_alias("a2", "one; one", ExecMode::Insert, "").unwrap();

        reg.remove_all_aliases();
        assert_eq!(reg.alias_count(), 0);
        assert_eq!(reg.len(), 1);
        assert!(reg.find("one").is_some());
    }

    #[test]
    fn test_empty_alias_text_rejected() {
        let mut reg = quiet();
        assert!(reg.create_alias("a", "", ExecMode::Append, "").is_err());
    }

    #[test]
    fn test_disable_mask() {
        let mut reg = quiet();
        reg.disable_with_flags(0b10);
        assert_eq!(reg.disabled_flags(), 0b10);
        reg.enable_all();
        assert_eq!(reg.disabled_flags(), 0);
    }

    #[test]
    fn test_find_partial_names() {
        let mut reg = quiet();
        for name in ["histView", "histClear", "histSave", "exit"] {
            reg.register(CommandDef::new(name, noop)).unwrap();
        }

        let (names, total) = reg.find_partial_names("hist", 8);
        assert_eq!(total, 3);
        assert_eq!(names, ["histClear", "histSave", "histView"]);
    }

    #[test]
    fn test_exec_mode_flag_words() {
        assert_eq!(ExecMode::Append.flag_word(), "-append");
        assert_eq!(ExecMode::from_flag_word("-insert"), Some(ExecMode::Insert));
        assert_eq!(ExecMode::from_flag_word("-bogus"), None);
    }
}
