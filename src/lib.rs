//! An embeddable developer console in the Quake/DOOM tradition.
//!
//! devcon provides three tightly coupled services:
//!
//! - **CVars**: typed configuration variables (int, bool, float, string,
//!   enum) with flags, range enforcement, defaults and full textual
//!   round-tripping
//! - **Commands**: named verbs with argument validation, aliases and a
//!   buffered execution pipeline (immediate / insert / append modes,
//!   `$(cvar)` substitution, `;` separators, line continuation)
//! - **Line editor**: a terminal-agnostic input state machine with history,
//!   Tab completion and the `exit`/`clear`/`hist*` built-ins
//!
//! The core is single-threaded by contract and never touches a TTY: output
//! goes through the [`Term`] seam, files through [`FileIo`], errors through
//! a per-console [`ErrorSink`]. Keystroke decoding stays with the embedder,
//! which feeds decoded [`Key`] events to the editor.
//!
//! # Quick start
//!
//! ```
//! use devcon::prelude::*;
//!
//! let mut console = Console::new();
//! devcon::install_default_commands(&mut console).unwrap();
//!
//! // Register a variable and a command.
//! console
//!     .cvars_mut()
//!     .register_int("fps_max", "frame cap", CVarFlags::PERSISTENT, 144, 1, 1000)
//!     .unwrap();
//! console
//!     .register_command(CommandDef::new("hello", |console, args| {
//!         let who = args.get_or(0, "world").to_string();
//!         console.print_ln(&format!("hello {who}"));
//!     }))
//!     .unwrap();
//!
//! // Drive the pipeline.
//! console.exec_now("set fps_max 60");
//! assert_eq!(console.cvars().get_int("fps_max"), 60);
//!
//! console.exec_append("hello console");
//! console.exec_buffered_commands(devcon::EXEC_ALL);
//! ```

pub mod commands;
pub mod core;
pub mod editor;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod persist;
pub mod term;

pub use commands::install_default_commands;
pub use self::core::{
    float_to_string, int_to_string, is_valid_command_name, is_valid_cvar_name, parse_float,
    parse_int, ArgCompletionFn, CVar, CVarFlags, CVarId, CVarKind, CVarRegistry, CasePolicy,
    Command, CommandArgs, CommandBuffer, CommandDef, CommandFn, CommandReceiver, CommandRegistry,
    Console, ConsolePolicies, EnumConst, ExecMode, NumberFormat, ValueCompletionFn,
    COMMAND_BUFFER_CAPACITY, COMMAND_SEPARATOR, DISABLE_ALL, EXEC_ALL, EXPANSION_RECURSION_LIMIT,
    MAX_COMMAND_ARGS, MAX_COMMAND_ARG_STR_LEN, MAX_COMMAND_NAME_LEN, MAX_REENTRANT_COMMANDS,
};
pub use editor::{
    builtins, BuiltInCmd, Editor, History, Key, HISTORY_CAPACITY, HISTORY_FILE,
    LINE_BUFFER_CAPACITY, MAX_COMPLETION_MATCHES,
};
pub use error::{ConsoleError, DuplicateKind};
pub use hooks::{BoolStrings, ErrorSink, FileIo, StdFileIo};
pub use logging::{log_capture_pair, LogCaptureLayer, LogEvents, LogMessage};
pub use persist::DEFAULT_CONFIG_FILE;
pub use term::{color, MemoryTerm, StdoutTerm, Term};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::core::{
        CVarFlags, CVarKind, CommandArgs, CommandDef, Console, ExecMode, NumberFormat,
    };
    pub use crate::editor::{Editor, Key};
    pub use crate::error::ConsoleError;
    pub use crate::term::Term;
}

// End-to-end scenarios across the editor, pipeline and registries.
#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::{install_default_commands, MemoryTerm, EXEC_ALL};
    use std::cell::RefCell;
    use std::io;
    use std::path::PathBuf;
    use std::rc::Rc;

    /// File I/O collaborator that roots every path in a temp directory, so
    /// fixed filenames like `cmdhist.txt` stay out of the working tree.
    struct TempDirIo {
        root: PathBuf,
        std: crate::StdFileIo,
    }

    impl TempDirIo {
        fn new(dir: &tempfile::TempDir) -> Self {
            Self {
                root: dir.path().to_path_buf(),
                std: crate::StdFileIo,
            }
        }
    }

    impl crate::FileIo for TempDirIo {
        fn open_read(&mut self, path: &str) -> io::Result<Box<dyn io::BufRead>> {
            let full = self.root.join(path);
            self.std.open_read(full.to_str().unwrap())
        }

        fn open_write(&mut self, path: &str) -> io::Result<Box<dyn io::Write>> {
            let full = self.root.join(path);
            self.std.open_write(full.to_str().unwrap())
        }
    }

    fn rig() -> (Editor, Console, Rc<RefCell<String>>) {
        let term = MemoryTerm::new();
        let log = term.log();
        let mut console = Console::new().with_term(Box::new(term));
        console.silence_errors(true);
        install_default_commands(&mut console).unwrap();
        (Editor::new(), console, log)
    }

    fn type_and_submit(editor: &mut Editor, console: &mut Console, line: &str) {
        for ch in line.chars() {
            editor.handle_key(Key::Char(ch), console);
        }
        editor.handle_key(Key::Return, console);
    }

    #[test]
    fn test_interactive_set_and_query_flow() {
        let (mut editor, mut console, log) = rig();
        console
            .cvars_mut()
            .register_int("fps_max", "frame cap", CVarFlags::PERSISTENT, 144, 1, 1000)
            .unwrap();

        // CVar shortcut notation from the editor.
        type_and_submit(&mut editor, &mut console, "fps_max 60");
        assert_eq!(console.cvars().get_int("fps_max"), 60);

        // Bare name prints current and default.
        type_and_submit(&mut editor, &mut console, "fps_max");
        assert!(log.borrow().contains("fps_max is: \"60\"  |  default: \"144\""));
    }

    #[test]
    fn test_editor_drives_buffered_commands_with_substitution() {
        let (mut editor, mut console, log) = rig();
        console
            .cvars_mut()
            .register_string("greeting", "", CVarFlags::NONE, "hi", &[])
            .unwrap();

        type_and_submit(&mut editor, &mut console, "echo $(greeting) there");
        // The editor dispatches user commands in buffered append mode.
        assert!(console.has_buffered_commands());
        console.exec_buffered_commands(EXEC_ALL);
        editor.update(&mut console);

        assert!(log.borrow().contains("hi there"));
    }

    #[test]
    fn test_reentrant_append_order() {
        // Register bomb -> ping through the public surface and verify the
        // canonical bomb, bomb, ping, ping order.
        let (mut editor, mut console, log) = rig();
        let hits = Rc::new(RefCell::new(Vec::new()));

        let h = Rc::clone(&hits);
        console
            .register_command(CommandDef::closure("ping", move |_, _| {
                h.borrow_mut().push("ping");
            }))
            .unwrap();
        let h = Rc::clone(&hits);
        console
            .register_command(CommandDef::closure("bomb", move |console, _| {
                h.borrow_mut().push("bomb");
                console.exec_append("ping");
            }))
            .unwrap();

        type_and_submit(&mut editor, &mut console, "bomb; bomb");
        let ran = console.exec_buffered_commands(EXEC_ALL);

        assert_eq!(ran, 4);
        assert_eq!(hits.borrow().as_slice(), ["bomb", "bomb", "ping", "ping"]);
        drop(log);
    }

    #[test]
    fn test_config_round_trip_equivalent_state() {
        let dir = tempfile::tempdir().unwrap();

        let make_console = || {
            let console = Console::new()
                .with_term(Box::new(MemoryTerm::new()))
                .with_file_io(Box::new(TempDirIo::new(&dir)));
            console.silence_errors(true);
            console
        };
        let register_all = |console: &mut Console| {
            install_default_commands(console).unwrap();
            console
                .cvars_mut()
                .register_int("fps_max", "frame cap", CVarFlags::PERSISTENT, 144, 1, 1000)
                .unwrap();
            console
                .cvars_mut()
                .register_enum(
                    "detail",
                    "",
                    CVarFlags::PERSISTENT | CVarFlags::RANGE_CHECK,
                    0,
                    &[("low", 0), ("high", 1)],
                )
                .unwrap();
        };

        let mut first = make_console();
        register_all(&mut first);
        first.exec_now("set fps_max 60; set detail high");
        first.create_alias("fast", "set fps_max 300", ExecMode::Immediate, "").unwrap();
        first.save_config("round.cfg").unwrap();
        assert!(!first.cvars().any_modified());

        let mut second = make_console();
        register_all(&mut second);
        second.cvars_mut().set_allow_writing_read_only(true);
        second.exec_config_file("round.cfg", false).unwrap();
        second.cvars_mut().set_allow_writing_read_only(false);

        // Equivalent registry state: same names, values, flags, defaults.
        for cvar in first.cvars().iter() {
            let other = second.cvars().find(cvar.name()).unwrap();
            assert!(
                cvar.state_equals(other),
                "state mismatch for {}",
                cvar.name()
            );
        }
        let alias = second.commands().find("fast").unwrap();
        assert_eq!(alias.alias_target().unwrap().0, "set fps_max 300");
    }

    #[test]
    fn test_history_persistence_via_builtins() {
        let dir = tempfile::tempdir().unwrap();

        let term = MemoryTerm::new();
        let mut console = Console::new()
            .with_term(Box::new(term))
            .with_file_io(Box::new(TempDirIo::new(&dir)));
        console.silence_errors(true);
        install_default_commands(&mut console).unwrap();

        let mut editor = Editor::new();
        type_and_submit(&mut editor, &mut console, "echo one");
        type_and_submit(&mut editor, &mut console, "echo two");
        type_and_submit(&mut editor, &mut console, "histSave");
        assert_eq!(editor.history().len(), 3);

        type_and_submit(&mut editor, &mut console, "histClear");
        assert_eq!(editor.history().len(), 0);

        type_and_submit(&mut editor, &mut console, "histLoad");
        let entries: Vec<&str> = editor.history().iter().collect();
        // The load replaces the in-memory history with the saved session.
        assert_eq!(entries, ["echo one", "echo two", "histSave"]);
    }

    #[test]
    fn test_enumeration_order_is_reverse_insertion() {
        let (_, mut console, _) = rig();
        for name in ["one", "two", "three"] {
            console
                .cvars_mut()
                .register_int(name, "", CVarFlags::NONE, 0, 0, 0)
                .unwrap();
        }

        let names: Vec<&str> = console.cvars().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["three", "two", "one"]);
    }

    #[test]
    fn test_removed_cvar_gone_from_lookup_and_enumeration() {
        let (_, mut console, _) = rig();
        console
            .cvars_mut()
            .register_int("doomed", "", CVarFlags::NONE, 0, 0, 0)
            .unwrap();

        assert!(console.cvars_mut().remove("doomed"));
        assert!(console.cvars().find("doomed").is_none());
        assert!(!console.cvars().iter().any(|c| c.name() == "doomed"));
    }

    #[test]
    fn test_buffer_state_after_partial_pass() {
        let (_, mut console, _) = rig();
        console.exec_append("echo a");
        console.exec_append("echo b");
        console.exec_append("echo c");

        assert_eq!(console.exec_buffered_commands(1), 1);
        // The first record is gone, the rest are intact.
        assert_eq!(console.buffered_text(), "echo b;echo c;");
    }

    #[test]
    fn test_custom_bool_strings() {
        let (_, mut console, _) = rig();
        console.set_bool_strings(&[("enabled", "disabled"), ("1", "0")]);
        console
            .cvars_mut()
            .register_bool("cheats", "", CVarFlags::NONE, false)
            .unwrap();

        assert_eq!(console.cvars().get_string("cheats"), "disabled");
        console.exec_now("set cheats enabled");
        assert!(console.cvars().get_bool("cheats"));
        console.exec_now("set cheats 0");
        assert!(!console.cvars().get_bool("cheats"));
    }
}
