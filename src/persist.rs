//! Config-file persistence: saving `set`/`alias` command files and running
//! them back through the pipeline.
//!
//! A config file is just a command script: comments, one `set` line per
//! persistent CVar and one `alias` line per alias, exactly what the save
//! routine emits. Loading executes the file immediately (not buffered), so
//! the default `set`/`alias` commands must be registered for a reload to
//! restore anything.

use std::io::{BufRead, Write};

use tracing::debug;

use crate::core::console::Console;
use crate::error::ConsoleError;

/// Filename used by `saveConfig`/`reloadConfig` when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "default.cfg";

impl Console {
    /// Write every persistent CVar and every alias to `filename` through
    /// the file I/O collaborator, then clear all modified bits.
    pub fn save_config(&mut self, filename: &str) -> Result<(), ConsoleError> {
        let io_err = |e: std::io::Error| ConsoleError::IoFailed {
            path: filename.to_string(),
            message: e.to_string(),
        };

        let mut out = self
            .io
            .open_write(filename)
            .map_err(|e| self.sink.error(io_err(e)))?;

        let write_all = |out: &mut Box<dyn Write>, console: &Console| -> std::io::Result<()> {
            out.write_all(
                b"#\n# File automatically generated; do not modify.\n#\n",
            )?;

            if !console.cvars.is_empty() {
                out.write_all(b"\n# CVars:\n")?;
                for cvar in console.cvars.iter() {
                    if cvar.is_persistent() {
                        writeln!(out, "{}", cvar.config_line())?;
                    }
                }
            }

            if console.cmds.alias_count() > 0 {
                out.write_all(b"\n# Command aliases:\n")?;
                for cmd in console.cmds.iter() {
                    if let Some(line) = cmd.config_line() {
                        writeln!(out, "{line}")?;
                    }
                }
            }

            out.write_all(b"\n")
        };

        write_all(&mut out, self).map_err(|e| self.sink.error(io_err(e)))?;
        drop(out);

        // Everything is synchronized with persistent storage now.
        self.cvars.clear_all_modified();
        debug!(file = filename, "config saved");
        Ok(())
    }

    /// Load and execute a config file line by line. Blank lines and lines
    /// starting with `#` or `//` are skipped; with `echo` each remaining
    /// line is printed to the terminal before running. Errors in individual
    /// lines do not abort the file.
    pub fn exec_config_file(&mut self, filename: &str, echo: bool) -> Result<(), ConsoleError> {
        let reader = self.io.open_read(filename).map_err(|e| {
            self.sink.error(ConsoleError::IoFailed {
                path: filename.to_string(),
                message: e.to_string(),
            })
        })?;

        // Collect up front so handlers are free to touch the I/O
        // collaborator while the lines execute.
        let lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

        let mut executed = 0usize;
        for (number, line) in lines.iter().enumerate() {
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            if echo {
                let message = format!("{filename}({}): {line}", number + 1);
                self.print_ln(&message);
            }
            self.exec_now(line);
            executed += 1;
        }

        debug!(file = filename, lines = executed, "config executed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::install_default_commands;
    use crate::core::command::ExecMode;
    use crate::core::cvar::CVarFlags;
    use crate::term::MemoryTerm;

    fn quiet_console() -> Console {
        let console = Console::new().with_term(Box::new(MemoryTerm::new()));
        console.silence_errors(true);
        console
    }

    #[test]
    fn test_save_emits_set_and_alias_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.cfg");
        let path = path.to_str().unwrap();

        let mut console = quiet_console();
        console
            .cvars_mut()
            .register_int("fps_max", "", CVarFlags::PERSISTENT, 144, 1, 1000)
            .unwrap();
        console
            .cvars_mut()
            .register_string("player", "", CVarFlags::PERSISTENT, "ace", &[])
            .unwrap();
        console
            .cvars_mut()
            .register_int("session", "", CVarFlags::VOLATILE, 1, 0, 0)
            .unwrap();
        console
            .create_alias("fast", "set fps_max 300", ExecMode::Immediate, "go fast")
            .unwrap();

        console.save_config(path).unwrap();

        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("set fps_max 144"));
        assert!(contents.contains("set player \"ace\""));
        assert!(!contents.contains("session"));
        assert!(contents.contains("alias fast \"set fps_max 300\" -immediate \"go fast\""));
    }

    #[test]
    fn test_save_clears_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.cfg");

        let mut console = quiet_console();
        console
            .cvars_mut()
            .register_int("fps_max", "", CVarFlags::PERSISTENT, 144, 1, 1000)
            .unwrap();
        console.cvars_mut().find_mut("fps_max").unwrap().set_int(60).unwrap();
        assert!(console.cvars().any_modified());

        console.save_config(path.to_str().unwrap()).unwrap();
        assert!(!console.cvars().any_modified());
    }

    #[test]
    fn test_exec_config_file_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cfg");
        std::fs::write(
            &path,
            "# comment\n\n// another comment\nset user.name \"zed\" -persistent\nbogus command\nset user.level 3\n",
        )
        .unwrap();

        let mut console = quiet_console();
        install_default_commands(&mut console).unwrap();
        console.exec_config_file(path.to_str().unwrap(), false).unwrap();

        // Both sets landed despite the bogus line between them.
        assert_eq!(console.cvars().get_string("user.name"), "zed");
        assert_eq!(console.cvars().get_int("user.level"), 3);
    }

    #[test]
    fn test_exec_config_file_missing_reports() {
        let mut console = quiet_console();
        assert!(matches!(
            console.exec_config_file("no/such/file.cfg", false),
            Err(ConsoleError::IoFailed { .. })
        ));
    }

    #[test]
    fn test_config_round_trip_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round.cfg");
        let path = path.to_str().unwrap();

        let mut first = quiet_console();
        install_default_commands(&mut first).unwrap();
        first
            .cvars_mut()
            .register_int("fps_max", "frame cap", CVarFlags::PERSISTENT, 144, 1, 1000)
            .unwrap();
        first
            .cvars_mut()
            .register_string("player", "", CVarFlags::PERSISTENT, "ace", &[])
            .unwrap();
        first.exec_now("set fps_max 60");
        first.exec_now("set user.tag hero -persistent");
        first
            .create_alias("fast", "set fps_max 300", ExecMode::Immediate, "")
            .unwrap();
        first.save_config(path).unwrap();

        // A fresh console with the same registrations picks the state up.
        let mut second = quiet_console();
        install_default_commands(&mut second).unwrap();
        second
            .cvars_mut()
            .register_int("fps_max", "frame cap", CVarFlags::PERSISTENT, 144, 1, 1000)
            .unwrap();
        second
            .cvars_mut()
            .register_string("player", "", CVarFlags::PERSISTENT, "ace", &[])
            .unwrap();
        second.exec_config_file(path, false).unwrap();

        assert_eq!(second.cvars().get_int("fps_max"), 60);
        assert_eq!(second.cvars().get_string("player"), "ace");

        // The user-defined variable is recreated with its flags.
        let tag = second.cvars().find("user.tag").unwrap();
        assert_eq!(tag.value_string(), "hero");
        assert!(tag.flags().contains(CVarFlags::PERSISTENT));
        assert!(tag.flags().contains(CVarFlags::USER_DEFINED));

        // The alias came back too.
        let alias = second.commands().find("fast").unwrap();
        assert_eq!(alias.alias_target().unwrap().0, "set fps_max 300");
    }
}
