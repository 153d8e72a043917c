//! The console facade: both registries, the command buffer and the
//! collaborator hooks under one roof.
//!
//! Command handlers receive `&mut Console`, so they can read and write
//! CVars, print, and push more command text into the pipeline while they
//! run. Execution entry points live in the pipeline module.

use crate::core::buffer::CommandBuffer;
use crate::core::command::{CommandDef, CommandRegistry, ExecMode};
use crate::core::cvar_registry::CVarRegistry;
use crate::core::index::CasePolicy;
use crate::error::ConsoleError;
use crate::hooks::{ErrorSink, FileIo, StdFileIo};
use crate::term::{color, StdoutTerm, Term};

/// Case policies for a console's registries.
///
/// By default CVar names and value strings are case-sensitive and command
/// names are not.
#[derive(Debug, Clone, Copy)]
pub struct ConsolePolicies {
    /// Policy for CVar name lookup.
    pub cvar_names: CasePolicy,
    /// Policy for CVar value strings (allowed sets, bool spellings, enum
    /// constant names).
    pub cvar_values: CasePolicy,
    /// Policy for command name lookup.
    pub command_names: CasePolicy,
}

impl Default for ConsolePolicies {
    fn default() -> Self {
        Self {
            cvar_names: CasePolicy::Sensitive,
            cvar_values: CasePolicy::Sensitive,
            command_names: CasePolicy::Insensitive,
        }
    }
}

/// An embeddable console: CVar registry, command registry and the buffered
/// command pipeline.
///
/// ```
/// use devcon::{CVarFlags, Console};
///
/// let mut console = Console::new();
/// console
///     .cvars_mut()
///     .register_int("fps_max", "frame cap", CVarFlags::PERSISTENT, 144, 1, 1000)
///     .unwrap();
///
/// assert_eq!(console.cvars().get_int("fps_max"), 144);
/// ```
pub struct Console {
    pub(crate) cvars: CVarRegistry,
    pub(crate) cmds: CommandRegistry,
    pub(crate) buffer: CommandBuffer,
    pub(crate) io: Box<dyn FileIo>,
    pub(crate) term: Box<dyn Term>,
    pub(crate) sink: ErrorSink,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Console with default policies, stdout terminal, `std::fs` file I/O
    /// and the stderr error sink.
    pub fn new() -> Self {
        Self::with_policies(ConsolePolicies::default())
    }

    /// Console with explicit case policies.
    pub fn with_policies(policies: ConsolePolicies) -> Self {
        let sink = ErrorSink::default();
        Self {
            cvars: CVarRegistry::with_policies(
                policies.cvar_names,
                policies.cvar_values,
                sink.clone(),
            ),
            cmds: CommandRegistry::with_policy(policies.command_names, sink.clone()),
            buffer: CommandBuffer::new(),
            io: Box::new(StdFileIo),
            term: Box::new(StdoutTerm::new()),
            sink,
        }
    }

    /// Swap the terminal backend.
    pub fn with_term(mut self, term: Box<dyn Term>) -> Self {
        self.term = term;
        self
    }

    /// Swap the file I/O collaborator.
    pub fn with_file_io(mut self, io: Box<dyn FileIo>) -> Self {
        self.io = io;
        self
    }

    // ----- components -----

    /// The CVar registry.
    pub fn cvars(&self) -> &CVarRegistry {
        &self.cvars
    }

    /// The CVar registry, mutable.
    pub fn cvars_mut(&mut self) -> &mut CVarRegistry {
        &mut self.cvars
    }

    /// The command registry.
    pub fn commands(&self) -> &CommandRegistry {
        &self.cmds
    }

    /// The command registry, mutable. Prefer
    /// [`register_command`](Self::register_command) for registration so
    /// names are cross-checked against the CVar registry.
    pub fn commands_mut(&mut self) -> &mut CommandRegistry {
        &mut self.cmds
    }

    /// The shared error sink.
    pub fn sink(&self) -> &ErrorSink {
        &self.sink
    }

    /// Replace the error handler. `None` restores the stderr default.
    pub fn set_error_handler(&self, handler: Option<Box<dyn FnMut(&str)>>) {
        self.sink.set_handler(handler);
    }

    /// Mute or unmute all error reports.
    pub fn silence_errors(&self, silent: bool) {
        self.sink.silence(silent);
    }

    /// Replace the boolean spelling table used by the CVar registry.
    pub fn set_bool_strings(&self, pairs: &[(&str, &str)]) {
        self.cvars.set_bool_strings(pairs);
    }

    /// The terminal backend.
    pub fn term_mut(&mut self) -> &mut dyn Term {
        self.term.as_mut()
    }

    // ----- registration with cross-checking -----

    /// Register a command, rejecting names that collide with a CVar.
    pub fn register_command(&mut self, def: CommandDef) -> Result<(), ConsoleError> {
        self.check_cvar_collision(&def.name)?;
        self.cmds.register(def)
    }

    /// Create a command alias, rejecting names that collide with a CVar.
    pub fn create_alias(
        &mut self,
        name: &str,
        target: &str,
        mode: ExecMode,
        desc: &str,
    ) -> Result<(), ConsoleError> {
        self.check_cvar_collision(name)?;
        self.cmds.create_alias(name, target, mode, desc)
    }

    fn check_cvar_collision(&self, name: &str) -> Result<(), ConsoleError> {
        if self.cvars.find(name).is_some() {
            self.sink.report(format_args!(
                "A CVar named '{name}' already exists. Cannot declare a new command with this name!"
            ));
            return Err(ConsoleError::Duplicate {
                name: name.to_string(),
                kind: crate::error::DuplicateKind::Name,
            });
        }
        Ok(())
    }

    /// Argument completion for a registered command's partial argument.
    pub fn argument_completion(
        &self,
        command: &str,
        partial: &str,
        max: usize,
    ) -> (Vec<String>, usize) {
        self.cmds.argument_completion(self, command, partial, max)
    }

    // ----- pipeline state -----

    /// True when the command buffer holds pending text.
    pub fn has_buffered_commands(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// The pending command buffer text (separators included).
    pub fn buffered_text(&self) -> &str {
        self.buffer.contents()
    }

    // ----- terminal helpers -----

    /// Print to the attached terminal.
    pub fn print(&mut self, text: &str) {
        self.term.print(text);
    }

    /// Print a line to the attached terminal.
    pub fn print_ln(&mut self, text: &str) {
        self.term.print_ln(text);
    }

    /// Switch the terminal text color (ANSI escape).
    pub fn set_text_color(&mut self, ansi_code: &str) {
        self.term.print(ansi_code);
    }

    /// Restore the default terminal text color.
    pub fn restore_text_color(&mut self) {
        self.term.print(color::restore());
    }

    /// Print a warning line in yellow.
    pub fn print_warning(&mut self, text: &str) {
        self.set_text_color(color::yellow());
        self.term.print_ln(text);
        self.restore_text_color();
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("cvars", &self.cvars.len())
            .field("commands", &self.cmds.len())
            .field("buffered_bytes", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
