//! Core console components: registries, tokenizer, buffer and pipeline.
//!
//! Dependencies flow leaves-first: the name index under both registries,
//! the tokenizer and buffer under the pipeline, the [`Console`] facade on
//! top.

pub mod args;
pub mod buffer;
pub mod command;
pub mod console;
pub mod cvar;
pub mod cvar_registry;
pub mod index;
pub mod pipeline;

pub use args::{CommandArgs, MAX_COMMAND_ARGS, MAX_COMMAND_ARG_STR_LEN};
pub use buffer::{CommandBuffer, COMMAND_BUFFER_CAPACITY, COMMAND_SEPARATOR};
pub use command::{
    is_valid_command_name, ArgCompletionFn, Command, CommandDef, CommandFn, CommandReceiver,
    CommandRegistry, ExecMode, DISABLE_ALL, MAX_COMMAND_NAME_LEN,
};
pub use console::{Console, ConsolePolicies};
pub use cvar::{
    float_to_string, int_to_string, is_valid_cvar_name, parse_float, parse_int, CVar, CVarFlags,
    CVarKind, EnumConst, NumberFormat, ValueCompletionFn,
};
pub use cvar_registry::{CVarId, CVarRegistry};
pub use index::CasePolicy;
pub use pipeline::{EXEC_ALL, EXPANSION_RECURSION_LIMIT, MAX_REENTRANT_COMMANDS};
