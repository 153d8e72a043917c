//! Error type shared by every fallible console operation.
//!
//! Nothing in this crate panics across the public API: operations either
//! return a `Result` carrying a [`ConsoleError`] or degrade to the type's
//! zero value after routing the rendered message to the error sink.

use thiserror::Error;

/// All the ways a console operation can fail.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConsoleError {
    /// A CVar or command name does not follow the naming rules.
    #[error("invalid name '{0}'")]
    InvalidName(String),

    /// Registration clashed with an existing entry.
    #[error("'{name}' already registered ({kind})")]
    Duplicate {
        /// The offending name.
        name: String,
        /// What differed between the two registrations.
        kind: DuplicateKind,
    },

    /// Lookup by name found nothing.
    #[error("'{0}' not found")]
    NotFound(String),

    /// Write rejected because the variable is `ReadOnly` or `InitOnly`.
    #[error("CVar '{0}' is read-only")]
    ReadOnly(String),

    /// A range-checked write fell outside the allowed values.
    #[error("value {value} out of range for '{name}' ({detail})")]
    OutOfRange {
        /// The variable that rejected the write.
        name: String,
        /// The rejected value, rendered as text.
        value: String,
        /// Which bound was violated, or the allowed-set summary.
        detail: String,
    },

    /// No conversion available between the requested and stored types.
    #[error("no conversion from \"{value}\" for '{name}'")]
    TypeMismatch {
        /// The variable involved.
        name: String,
        /// The value that could not be converted.
        value: String,
    },

    /// A fixed-capacity buffer could not hold the input.
    #[error("buffer overflow: {0}")]
    BufferOverflow(String),

    /// Malformed command text: unbalanced quotes or parentheses, bad base.
    #[error("parse error: {0}")]
    ParseError(String),

    /// `$()` expansion exceeded the nesting limit.
    #[error("too many reentrant CVar expansions")]
    RecursionLimit,

    /// The command's flags intersect the disabled mask.
    #[error("{0}: command is disabled")]
    Disabled(String),

    /// The buffered-execution loop tripped the runaway threshold.
    #[error("{0} commands executed in sequence, possible reentrant loop")]
    Reentrant(u32),

    /// The file I/O collaborator reported a failure.
    #[error("I/O failed for \"{path}\": {message}")]
    IoFailed {
        /// File the operation targeted.
        path: String,
        /// Rendered I/O error.
        message: String,
    },
}

/// Discriminates the duplicate-registration diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    /// Same name, different flag bits.
    Flags,
    /// Same name and flags, different initial value.
    Value,
    /// Entry is already registered with equal parameters.
    Name,
}

impl std::fmt::Display for DuplicateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateKind::Flags => write!(f, "conflicting flags"),
            DuplicateKind::Value => write!(f, "conflicting value"),
            DuplicateKind::Name => write!(f, "duplicate name"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConsoleError::NotFound("fps".into());
        assert_eq!(err.to_string(), "'fps' not found");

        let err = ConsoleError::Duplicate {
            name: "fps".into(),
            kind: DuplicateKind::Flags,
        };
        assert_eq!(err.to_string(), "'fps' already registered (conflicting flags)");

        let err = ConsoleError::OutOfRange {
            name: "fps".into(),
            value: "500".into(),
            detail: "above maximum (240)".into(),
        };
        assert!(err.to_string().contains("above maximum"));
    }
}
