//! Error types for reference expansion.

use thiserror::Error;

/// Result type alias for expansion.
pub type ExpandResult<T> = Result<T, ExpandError>;

/// Errors raised while parsing or resolving `%{name}` references.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpandError {
    #[error("Invalid escape sequence {sequence:?} at position {position}")]
    InvalidEscapeSequence { sequence: String, position: usize },

    #[error("Unclosed variable reference: {fragment:?}")]
    UnclosedVariableReference { fragment: String },

    #[error("Empty variable name at position {position}")]
    EmptyVariableName { position: usize },

    #[error("Invalid variable name {name:?} at position {position}")]
    InvalidVariableName { name: String, position: usize },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Circular reference: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("Maximum recursion depth {limit} exceeded while expanding {name}")]
    MaxRecursionDepthExceeded { name: String, limit: usize },

    #[error("{scope}: {variable} references {external}, which is not in the env allowlist")]
    AllowlistViolation {
        scope: String,
        variable: String,
        external: String,
    },
}
