//! Error types for the policy module.

use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that can occur during policy evaluation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// A fully expanded value matched a dangerous pattern. The value itself is
    /// not carried because it may hold a secret.
    #[error("Unsafe value for {name}: matches rule '{rule}' ({description})")]
    UnsafeValue {
        name: String,
        rule: String,
        description: String,
    },

    #[error("Invalid rule pattern in '{rule}': {message}")]
    InvalidPattern { rule: String, message: String },
}
