//! Error types for scope resolution.

use cmdscope_expand::ExpandError;
use cmdscope_policy::PolicyError;
use cmdscope_spec::SpecError;
use cmdscope_templates::TemplateError;
use thiserror::Error;

/// Result type alias for resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised while resolving a configuration.
///
/// Scope-bound variants carry the scope label (`global`, `group:<name>`,
/// `command:<group>/<name>`) and the field being processed.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{scope}: {field}: {source}")]
    Expansion {
        scope: String,
        field: String,
        #[source]
        source: ExpandError,
    },

    #[error("{scope}: {field}: {source}")]
    UnsafeValue {
        scope: String,
        field: String,
        #[source]
        source: PolicyError,
    },

    #[error("{scope}: {field}: {source}")]
    Declaration {
        scope: String,
        field: String,
        #[source]
        source: SpecError,
    },

    #[error("{scope}: {field}: {source}")]
    Template {
        scope: String,
        field: String,
        #[source]
        source: TemplateError,
    },

    #[error("{scope}: template {template:?} not found")]
    TemplateNotFound { scope: String, template: String },

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Security policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Spec error: {0}")]
    Spec(#[from] SpecError),

    #[error("Template error: {0}")]
    Templates(#[from] TemplateError),
}

impl ResolveError {
    /// Scope label, for scope-bound errors.
    pub fn scope(&self) -> Option<&str> {
        match self {
            ResolveError::Expansion { scope, .. }
            | ResolveError::UnsafeValue { scope, .. }
            | ResolveError::Declaration { scope, .. }
            | ResolveError::Template { scope, .. }
            | ResolveError::TemplateNotFound { scope, .. } => Some(scope),
            _ => None,
        }
    }

    /// Field being processed, for scope-bound errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            ResolveError::Expansion { field, .. }
            | ResolveError::UnsafeValue { field, .. }
            | ResolveError::Declaration { field, .. }
            | ResolveError::Template { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn expand_error(&self) -> Option<&ExpandError> {
        match self {
            ResolveError::Expansion { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn template_error(&self) -> Option<&TemplateError> {
        match self {
            ResolveError::Template { source, .. } | ResolveError::Templates(source) => Some(source),
            _ => None,
        }
    }

    pub fn spec_error(&self) -> Option<&SpecError> {
        match self {
            ResolveError::Declaration { source, .. } | ResolveError::Spec(source) => Some(source),
            _ => None,
        }
    }
}
