//! Error types for templates.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while loading, validating or binding templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Duplicate template name {name:?}: defined in {first} and {second}")]
    DuplicateTemplateName {
        name: String,
        first: String,
        second: String,
    },

    #[error("Invalid template name {name:?}: {reason}")]
    InvalidTemplateName { name: String, reason: String },

    #[error("Template name {0:?} is reserved (starts with '__')")]
    ReservedTemplateName(String),

    #[error("Template {0}: cmd cannot be empty")]
    EmptyCommand(String),

    #[error("Unclosed placeholder: {fragment:?}")]
    UnclosedPlaceholder { fragment: String },

    #[error("Empty placeholder name in {field:?}")]
    EmptyPlaceholderName { field: String },

    #[error("Invalid parameter name {name:?}: {reason}")]
    InvalidParameterName { name: String, reason: String },

    #[error("Template {template}: required parameter {param:?} is missing")]
    RequiredParamMissing { template: String, param: String },

    #[error("Template {template}: parameter {param:?} in {field} must be {expected}, got {actual}")]
    TemplateTypeMismatch {
        template: String,
        param: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Template {template}: array parameter {param:?} must be the whole value of {field}")]
    ArrayInMixedContext {
        template: String,
        param: String,
        field: String,
    },

    #[error("Template {template}: placeholder in env key of {entry:?}")]
    PlaceholderInEnvKey { template: String, entry: String },

    #[error("Template {template}: malformed env entry {entry:?} in {source_desc} (expected KEY=VALUE)")]
    MalformedEnvEntry {
        template: String,
        entry: String,
        source_desc: String,
    },

    #[error("Template {template}: invalid env key {key:?} in {source_desc}: {reason}")]
    InvalidEnvKey {
        template: String,
        key: String,
        source_desc: String,
        reason: String,
    },

    #[error("Template {template}: duplicate env key {key:?} from {first} and {second}")]
    DuplicateEnvVariable {
        template: String,
        key: String,
        first: String,
        second: String,
    },

    #[error("Template {template}: {message}")]
    InvalidRiskLevel { template: String, message: String },

    #[error("Failed to read templates from {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
