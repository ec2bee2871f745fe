//! Error types for declarations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// Errors raised while reading or validating declarations.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Variable name cannot be empty")]
    EmptyVariableName,

    #[error("Invalid variable name {name:?}: {reason}")]
    InvalidVariableName { name: String, reason: String },

    #[error("Variable name {0:?} is reserved (starts with '__')")]
    ReservedVariableName(String),

    #[error("Malformed declaration in {field}: {entry:?} (expected NAME=VALUE)")]
    MalformedDeclaration { field: String, entry: String },

    #[error("Duplicate variable {name:?} in {field}")]
    DuplicateVariable { field: String, name: String },

    #[error("Duplicate env key {key:?} in {field}")]
    DuplicateEnvVariable { field: String, key: String },

    #[error("Duplicate group name {0:?}")]
    DuplicateGroup(String),

    #[error("Duplicate command name {command:?} in group {group:?}")]
    DuplicateCommand { group: String, command: String },

    #[error("group[{group}] command[{command}]: cannot specify both \"template\" ({template}) and {field:?}")]
    TemplateFieldConflict {
        group: String,
        command: String,
        template: String,
        field: String,
    },

    #[error("group[{group}] command[{command}]: required field {field:?} is missing")]
    MissingRequiredField {
        group: String,
        command: String,
        field: String,
    },

    #[error("Invalid risk level {value:?}: {reason}")]
    InvalidRiskLevel { value: String, reason: String },

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
