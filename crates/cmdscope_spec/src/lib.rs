//! # cmdscope_spec
//!
//! Declaration models and configuration reading for cmdscope.
//!
//! Configuration declares a global scope, command groups and commands, each
//! carrying ordered variable declarations (`vars`), environment entries
//! (`env`), imports from the process environment (`from_env`) and an optional
//! `env_allowlist`. Commands either spell out `cmd`/`args`/`env` inline or call
//! a named [`Template`] with parameters.
//!
//! This crate only parses and structurally validates. Expansion happens in
//! `cmdscope_core`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cmdscope_spec::{ConfigReader, ConfigValidator};
//!
//! let config = ConfigReader::from_path("runner.yaml").unwrap();
//! let result = ConfigValidator::validate(&config);
//! for warning in &result.warnings {
//!     eprintln!("warning: {}", warning);
//! }
//! ```

pub mod error;
pub mod models;
pub mod reader;
pub mod validator;

pub use error::{SpecError, SpecResult};
pub use models::*;
pub use reader::ConfigReader;
pub use validator::{
    check_name_syntax, is_name_char, parse_assignment, parse_env_declarations, parse_env_imports,
    parse_risk_level, parse_variable_declarations, validate_command_spec, validate_variable_name,
    ConfigValidator, ValidationResult, RESERVED_PREFIX,
};
