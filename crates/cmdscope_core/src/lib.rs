//! # cmdscope_core
//!
//! Scope resolution for cmdscope configurations.
//!
//! Resolution runs in a fixed order: the global scope, then each group on top
//! of the global scope, then each command on top of its group. Every scope's
//! variables are expanded in declaration order and checked by the security
//! validator before they become visible to later declarations. Template
//! commands are bound first and then resolved like inline commands.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cmdscope_core::{ConfigResolver, ResolveOptions};
//! use cmdscope_spec::ConfigReader;
//! use cmdscope_templates::TemplateRegistry;
//!
//! let config = ConfigReader::from_path("runner.yaml").unwrap();
//! let templates = TemplateRegistry::from_map(&config.templates, "runner.yaml").unwrap();
//! let resolution = ConfigResolver::new(&config, &templates)
//!     .resolve(&ResolveOptions::new())
//!     .unwrap();
//!
//! for command in resolution.commands() {
//!     println!("{} {:?}", command.cmd, command.args);
//! }
//! ```

pub mod auto;
pub mod environment;
pub mod error;
pub mod resolver;
pub mod scope;
pub mod warnings;

pub use auto::{AutoVariables, AUTO_DATETIME, AUTO_PID};
pub use environment::{EnvSnapshot, EnvironmentSource, ProcessEnvironment, StaticEnvironment};
pub use error::{ResolveError, ResolveResult};
pub use resolver::{ConfigResolver, Resolution, ResolveOptions, ResolvedCommand, ResolvedGroup};
pub use scope::{LayeredLookup, ResolvedScope, ScopeDeclaration, ScopeResolver};
pub use warnings::Warning;
