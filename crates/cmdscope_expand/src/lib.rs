//! # cmdscope_expand
//!
//! Expansion of `%{NAME}` references in declared strings.
//!
//! The expander knows nothing about scopes. It resolves names through a
//! [`Lookup`], recursing into raw bindings with cycle and depth checks, and
//! falls back to an allowlisted view of the process environment when the
//! [`ExpansionContext`] carries one.
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use cmdscope_expand::Expander;
//!
//! let mut vars = HashMap::new();
//! vars.insert("BASE".to_string(), "/opt".to_string());
//! vars.insert("APP".to_string(), "%{BASE}/app".to_string());
//!
//! let expanded = Expander::new(&vars).expand_str("%{APP}/bin").unwrap();
//! assert_eq!(expanded, "/opt/app/bin");
//! ```

pub mod context;
pub mod error;
pub mod expander;
pub mod parser;

pub use context::{ExpansionContext, ExternalEnv, ResolutionChain, MAX_RECURSION_DEPTH};
pub use error::{ExpandError, ExpandResult};
pub use expander::{expand, Binding, Expander, Lookup};
pub use parser::{collect_references, parse_references, Segment};
