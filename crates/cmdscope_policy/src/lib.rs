//! # cmdscope_policy
//!
//! Security policy for expanded values.
//!
//! - [`SecurityValidator`] rejects values containing shell-control constructs
//!   after every reference has been substituted.
//! - [`AllowlistResolution`] computes which process environment variables a
//!   scope may read.
//! - [`redact_env`] masks secret-looking values before they are logged.

pub mod allowlist;
pub mod error;
pub mod redact;
pub mod rules;
pub mod validator;

pub use allowlist::{AllowlistMode, AllowlistResolution};
pub use error::{PolicyError, PolicyResult};
pub use redact::{is_sensitive_name, redact_env, REDACTED};
pub use rules::{RuleSet, SecurityRule};
pub use validator::SecurityValidator;
