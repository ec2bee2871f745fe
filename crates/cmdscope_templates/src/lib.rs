//! # cmdscope_templates
//!
//! Reusable command templates.
//!
//! Templates use a placeholder grammar of their own:
//!
//! - `${name}`: required scalar parameter
//! - `${?name}`: optional scalar; a field holding only this placeholder is
//!   dropped when the parameter is absent or empty
//! - `${@name}`: array spread; must be a whole `args` or `env` entry
//!
//! [`TemplateBinder::bind`] substitutes parameters and produces a
//! [`BoundCommand`] whose fields still carry `%{...}` references for the
//! scope pass. [`TemplateRegistry`] merges template sources and rejects name
//! collisions.

pub mod binder;
pub mod error;
pub mod loader;
pub mod placeholder;
pub mod registry;

pub use binder::{BoundCommand, TemplateBinder};
pub use error::{TemplateError, TemplateResult};
pub use loader::TemplateLoader;
pub use placeholder::{parse_placeholders, FieldPart, ParsedField, Placeholder, PlaceholderKind};
pub use registry::{validate_template, TemplateRegistry};
