//! Advisory warnings collected during resolution.

use std::fmt;

use serde::Serialize;

/// A non-fatal finding. Warnings never block resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    UnusedTemplateParameter {
        scope: String,
        template: String,
        param: String,
    },
    EmptyGlobalAllowlist,
    RedundantAllowlist {
        scope: String,
    },
    AllowlistedVariableUnset {
        scope: String,
        name: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnusedTemplateParameter {
                scope,
                template,
                param,
            } => write!(
                f,
                "{}: parameter '{}' is not used by template '{}'",
                scope, param, template
            ),
            Warning::EmptyGlobalAllowlist => write!(
                f,
                "global: env_allowlist is empty; all process environment references are rejected"
            ),
            Warning::RedundantAllowlist { scope } => write!(
                f,
                "{}: env_allowlist is identical to the inherited list and can be removed",
                scope
            ),
            Warning::AllowlistedVariableUnset { scope, name } => write!(
                f,
                "{}: allowlisted variable '{}' is not set in the process environment",
                scope, name
            ),
        }
    }
}
