//! Redaction of sensitive environment values for logs and reports.

use std::collections::BTreeMap;

pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_MARKERS: &[&str] = &["PASSWORD", "SECRET", "TOKEN", "KEY", "CREDENTIAL", "AUTH"];

/// Whether a variable name looks like it holds a secret.
pub fn is_sensitive_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    SENSITIVE_MARKERS.iter().any(|m| upper.contains(m))
}

/// Copy of `env` with sensitive values replaced by [`REDACTED`].
pub fn redact_env(env: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    env.iter()
        .map(|(k, v)| {
            let value = if is_sensitive_name(k) {
                REDACTED.to_string()
            } else {
                v.clone()
            };
            (k.clone(), value)
        })
        .collect()
}
