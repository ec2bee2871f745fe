//! Process environment access.

use std::collections::BTreeMap;

/// Immutable copy of the process environment taken for one resolution pass.
pub type EnvSnapshot = BTreeMap<String, String>;

/// Source of the process environment.
#[cfg_attr(test, mockall::automock)]
pub trait EnvironmentSource: Send + Sync {
    fn snapshot(&self) -> EnvSnapshot;
}

/// The real process environment. Variables that are not valid UTF-8 are
/// skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    fn snapshot(&self) -> EnvSnapshot {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }
}

/// A fixed environment.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    vars: EnvSnapshot,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvironmentSource for StaticEnvironment {
    fn snapshot(&self) -> EnvSnapshot {
        self.vars.clone()
    }
}
