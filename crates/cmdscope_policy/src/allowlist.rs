//! Environment allowlist inheritance.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a scope arrived at its effective allowlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllowlistMode {
    /// No list declared; the parent's effective list applies.
    Inherit,
    /// A non-empty list declared; it replaces the parent's list.
    Explicit,
    /// An empty list declared; every process variable is denied.
    Reject,
}

impl fmt::Display for AllowlistMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowlistMode::Inherit => write!(f, "inherit"),
            AllowlistMode::Explicit => write!(f, "explicit"),
            AllowlistMode::Reject => write!(f, "reject"),
        }
    }
}

/// The effective allowlist of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowlistResolution {
    mode: AllowlistMode,
    #[serde(rename = "effective_list")]
    effective: BTreeSet<String>,
}

impl AllowlistResolution {
    /// Resolve a scope's allowlist from its own declaration and its parent's
    /// resolution. A root scope without a declaration allows nothing.
    pub fn resolve(own: Option<&[String]>, parent: Option<&AllowlistResolution>) -> Self {
        match own {
            None => Self {
                mode: AllowlistMode::Inherit,
                effective: parent.map(|p| p.effective.clone()).unwrap_or_default(),
            },
            Some([]) => Self {
                mode: AllowlistMode::Reject,
                effective: BTreeSet::new(),
            },
            Some(names) => Self {
                mode: AllowlistMode::Explicit,
                effective: names.iter().cloned().collect(),
            },
        }
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.effective.contains(name)
    }

    pub fn mode(&self) -> AllowlistMode {
        self.mode
    }

    /// Allowed names in sorted order.
    pub fn effective_list(&self) -> Vec<String> {
        self.effective.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.effective.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_root_without_declaration_allows_nothing() {
        let global = AllowlistResolution::resolve(None, None);
        assert_eq!(global.mode(), AllowlistMode::Inherit);
        assert!(global.is_empty());
        assert!(!global.is_allowed("HOME"));
    }

    #[test]
    fn test_inherit_explicit_reject() {
        let global = AllowlistResolution::resolve(Some(&names(&["HOME", "PATH"])), None);
        assert_eq!(global.mode(), AllowlistMode::Explicit);

        let inherited = AllowlistResolution::resolve(None, Some(&global));
        assert_eq!(inherited.mode(), AllowlistMode::Inherit);
        assert!(inherited.is_allowed("HOME"));

        let explicit = AllowlistResolution::resolve(Some(&names(&["USER"])), Some(&global));
        assert!(explicit.is_allowed("USER"));
        assert!(!explicit.is_allowed("HOME"));

        let reject = AllowlistResolution::resolve(Some(&[]), Some(&global));
        assert_eq!(reject.mode(), AllowlistMode::Reject);
        assert!(!reject.is_allowed("HOME"));
    }

    #[test]
    fn test_reject_is_inherited_as_empty() {
        let global = AllowlistResolution::resolve(Some(&names(&["HOME"])), None);
        let group = AllowlistResolution::resolve(Some(&[]), Some(&global));
        let command = AllowlistResolution::resolve(None, Some(&group));
        assert!(!command.is_allowed("HOME"));
    }

    #[test]
    fn test_effective_list_sorted() {
        let r = AllowlistResolution::resolve(Some(&names(&["PATH", "HOME", "PATH"])), None);
        assert_eq!(r.effective_list(), names(&["HOME", "PATH"]));
    }
}
