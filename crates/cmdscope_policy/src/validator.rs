//! Post-expansion value safety checks.

use regex::Regex;
use tracing::debug;

use crate::error::{PolicyError, PolicyResult};
use crate::rules::{RuleSet, SecurityRule};

/// Checks fully expanded values against a compiled [`RuleSet`].
///
/// The check is purely syntactic. It runs on the final string so that
/// anything pulled in through a reference (including an allowlisted process
/// environment value) is caught where it is used.
#[derive(Debug, Clone)]
pub struct SecurityValidator {
    rules: Vec<(SecurityRule, Regex)>,
}

impl SecurityValidator {
    /// Validator with the standard shell-injection rules.
    pub fn standard() -> PolicyResult<Self> {
        Self::from_rules(&RuleSet::standard())
    }

    /// Compile the enabled rules of a rule set.
    pub fn from_rules(rule_set: &RuleSet) -> PolicyResult<Self> {
        let rules = rule_set
            .enabled()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (rule.clone(), re))
                    .map_err(|e| PolicyError::InvalidPattern {
                        rule: rule.id.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<PolicyResult<Vec<_>>>()?;

        debug!("Compiled {} security rules from '{}'", rules.len(), rule_set.name);
        Ok(Self { rules })
    }

    /// Validate an anonymous value.
    pub fn validate_safe(&self, value: &str) -> PolicyResult<()> {
        self.validate_named("value", value)
    }

    /// Validate a value, naming it in the error.
    pub fn validate_named(&self, name: &str, value: &str) -> PolicyResult<()> {
        match self.rules.iter().find(|(_, re)| re.is_match(value)) {
            Some((rule, _)) => Err(PolicyError::UnsafeValue {
                name: name.to_string(),
                rule: rule.id.clone(),
                description: rule.description.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> SecurityValidator {
        SecurityValidator::standard().unwrap()
    }

    #[test]
    fn test_rejects_shell_control() {
        let v = validator();
        for value in [
            "a; rm -rf /",
            "a && b",
            "a || b",
            "cat x | sh",
            "$(whoami)",
            "`id`",
            "x > /etc/passwd",
            "x < input",
            "sleep 10 &",
            "line1\nline2",
        ] {
            assert!(v.validate_safe(value).is_err(), "should reject {:?}", value);
        }
    }

    #[test]
    fn test_accepts_path_and_argument_characters() {
        let v = validator();
        for value in [
            "/usr/local/bin",
            "--log-level=debug",
            "user@example.com",
            "my file.txt",
            "v1.2.3-rc.1",
            "https://host/path?a=1&b=2",
            "${HOME}",
            "%{literal}",
        ] {
            assert!(v.validate_safe(value).is_ok(), "should accept {:?}", value);
        }
    }

    #[test]
    fn test_error_names_rule() {
        let err = validator().validate_named("TARGET", "a;b").unwrap_err();
        assert!(matches!(
            err,
            PolicyError::UnsafeValue { ref name, ref rule, .. }
                if name == "TARGET" && rule == "command-separator"
        ));
    }

    #[test]
    fn test_invalid_custom_pattern() {
        let mut rules = RuleSet::new("broken");
        rules.add(SecurityRule::forbidden_pattern("bad", "Bad", "("));
        assert!(matches!(
            SecurityValidator::from_rules(&rules),
            Err(PolicyError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let mut rules = RuleSet::new("partial");
        rules.add(SecurityRule::forbidden_pattern("semi", "Semi", ";").disabled());
        let v = SecurityValidator::from_rules(&rules).unwrap();
        assert_eq!(v.rule_count(), 0);
        assert!(v.validate_safe("a;b").is_ok());
    }
}
