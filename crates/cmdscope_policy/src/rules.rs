//! Security rules and rule sets.

use serde::{Deserialize, Serialize};

/// A forbidden-pattern rule applied to expanded values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Regular expression matched against the whole value
    pub pattern: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SecurityRule {
    /// Create a forbidden pattern rule.
    pub fn forbidden_pattern(
        id: impl Into<String>,
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            pattern: pattern.into(),
            enabled: true,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A set of security rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<SecurityRule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Shell-control constructs that must never survive expansion.
    ///
    /// Only metacharacter sequences are listed. Dashes, dots, slashes, `@`,
    /// `=`, `:` and spaces are always allowed, and a lone `&` inside a word
    /// (URL query strings) is not a background operator.
    pub fn standard() -> Self {
        let mut rules = Self::new("Shell Injection");

        rules.add(
            SecurityRule::forbidden_pattern("command-separator", "Command Separator", ";")
                .with_description("';' sequences a second command"),
        );
        rules.add(
            SecurityRule::forbidden_pattern("logical-and", "AND Chaining", "&&")
                .with_description("'&&' chains a second command"),
        );
        rules.add(
            SecurityRule::forbidden_pattern("pipe", "Pipe", r"\|")
                .with_description("'|' or '||' pipes or chains into a second command"),
        );
        rules.add(
            SecurityRule::forbidden_pattern("background", "Background Operator", r"(?:^|\s)&(?:\s|$)")
                .with_description("a standalone '&' backgrounds a command"),
        );
        rules.add(
            SecurityRule::forbidden_pattern("subshell-substitution", "Command Substitution", r"\$\(")
                .with_description("'$(' starts command substitution"),
        );
        rules.add(
            SecurityRule::forbidden_pattern("backtick-substitution", "Backtick Substitution", "`")
                .with_description("backticks start command substitution"),
        );
        rules.add(
            SecurityRule::forbidden_pattern("output-redirection", "Output Redirection", ">")
                .with_description("'>' redirects output"),
        );
        rules.add(
            SecurityRule::forbidden_pattern("input-redirection", "Input Redirection", "<")
                .with_description("'<' redirects input"),
        );
        rules.add(
            SecurityRule::forbidden_pattern("line-break", "Line Break", r"[\r\n]")
                .with_description("a line break terminates the current command"),
        );

        rules
    }

    /// Add a rule to the set.
    pub fn add(&mut self, rule: SecurityRule) {
        self.rules.push(rule);
    }

    pub fn enabled(&self) -> impl Iterator<Item = &SecurityRule> {
        self.rules.iter().filter(|r| r.enabled)
    }
}
