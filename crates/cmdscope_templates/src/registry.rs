//! Template registry with collision detection.

use std::collections::BTreeMap;

use cmdscope_spec::{check_name_syntax, parse_risk_level, Template, RESERVED_PREFIX};
use tracing::debug;

use crate::binder::{classify_env_entry, EnvShape};
use crate::error::{TemplateError, TemplateResult};
use crate::placeholder::{parse_placeholders, PlaceholderKind};

/// Check a template definition before it is registered.
pub fn validate_template(name: &str, template: &Template) -> TemplateResult<()> {
    check_name_syntax(name).map_err(|e| TemplateError::InvalidTemplateName {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    if name.starts_with(RESERVED_PREFIX) {
        return Err(TemplateError::ReservedTemplateName(name.to_string()));
    }
    if template.cmd.trim().is_empty() {
        return Err(TemplateError::EmptyCommand(name.to_string()));
    }

    let no_spread = |raw: &str, field: &str| -> TemplateResult<()> {
        let parsed = parse_placeholders(raw)?;
        if let Some(p) = parsed.placeholders().find(|p| p.kind == PlaceholderKind::ArraySpread) {
            return Err(TemplateError::ArrayInMixedContext {
                template: name.to_string(),
                param: p.name.clone(),
                field: field.to_string(),
            });
        }
        Ok(())
    };

    no_spread(&template.cmd, "cmd")?;
    if let Some(workdir) = &template.workdir {
        no_spread(workdir, "workdir")?;
    }

    for (i, arg) in template.args.iter().enumerate() {
        let parsed = parse_placeholders(arg)?;
        if parsed.sole_placeholder().is_none() {
            no_spread(arg, &format!("args[{}]", i))?;
        }
    }

    for (i, entry) in template.env.iter().enumerate() {
        let parsed = parse_placeholders(entry)?;
        let spread = match classify_env_entry(name, entry, &parsed)? {
            EnvShape::Pair { value, .. } => value
                .placeholders()
                .find(|p| p.kind == PlaceholderKind::ArraySpread)
                .map(|p| p.name.clone()),
            EnvShape::Spread(_) | EnvShape::Sole(_) => None,
        };
        if let Some(param) = spread {
            return Err(TemplateError::ArrayInMixedContext {
                template: name.to_string(),
                param,
                field: format!("env[{}]", i),
            });
        }
    }

    parse_risk_level(template.risk_level.as_deref()).map_err(|e| {
        TemplateError::InvalidRiskLevel {
            template: name.to_string(),
            message: e.to_string(),
        }
    })?;

    Ok(())
}

#[derive(Debug, Clone)]
struct Entry {
    template: Template,
    source: String,
}

/// Registry of templates merged from every source.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Entry>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the templates declared in one source.
    pub fn from_map(
        templates: &BTreeMap<String, Template>,
        source: &str,
    ) -> TemplateResult<Self> {
        let mut registry = Self::new();
        for (name, template) in templates {
            registry.register(name, template.clone(), source)?;
        }
        Ok(registry)
    }

    /// Validate and register a template. Names must be unique across sources.
    pub fn register(
        &mut self,
        name: &str,
        template: Template,
        source: impl Into<String>,
    ) -> TemplateResult<()> {
        let source = source.into();
        if let Some(existing) = self.templates.get(name) {
            return Err(TemplateError::DuplicateTemplateName {
                name: name.to_string(),
                first: existing.source.clone(),
                second: source,
            });
        }

        validate_template(name, &template)?;
        debug!("Registered template '{}' from {}", name, source);
        self.templates
            .insert(name.to_string(), Entry { template, source });
        Ok(())
    }

    /// Merge another registry into this one.
    pub fn merge(&mut self, other: TemplateRegistry) -> TemplateResult<()> {
        for (name, entry) in other.templates {
            if let Some(existing) = self.templates.get(&name) {
                return Err(TemplateError::DuplicateTemplateName {
                    name,
                    first: existing.source.clone(),
                    second: entry.source,
                });
            }
            self.templates.insert(name, entry);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name).map(|e| &e.template)
    }

    /// Where a template was defined.
    pub fn source(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(|e| e.source.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Template names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Template)> {
        self.templates
            .iter()
            .map(|(name, entry)| (name.as_str(), &entry.template))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut registry = TemplateRegistry::new();
        registry
            .register("rsync", Template::new("/usr/bin/rsync"), "config")
            .unwrap();
        assert!(registry.contains("rsync"));
        assert_eq!(registry.source("rsync"), Some("config"));
        assert_eq!(registry.names(), vec!["rsync"]);
    }

    #[test]
    fn test_duplicate_reports_both_sources() {
        let mut a = TemplateRegistry::new();
        a.register("deploy", Template::new("a"), "base.yaml").unwrap();
        let mut b = TemplateRegistry::new();
        b.register("deploy", Template::new("b"), "extra.yaml").unwrap();

        match a.merge(b).unwrap_err() {
            TemplateError::DuplicateTemplateName {
                name,
                first,
                second,
            } => {
                assert_eq!(name, "deploy");
                assert_eq!(first, "base.yaml");
                assert_eq!(second, "extra.yaml");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validate_template_names() {
        assert!(matches!(
            validate_template("__internal", &Template::new("x")),
            Err(TemplateError::ReservedTemplateName(_))
        ));
        assert!(matches!(
            validate_template("bad name", &Template::new("x")),
            Err(TemplateError::InvalidTemplateName { .. })
        ));
        assert!(matches!(
            validate_template("empty", &Template::new("  ")),
            Err(TemplateError::EmptyCommand(_))
        ));
    }

    #[test]
    fn test_validate_template_structure() {
        assert!(validate_template(
            "ok",
            &Template::new("tool")
                .with_args(["${@flags}", "--out=${?out}"])
                .with_env(["${@extra}", "MODE=${mode}"])
                .with_workdir("/srv/${name}")
        )
        .is_ok());

        assert!(matches!(
            validate_template("t", &Template::new("${@cmd}")),
            Err(TemplateError::ArrayInMixedContext { ref field, .. }) if field == "cmd"
        ));
        assert!(matches!(
            validate_template("t", &Template::new("x").with_workdir("${@dirs}")),
            Err(TemplateError::ArrayInMixedContext { ref field, .. }) if field == "workdir"
        ));
        assert!(matches!(
            validate_template("t", &Template::new("x").with_args(["-f${@files}"])),
            Err(TemplateError::ArrayInMixedContext { .. })
        ));
        assert!(matches!(
            validate_template("t", &Template::new("x").with_env(["${key}=v"])),
            Err(TemplateError::PlaceholderInEnvKey { .. })
        ));
        assert!(validate_template("t", &Template::new("x").with_env(["${?extra}", "${pair}"])).is_ok());
        assert!(matches!(
            validate_template("t", &Template::new("x").with_env(["NOEQUALS"])),
            Err(TemplateError::MalformedEnvEntry { .. })
        ));
        assert!(matches!(
            validate_template("t", &Template::new("x").with_risk_level("critical")),
            Err(TemplateError::InvalidRiskLevel { .. })
        ));
    }
}
