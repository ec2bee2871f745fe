//! Parameter binding.
//!
//! Binding turns a template and a call site's parameters into raw command
//! fields. The result still contains `%{...}` references; scope expansion
//! happens afterwards exactly as for inline commands.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use cmdscope_spec::{parse_assignment, validate_variable_name, ParamValue, Template};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{TemplateError, TemplateResult};
use crate::placeholder::{parse_placeholders, FieldPart, ParsedField, Placeholder, PlaceholderKind};

/// A template with all placeholders substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundCommand {
    pub template: String,
    pub cmd: String,
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub workdir: Option<String>,
    pub risk_level: Option<String>,
    /// Supplied parameters no placeholder referenced
    pub unused_params: Vec<String>,
}

/// How a raw env entry is shaped before binding.
#[derive(Debug)]
pub(crate) enum EnvShape<'a> {
    Spread(&'a Placeholder),
    /// A scalar placeholder filling the whole entry; its value must be `KEY=VALUE`
    Sole(&'a Placeholder),
    Pair { key: &'a str, value: ParsedField },
}

/// Classify a raw template env entry. Keys must be free of placeholders.
pub(crate) fn classify_env_entry<'a>(
    template: &str,
    entry: &'a str,
    parsed: &'a ParsedField,
) -> TemplateResult<EnvShape<'a>> {
    if let Some(p) = parsed.sole_placeholder() {
        return Ok(match p.kind {
            PlaceholderKind::ArraySpread => EnvShape::Spread(p),
            _ => EnvShape::Sole(p),
        });
    }

    let Some((key, value)) = parse_assignment(entry) else {
        if parsed.has_placeholders() {
            return Err(TemplateError::PlaceholderInEnvKey {
                template: template.to_string(),
                entry: entry.to_string(),
            });
        }
        return Err(TemplateError::MalformedEnvEntry {
            template: template.to_string(),
            entry: entry.to_string(),
            source_desc: "template env".to_string(),
        });
    };

    if parse_placeholders(key)?.has_placeholders() {
        return Err(TemplateError::PlaceholderInEnvKey {
            template: template.to_string(),
            entry: entry.to_string(),
        });
    }

    Ok(EnvShape::Pair {
        key,
        value: parse_placeholders(value)?,
    })
}

/// Binds call-site parameters into templates.
pub struct TemplateBinder<'a> {
    name: &'a str,
    params: &'a BTreeMap<String, ParamValue>,
    used: BTreeSet<&'a str>,
}

impl<'a> TemplateBinder<'a> {
    /// Bind `params` into the template registered as `name`.
    pub fn bind(
        name: &'a str,
        template: &'a Template,
        params: &'a BTreeMap<String, ParamValue>,
    ) -> TemplateResult<BoundCommand> {
        for param in params.keys() {
            validate_variable_name(param).map_err(|e| TemplateError::InvalidParameterName {
                name: param.clone(),
                reason: e.to_string(),
            })?;
        }

        let mut binder = Self {
            name,
            params,
            used: BTreeSet::new(),
        };

        let cmd = binder.bind_scalar_field(&template.cmd, "cmd")?.unwrap_or_default();
        if cmd.trim().is_empty() {
            return Err(TemplateError::EmptyCommand(name.to_string()));
        }

        let mut args = Vec::with_capacity(template.args.len());
        for (i, arg) in template.args.iter().enumerate() {
            args.extend(binder.bind_list_field(arg, &format!("args[{}]", i))?);
        }

        let env = binder.bind_env(&template.env)?;

        let workdir = match &template.workdir {
            Some(raw) => binder.bind_scalar_field(raw, "workdir")?,
            None => None,
        };

        let unused_params: Vec<String> = params
            .keys()
            .filter(|k| !binder.used.contains(k.as_str()))
            .cloned()
            .collect();
        for param in &unused_params {
            warn!("Template '{}': parameter '{}' is never used", name, param);
        }

        debug!(
            "Bound template '{}' ({} args, {} env entries)",
            name,
            args.len(),
            env.len()
        );

        Ok(BoundCommand {
            template: name.to_string(),
            cmd,
            args,
            env,
            workdir,
            risk_level: template.risk_level.clone(),
            unused_params,
        })
    }

    /// A field that yields at most one value (`cmd`, `workdir`).
    fn bind_scalar_field(&mut self, raw: &str, field: &str) -> TemplateResult<Option<String>> {
        let parsed = parse_placeholders(raw)?;
        if let Some(p) = parsed.placeholders().find(|p| p.kind == PlaceholderKind::ArraySpread) {
            return Err(self.mixed(&p.name, field));
        }
        self.bind_sole_or_text(parsed, field)
    }

    /// An `args` entry: zero, one or many values.
    fn bind_list_field(&mut self, raw: &str, field: &str) -> TemplateResult<Vec<String>> {
        let parsed = parse_placeholders(raw)?;
        if let Some(p) = parsed.sole_placeholder() {
            if p.kind == PlaceholderKind::ArraySpread {
                let name = p.name.clone();
                return self.spread(&name, field);
            }
        }
        Ok(self.bind_sole_or_text(parsed, field)?.into_iter().collect())
    }

    fn bind_sole_or_text(
        &mut self,
        parsed: ParsedField,
        field: &str,
    ) -> TemplateResult<Option<String>> {
        if let Some(p) = parsed.sole_placeholder() {
            let p = p.clone();
            return match self.lookup_scalar(&p, field, true)? {
                Some(value) if !value.is_empty() => Ok(Some(value)),
                Some(value) if p.kind == PlaceholderKind::Required => Ok(Some(value)),
                _ => Ok(None),
            };
        }
        self.bind_text(&parsed, field).map(Some)
    }

    /// Substitute placeholders embedded in text. Optional ones become empty.
    fn bind_text(&mut self, parsed: &ParsedField, field: &str) -> TemplateResult<String> {
        let mut out = String::new();
        for part in &parsed.parts {
            match part {
                FieldPart::Text(text) => out.push_str(text),
                FieldPart::Placeholder(p) => {
                    if p.kind == PlaceholderKind::ArraySpread {
                        return Err(self.mixed(&p.name, field));
                    }
                    if let Some(value) = self.lookup_scalar(p, field, false)? {
                        out.push_str(&value);
                    }
                }
            }
        }
        Ok(out)
    }

    fn lookup_scalar(
        &mut self,
        p: &Placeholder,
        field: &str,
        sole: bool,
    ) -> TemplateResult<Option<String>> {
        let params = self.params;
        let name = p.name.as_str();
        match params.get_key_value(name) {
            Some((key, ParamValue::Scalar(value))) => {
                self.used.insert(key.as_str());
                Ok(Some(value.clone()))
            }
            Some((key, ParamValue::Array(_))) => {
                self.used.insert(key.as_str());
                if sole {
                    Err(TemplateError::TemplateTypeMismatch {
                        template: self.name.to_string(),
                        param: name.to_string(),
                        field: field.to_string(),
                        expected: "string".to_string(),
                        actual: "array".to_string(),
                    })
                } else {
                    Err(self.mixed(name, field))
                }
            }
            None if p.kind == PlaceholderKind::Required => Err(TemplateError::RequiredParamMissing {
                template: self.name.to_string(),
                param: name.to_string(),
            }),
            None => Ok(None),
        }
    }

    fn spread(&mut self, name: &str, field: &str) -> TemplateResult<Vec<String>> {
        let params = self.params;
        match params.get_key_value(name) {
            Some((key, ParamValue::Array(values))) => {
                self.used.insert(key.as_str());
                Ok(values.clone())
            }
            Some((key, ParamValue::Scalar(_))) => {
                self.used.insert(key.as_str());
                Err(TemplateError::TemplateTypeMismatch {
                    template: self.name.to_string(),
                    param: name.to_string(),
                    field: field.to_string(),
                    expected: "array".to_string(),
                    actual: "string".to_string(),
                })
            }
            None => Ok(Vec::new()),
        }
    }

    fn bind_env(&mut self, entries: &'a [String]) -> TemplateResult<Vec<String>> {
        let mut bound: Vec<(String, String)> = Vec::new();

        for (i, entry) in entries.iter().enumerate() {
            let field = format!("env[{}]", i);
            let parsed = parse_placeholders(entry)?;
            match classify_env_entry(self.name, entry, &parsed)? {
                EnvShape::Spread(p) => {
                    let name = p.name.clone();
                    for (j, value) in self.spread(&name, &field)?.into_iter().enumerate() {
                        bound.push((value, format!("{} ({}[{}])", field, p, j)));
                    }
                }
                EnvShape::Sole(p) => {
                    let sole = ParsedField {
                        parts: vec![FieldPart::Placeholder(p.clone())],
                    };
                    if let Some(value) = self.bind_sole_or_text(sole, &field)? {
                        bound.push((value, format!("{} ({})", field, p)));
                    }
                }
                EnvShape::Pair { key, value } => {
                    let value = self.bind_text(&value, &field)?;
                    bound.push((format!("{}={}", key, value), field));
                }
            }
        }

        let mut sources: HashMap<String, String> = HashMap::new();
        let mut env = Vec::with_capacity(bound.len());
        for (entry, source) in bound {
            let Some((key, _)) = parse_assignment(&entry) else {
                return Err(TemplateError::MalformedEnvEntry {
                    template: self.name.to_string(),
                    entry,
                    source_desc: source,
                });
            };
            validate_variable_name(key).map_err(|e| TemplateError::InvalidEnvKey {
                template: self.name.to_string(),
                key: key.to_string(),
                source_desc: source.clone(),
                reason: e.to_string(),
            })?;
            if let Some(first) = sources.get(key) {
                return Err(TemplateError::DuplicateEnvVariable {
                    template: self.name.to_string(),
                    key: key.to_string(),
                    first: first.clone(),
                    second: source,
                });
            }
            sources.insert(key.to_string(), source);
            env.push(entry);
        }

        Ok(env)
    }

    fn mixed(&self, param: &str, field: &str) -> TemplateError {
        TemplateError::ArrayInMixedContext {
            template: self.name.to_string(),
            param: param.to_string(),
            field: field.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: Vec<(&str, ParamValue)>) -> BTreeMap<String, ParamValue> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_required_scalar() {
        let template = Template::new("/usr/bin/rsync").with_args(["${src}", "/srv/${dst}"]);
        let p = params(vec![("src", "a/".into()), ("dst", "b".into())]);
        let bound = TemplateBinder::bind("rsync", &template, &p).unwrap();
        assert_eq!(bound.cmd, "/usr/bin/rsync");
        assert_eq!(bound.args, vec!["a/", "/srv/b"]);
        assert!(bound.unused_params.is_empty());
    }

    #[test]
    fn test_required_missing() {
        let template = Template::new("echo").with_args(["${msg}"]);
        let err = TemplateBinder::bind("echo", &template, &BTreeMap::new()).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::RequiredParamMissing { ref param, .. } if param == "msg"
        ));
    }

    #[test]
    fn test_optional_sole_field_is_dropped() {
        let template = Template::new("app").with_args(["${?level}"]);
        let bound = TemplateBinder::bind("app", &template, &BTreeMap::new()).unwrap();
        assert!(bound.args.is_empty());

        let p = params(vec![("level", "".into())]);
        let bound = TemplateBinder::bind("app", &template, &p).unwrap();
        assert!(bound.args.is_empty());
    }

    #[test]
    fn test_optional_keeps_sibling_args() {
        let template = Template::new("app").with_args(["--log", "${?level}"]);
        let bound = TemplateBinder::bind("app", &template, &BTreeMap::new()).unwrap();
        assert_eq!(bound.args, vec!["--log"]);

        let p = params(vec![("level", "debug".into())]);
        let bound = TemplateBinder::bind("app", &template, &p).unwrap();
        assert_eq!(bound.args, vec!["--log", "debug"]);
    }

    #[test]
    fn test_optional_embedded_becomes_empty() {
        let template = Template::new("app").with_args(["--level=${?level}"]);
        let bound = TemplateBinder::bind("app", &template, &BTreeMap::new()).unwrap();
        assert_eq!(bound.args, vec!["--level="]);
    }

    #[test]
    fn test_array_spread_args() {
        let template = Template::new("tar").with_args(["-c", "${@files}", "-f", "out.tar"]);
        let p = params(vec![("files", vec!["a", "b c"].into())]);
        let bound = TemplateBinder::bind("tar", &template, &p).unwrap();
        assert_eq!(bound.args, vec!["-c", "a", "b c", "-f", "out.tar"]);

        let bound = TemplateBinder::bind("tar", &template, &BTreeMap::new()).unwrap();
        assert_eq!(bound.args, vec!["-c", "-f", "out.tar"]);
    }

    #[test]
    fn test_array_spread_env() {
        let template = Template::new("app").with_env(["${@opts}"]);
        let p = params(vec![("opts", vec!["A=1", "B=2"].into())]);
        let bound = TemplateBinder::bind("app", &template, &p).unwrap();
        assert_eq!(bound.env, vec!["A=1", "B=2"]);
    }

    #[test]
    fn test_array_in_mixed_context() {
        let template = Template::new("app").with_args(["--files=${@files}"]);
        let p = params(vec![("files", vec!["a"].into())]);
        assert!(matches!(
            TemplateBinder::bind("app", &template, &p),
            Err(TemplateError::ArrayInMixedContext { .. })
        ));

        let template = Template::new("app").with_args(["--x=${files}"]);
        assert!(matches!(
            TemplateBinder::bind("app", &template, &p),
            Err(TemplateError::ArrayInMixedContext { .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let template = Template::new("app").with_args(["${name}"]);
        let p = params(vec![("name", vec!["a"].into())]);
        assert!(matches!(
            TemplateBinder::bind("app", &template, &p),
            Err(TemplateError::TemplateTypeMismatch { ref expected, .. }) if expected == "string"
        ));

        let template = Template::new("app").with_args(["${@name}"]);
        let p = params(vec![("name", "a".into())]);
        assert!(matches!(
            TemplateBinder::bind("app", &template, &p),
            Err(TemplateError::TemplateTypeMismatch { ref expected, .. }) if expected == "array"
        ));
    }

    #[test]
    fn test_placeholder_in_env_key() {
        let template = Template::new("app").with_env(["${name}=value"]);
        let p = params(vec![("name", "KEY".into())]);
        assert!(matches!(
            TemplateBinder::bind("app", &template, &p),
            Err(TemplateError::PlaceholderInEnvKey { .. })
        ));
    }

    #[test]
    fn test_env_sole_placeholder_entry() {
        let template = Template::new("/bin/app").with_env(["${?extra}"]);
        let bound = TemplateBinder::bind("app", &template, &BTreeMap::new()).unwrap();
        assert!(bound.env.is_empty());

        let p = params(vec![("extra", "A=1".into())]);
        let bound = TemplateBinder::bind("app", &template, &p).unwrap();
        assert_eq!(bound.env, vec!["A=1"]);

        let p = params(vec![("extra", "novalue".into())]);
        assert!(matches!(
            TemplateBinder::bind("app", &template, &p),
            Err(TemplateError::MalformedEnvEntry { ref source_desc, .. }) if source_desc == "env[0] (${?extra})"
        ));

        let template = Template::new("/bin/app").with_env(["${pair}", "A=2"]);
        let p = params(vec![("pair", "A=1".into())]);
        assert!(matches!(
            TemplateBinder::bind("app", &template, &p),
            Err(TemplateError::DuplicateEnvVariable { ref key, .. }) if key == "A"
        ));
        assert!(matches!(
            TemplateBinder::bind("app", &template, &BTreeMap::new()),
            Err(TemplateError::RequiredParamMissing { ref param, .. }) if param == "pair"
        ));
    }

    #[test]
    fn test_env_optional_value_keeps_key() {
        let template = Template::new("app").with_env(["LEVEL=${?level}"]);
        let bound = TemplateBinder::bind("app", &template, &BTreeMap::new()).unwrap();
        assert_eq!(bound.env, vec!["LEVEL="]);
    }

    #[test]
    fn test_duplicate_env_from_spread() {
        let template = Template::new("app").with_env(["A=literal", "${@opts}"]);
        let p = params(vec![("opts", vec!["B=1", "A=2"].into())]);
        match TemplateBinder::bind("app", &template, &p).unwrap_err() {
            TemplateError::DuplicateEnvVariable {
                key, first, second, ..
            } => {
                assert_eq!(key, "A");
                assert_eq!(first, "env[0]");
                assert_eq!(second, "env[1] (${@opts}[1])");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_spread_entry_must_be_assignment() {
        let template = Template::new("app").with_env(["${@opts}"]);
        let p = params(vec![("opts", vec!["NOEQUALS"].into())]);
        assert!(matches!(
            TemplateBinder::bind("app", &template, &p),
            Err(TemplateError::MalformedEnvEntry { .. })
        ));
    }

    #[test]
    fn test_unused_params_reported() {
        let template = Template::new("echo").with_args(["${msg}"]);
        let p = params(vec![("msg", "hi".into()), ("extra", "x".into())]);
        let bound = TemplateBinder::bind("echo", &template, &p).unwrap();
        assert_eq!(bound.unused_params, vec!["extra"]);
    }

    #[test]
    fn test_workdir_and_risk_level() {
        let template = Template::new("make")
            .with_workdir("${?dir}")
            .with_risk_level("medium");
        let bound = TemplateBinder::bind("make", &template, &BTreeMap::new()).unwrap();
        assert_eq!(bound.workdir, None);
        assert_eq!(bound.risk_level.as_deref(), Some("medium"));

        let p = params(vec![("dir", "/src".into())]);
        let bound = TemplateBinder::bind("make", &template, &p).unwrap();
        assert_eq!(bound.workdir.as_deref(), Some("/src"));
    }

    #[test]
    fn test_references_pass_through() {
        let template = Template::new("%{TOOLS}/run").with_args(["${target}"]);
        let p = params(vec![("target", "%{OUT}/bin".into())]);
        let bound = TemplateBinder::bind("run", &template, &p).unwrap();
        assert_eq!(bound.cmd, "%{TOOLS}/run");
        assert_eq!(bound.args, vec!["%{OUT}/bin"]);
    }

    #[test]
    fn test_invalid_param_name() {
        let template = Template::new("echo");
        let p = params(vec![("bad-name", "x".into())]);
        assert!(matches!(
            TemplateBinder::bind("echo", &template, &p),
            Err(TemplateError::InvalidParameterName { .. })
        ));
    }

    #[test]
    fn test_empty_cmd_after_binding() {
        let template = Template::new("${?tool}");
        assert!(matches!(
            TemplateBinder::bind("t", &template, &BTreeMap::new()),
            Err(TemplateError::EmptyCommand(_))
        ));
    }
}
