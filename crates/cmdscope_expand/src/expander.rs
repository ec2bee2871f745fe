//! Recursive reference expansion.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use tracing::trace;

use crate::context::ExpansionContext;
use crate::error::{ExpandError, ExpandResult};
use crate::parser::{parse_references, Segment};

/// What a lookup knows about a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding<'a> {
    /// Unexpanded text; expanded recursively before substitution.
    Raw(&'a str),
    /// Already expanded and validated; substituted verbatim.
    Resolved(&'a str),
}

impl<'a> Binding<'a> {
    pub fn value(&self) -> &'a str {
        match self {
            Binding::Raw(v) | Binding::Resolved(v) => *v,
        }
    }
}

/// Source of variable bindings for the expander.
pub trait Lookup {
    fn lookup(&self, name: &str) -> Option<Binding<'_>>;
}

impl<S: BuildHasher> Lookup for HashMap<String, String, S> {
    fn lookup(&self, name: &str) -> Option<Binding<'_>> {
        self.get(name).map(|v| Binding::Raw(v.as_str()))
    }
}

impl Lookup for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<Binding<'_>> {
        self.get(name).map(|v| Binding::Raw(v.as_str()))
    }
}

/// Expand every reference in `raw`.
///
/// Lookup order for each name: `lookup`, then the allowlisted process
/// environment (unset means empty string) when `ctx` carries one.
pub fn expand(raw: &str, lookup: &dyn Lookup, ctx: &mut ExpansionContext<'_>) -> ExpandResult<String> {
    let segments = parse_references(raw)?;
    let mut out = String::with_capacity(raw.len());

    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Reference { name, .. } => {
                let value = resolve_reference(&name, lookup, ctx)?;
                out.push_str(&value);
            }
        }
    }

    Ok(out)
}

fn resolve_reference(
    name: &str,
    lookup: &dyn Lookup,
    ctx: &mut ExpansionContext<'_>,
) -> ExpandResult<String> {
    match lookup.lookup(name) {
        Some(Binding::Resolved(value)) => {
            trace!("{}: %{{{}}} resolved", ctx.scope(), name);
            return Ok(value.to_string());
        }
        Some(Binding::Raw(raw)) => {
            ctx.enter(name)?;
            let result = expand(raw, lookup, ctx);
            ctx.leave();
            return result;
        }
        None => {}
    }

    let external = ctx.external();

    if let Some(env) = external {
        if env.is_allowed(name) {
            trace!("{}: %{{{}}} from process environment", ctx.scope(), name);
            return Ok(env.get(name).unwrap_or_default().to_string());
        }
    }

    if ctx.chain().contains(name) {
        return Err(ExpandError::CircularReference {
            chain: ctx.chain().cycle_with(name),
        });
    }

    if let Some(env) = external {
        if env.get(name).is_some() {
            let variable = ctx.chain().top().unwrap_or(ctx.field()).to_string();
            return Err(ExpandError::AllowlistViolation {
                scope: ctx.scope().to_string(),
                variable,
                external: name.to_string(),
            });
        }
    }

    Err(ExpandError::UndefinedVariable {
        name: name.to_string(),
    })
}

/// Expands strings against a fixed lookup, one fresh context per call.
pub struct Expander<'a> {
    lookup: &'a dyn Lookup,
    scope: String,
}

impl<'a> Expander<'a> {
    pub fn new(lookup: &'a dyn Lookup) -> Self {
        Self {
            lookup,
            scope: "global".to_string(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn expand_str(&self, raw: &str) -> ExpandResult<String> {
        let mut ctx = ExpansionContext::new(self.scope.clone());
        expand(raw, self.lookup, &mut ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExternalEnv, MAX_RECURSION_DEPTH};
    use cmdscope_policy::AllowlistResolution;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_literal_is_unchanged() {
        let empty = vars(&[]);
        let expander = Expander::new(&empty);
        assert_eq!(expander.expand_str("/usr/bin --flag").unwrap(), "/usr/bin --flag");
        assert_eq!(expander.expand_str("100%").unwrap(), "100%");
    }

    #[test]
    fn test_escaped_reference_is_not_expanded() {
        let map = vars(&[("VAR", "value")]);
        let expander = Expander::new(&map);
        assert_eq!(
            expander.expand_str(r"prefix\%{VAR}suffix").unwrap(),
            "prefix%{VAR}suffix"
        );
    }

    #[test]
    fn test_nested_expansion() {
        let map = vars(&[("BASE", "/opt"), ("APP", "%{BASE}/app")]);
        let expander = Expander::new(&map);
        assert_eq!(expander.expand_str("%{APP}/bin").unwrap(), "/opt/app/bin");
    }

    #[test]
    fn test_self_reference_is_circular() {
        let map = vars(&[("A", "x%{A}")]);
        assert_eq!(
            Expander::new(&map).expand_str("%{A}"),
            Err(ExpandError::CircularReference {
                chain: vec!["A".to_string(), "A".to_string()]
            })
        );
    }

    #[test]
    fn test_cycles_of_any_length() {
        for n in 2..=6 {
            let map: HashMap<String, String> = (0..n)
                .map(|i| (format!("V{}", i), format!("%{{V{}}}", (i + 1) % n)))
                .collect();
            let err = Expander::new(&map).expand_str("%{V0}").unwrap_err();
            match err {
                ExpandError::CircularReference { chain } => {
                    assert_eq!(chain.len(), n + 1);
                    assert_eq!(chain.first(), chain.last());
                }
                other => panic!("expected cycle for n={}, got {:?}", n, other),
            }
        }
    }

    #[test]
    fn test_depth_limit() {
        let n = MAX_RECURSION_DEPTH + 5;
        let mut map: HashMap<String, String> = (0..n)
            .map(|i| (format!("V{}", i), format!("%{{V{}}}", i + 1)))
            .collect();
        map.insert(format!("V{}", n), "end".to_string());

        assert!(matches!(
            Expander::new(&map).expand_str("%{V0}"),
            Err(ExpandError::MaxRecursionDepthExceeded { .. })
        ));

        let short: HashMap<String, String> = (0..10)
            .map(|i| (format!("V{}", i), format!("%{{V{}}}", i + 1)))
            .chain(std::iter::once(("V10".to_string(), "end".to_string())))
            .collect();
        assert_eq!(Expander::new(&short).expand_str("%{V0}").unwrap(), "end");
    }

    #[test]
    fn test_undefined_variable() {
        let map = vars(&[("A", "%{MISSING}")]);
        assert_eq!(
            Expander::new(&map).expand_str("%{A}"),
            Err(ExpandError::UndefinedVariable {
                name: "MISSING".to_string()
            })
        );
    }

    #[test]
    fn test_external_environment_fallback() {
        let map = vars(&[]);
        let mut process = BTreeMap::new();
        process.insert("HOME".to_string(), "/home/dev".to_string());
        process.insert("AWS_SECRET".to_string(), "xyz".to_string());
        let allow = AllowlistResolution::resolve(
            Some(&["HOME".to_string(), "UNSET_BUT_ALLOWED".to_string()]),
            None,
        );

        let mut ctx = ExpansionContext::new("group:build")
            .with_field("vars.DATA")
            .with_external(ExternalEnv::new(&process, &allow));

        assert_eq!(expand("%{HOME}/data", &map, &mut ctx).unwrap(), "/home/dev/data");
        assert_eq!(expand("[%{UNSET_BUT_ALLOWED}]", &map, &mut ctx).unwrap(), "[]");
        assert_eq!(
            expand("%{AWS_SECRET}", &map, &mut ctx),
            Err(ExpandError::AllowlistViolation {
                scope: "group:build".to_string(),
                variable: "vars.DATA".to_string(),
                external: "AWS_SECRET".to_string(),
            })
        );
        assert!(matches!(
            expand("%{NOWHERE}", &map, &mut ctx),
            Err(ExpandError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn test_allowlist_violation_names_referencing_variable() {
        let map = vars(&[("CONFIG", "%{AWS_SECRET}")]);
        let mut process = BTreeMap::new();
        process.insert("AWS_SECRET".to_string(), "xyz".to_string());
        let allow = AllowlistResolution::resolve(Some(&[]), None);

        let mut ctx =
            ExpansionContext::new("global").with_external(ExternalEnv::new(&process, &allow));
        assert!(matches!(
            expand("%{CONFIG}", &map, &mut ctx),
            Err(ExpandError::AllowlistViolation { ref variable, .. }) if variable == "CONFIG"
        ));
    }

    #[test]
    fn test_resolved_bindings_are_not_reexpanded() {
        struct Fixed;
        impl Lookup for Fixed {
            fn lookup(&self, name: &str) -> Option<Binding<'_>> {
                (name == "RAW_TEXT").then_some(Binding::Resolved("%{NOT_A_REF}"))
            }
        }
        assert_eq!(
            Expander::new(&Fixed).expand_str("%{RAW_TEXT}").unwrap(),
            "%{NOT_A_REF}"
        );
    }

    #[test]
    fn test_context_restored_after_error() {
        let map = vars(&[("A", "%{B}"), ("B", "%{MISSING}")]);
        let mut ctx = ExpansionContext::new("global");
        assert!(expand("%{A}", &map, &mut ctx).is_err());
        assert_eq!(ctx.depth(), 0);
        assert!(ctx.chain().is_empty());
    }

    #[test]
    fn test_deterministic() {
        let map = vars(&[("A", "1"), ("B", "%{A}-%{A}")]);
        let expander = Expander::new(&map);
        let first = expander.expand_str("%{B}").unwrap();
        for _ in 0..5 {
            assert_eq!(expander.expand_str("%{B}").unwrap(), first);
        }
    }
}
