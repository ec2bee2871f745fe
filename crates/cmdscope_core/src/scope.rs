//! Resolution of a single scope.
//!
//! A scope's `from_env` imports are processed first, then its `vars` strictly
//! in declaration order, then its `env` entries. Each variable sees the
//! entries resolved before it in the same scope, then the enclosing scopes
//! (nearest first), then the automatic variables, then the allowlisted
//! process environment.

use std::collections::{BTreeMap, HashSet};

use cmdscope_expand::{expand, Binding, ExpandError, ExpansionContext, ExternalEnv, Lookup};
use cmdscope_policy::{redact_env, AllowlistResolution, SecurityValidator};
use cmdscope_spec::{
    parse_env_declarations, parse_env_imports, parse_variable_declarations, CommandSpec,
    GlobalSpec, GroupSpec, ScopeLevel,
};
use serde::Serialize;
use tracing::{debug, trace};

use crate::auto::AutoVariables;
use crate::environment::EnvSnapshot;
use crate::error::{ResolveError, ResolveResult};

/// Raw declarations of one scope.
#[derive(Debug, Clone)]
pub struct ScopeDeclaration<'a> {
    pub level: ScopeLevel,
    pub allowlist: Option<&'a [String]>,
    pub from_env: &'a [String],
    pub vars: &'a [String],
    pub env: &'a [String],
}

impl<'a> ScopeDeclaration<'a> {
    pub fn global(spec: &'a GlobalSpec) -> Self {
        Self {
            level: ScopeLevel::Global,
            allowlist: spec.env_allowlist.as_deref(),
            from_env: &spec.from_env,
            vars: &spec.vars,
            env: &spec.env,
        }
    }

    pub fn group(spec: &'a GroupSpec) -> Self {
        Self {
            level: ScopeLevel::group(&spec.name),
            allowlist: spec.env_allowlist.as_deref(),
            from_env: &spec.from_env,
            vars: &spec.vars,
            env: &spec.env,
        }
    }

    /// A command scope. `env` is passed separately because template commands
    /// take it from the bound template.
    pub fn command(group: &str, spec: &'a CommandSpec, env: &'a [String]) -> Self {
        Self {
            level: ScopeLevel::command(group, &spec.name),
            allowlist: spec.env_allowlist.as_deref(),
            from_env: &spec.from_env,
            vars: &spec.vars,
            env,
        }
    }
}

/// The resolved maps of one scope. Never mutated once built.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedScope {
    pub level: ScopeLevel,
    pub vars: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub allowlist: AllowlistResolution,
}

/// Layered lookup over resolved values: current scope, enclosing scopes
/// nearest first, then automatic variables.
pub struct LayeredLookup<'a> {
    current: &'a BTreeMap<String, String>,
    parents: &'a [&'a ResolvedScope],
    auto: &'a AutoVariables,
}

impl<'a> LayeredLookup<'a> {
    pub fn new(
        current: &'a BTreeMap<String, String>,
        parents: &'a [&'a ResolvedScope],
        auto: &'a AutoVariables,
    ) -> Self {
        Self {
            current,
            parents,
            auto,
        }
    }
}

impl Lookup for LayeredLookup<'_> {
    fn lookup(&self, name: &str) -> Option<Binding<'_>> {
        self.current
            .get(name)
            .or_else(|| self.parents.iter().find_map(|p| p.vars.get(name)))
            .map(String::as_str)
            .or_else(|| self.auto.get(name))
            .map(Binding::Resolved)
    }
}

/// Resolves scopes against one environment snapshot.
pub struct ScopeResolver<'a> {
    validator: &'a SecurityValidator,
    environment: &'a EnvSnapshot,
    auto: &'a AutoVariables,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(
        validator: &'a SecurityValidator,
        environment: &'a EnvSnapshot,
        auto: &'a AutoVariables,
    ) -> Self {
        Self {
            validator,
            environment,
            auto,
        }
    }

    /// Resolve `decl` given its enclosing scopes, nearest first.
    ///
    /// The scope fails as a whole on the first error.
    pub fn resolve_scope(
        &self,
        decl: &ScopeDeclaration<'_>,
        parents: &[&ResolvedScope],
    ) -> ResolveResult<ResolvedScope> {
        let scope = decl.level.to_string();
        let allowlist =
            AllowlistResolution::resolve(decl.allowlist, parents.first().map(|p| &p.allowlist));
        debug!(
            "{}: env_allowlist {} {:?}",
            scope,
            allowlist.mode(),
            allowlist.effective_list()
        );

        let mut taken = HashSet::new();
        let imports = parse_env_imports(decl.from_env, "from_env", &mut taken)
            .map_err(|e| declaration_error(&scope, "from_env", e))?;
        let declarations = parse_variable_declarations(decl.vars, "vars", &mut taken)
            .map_err(|e| declaration_error(&scope, "vars", e))?;
        let env_declarations =
            parse_env_declarations(decl.env, "env").map_err(|e| declaration_error(&scope, "env", e))?;

        let mut vars = BTreeMap::new();

        for import in imports {
            let field = format!("from_env.{}", import.name);
            if !allowlist.is_allowed(&import.system_name) {
                return Err(ResolveError::Expansion {
                    scope,
                    field,
                    source: ExpandError::AllowlistViolation {
                        scope: decl.level.to_string(),
                        variable: import.name,
                        external: import.system_name,
                    },
                });
            }

            let value = self
                .environment
                .get(&import.system_name)
                .cloned()
                .unwrap_or_default();
            self.check_safe(&scope, &field, &import.name, &value)?;
            trace!("{}: imported {} from {}", scope, import.name, import.system_name);
            vars.insert(import.name, value);
        }

        for declaration in declarations {
            let field = format!("vars.{}", declaration.name);
            let mut ctx = ExpansionContext::new(scope.as_str())
                .with_field(field.as_str())
                .with_external(ExternalEnv::new(self.environment, &allowlist));

            let value = {
                let lookup = LayeredLookup::new(&vars, parents, self.auto);
                ctx.enter(&declaration.name)
                    .and_then(|_| {
                        let result = expand(&declaration.raw_value, &lookup, &mut ctx);
                        ctx.leave();
                        result
                    })
                    .map_err(|e| expansion_error(&scope, &field, e))?
            };

            self.check_safe(&scope, &field, &declaration.name, &value)?;
            trace!("{}: {} resolved", scope, declaration.name);
            vars.insert(declaration.name, value);
        }

        let mut env = BTreeMap::new();
        for declaration in env_declarations {
            let field = format!("env.{}", declaration.key);
            let mut ctx = ExpansionContext::new(scope.as_str())
                .with_field(field.as_str())
                .with_external(ExternalEnv::new(self.environment, &allowlist));
            let lookup = LayeredLookup::new(&vars, parents, self.auto);

            let value = expand(&declaration.raw_value, &lookup, &mut ctx)
                .map_err(|e| expansion_error(&scope, &field, e))?;
            self.check_safe(&scope, &field, &declaration.key, &value)?;
            env.insert(declaration.key, value);
        }

        debug!("{}: env {:?}", scope, redact_env(&env));

        Ok(ResolvedScope {
            level: decl.level.clone(),
            vars,
            env,
            allowlist,
        })
    }

    /// Expand a command field (`cmd`, `args[i]`, `workdir`) in the context of
    /// a resolved scope. These values are not pattern-checked.
    pub fn expand_field(
        &self,
        scope: &ResolvedScope,
        parents: &[&ResolvedScope],
        field: &str,
        raw: &str,
    ) -> ResolveResult<String> {
        let label = scope.level.to_string();
        let mut ctx = ExpansionContext::new(label.as_str())
            .with_field(field)
            .with_external(ExternalEnv::new(self.environment, &scope.allowlist));
        let lookup = LayeredLookup::new(&scope.vars, parents, self.auto);
        expand(raw, &lookup, &mut ctx).map_err(|e| expansion_error(&label, field, e))
    }

    fn check_safe(&self, scope: &str, field: &str, name: &str, value: &str) -> ResolveResult<()> {
        self.validator
            .validate_named(name, value)
            .map_err(|source| ResolveError::UnsafeValue {
                scope: scope.to_string(),
                field: field.to_string(),
                source,
            })
    }
}

fn declaration_error(scope: &str, field: &str, source: cmdscope_spec::SpecError) -> ResolveError {
    ResolveError::Declaration {
        scope: scope.to_string(),
        field: field.to_string(),
        source,
    }
}

fn expansion_error(scope: &str, field: &str, source: ExpandError) -> ResolveError {
    ResolveError::Expansion {
        scope: scope.to_string(),
        field: field.to_string(),
        source,
    }
}
