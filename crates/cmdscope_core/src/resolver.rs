//! Whole-configuration resolution: global, then each group, then each
//! command in the group.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cmdscope_policy::{redact_env, AllowlistMode, RuleSet, SecurityValidator};
use cmdscope_spec::{
    parse_risk_level, validate_command_spec, CommandSpec, ConfigSpec, GroupSpec, RiskLevel,
    ScopeLevel,
};
use cmdscope_templates::{BoundCommand, TemplateBinder, TemplateRegistry};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auto::AutoVariables;
use crate::environment::{EnvSnapshot, EnvironmentSource, ProcessEnvironment};
use crate::error::{ResolveError, ResolveResult};
use crate::scope::{ResolvedScope, ScopeDeclaration, ScopeResolver};
use crate::warnings::Warning;

/// Options for a resolution pass.
#[derive(Clone)]
pub struct ResolveOptions {
    environment: Arc<dyn EnvironmentSource>,
    timestamp: Option<DateTime<Utc>>,
    pid: Option<u32>,
    fail_fast: bool,
    rules: RuleSet,
    group: Option<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            environment: Arc::new(ProcessEnvironment),
            timestamp: None,
            pid: None,
            fail_fast: true,
            rules: RuleSet::standard(),
            group: None,
        }
    }
}

impl fmt::Debug for ResolveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveOptions")
            .field("timestamp", &self.timestamp)
            .field("pid", &self.pid)
            .field("fail_fast", &self.fail_fast)
            .field("rules", &self.rules.name)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(mut self, environment: impl EnvironmentSource + 'static) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    /// Fix the time used for `__runner_datetime`.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Fix the value of `__runner_pid`.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Stop at the first failing group or command (the default). When
    /// disabled, failures are collected and siblings still resolve. A global
    /// scope failure always aborts.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Resolve only the named group.
    pub fn only_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// A command ready for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCommand {
    pub group: String,
    pub name: String,
    pub cmd: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub workdir: Option<String>,
    pub risk_level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedGroup {
    pub name: String,
    pub scope: ResolvedScope,
    pub workdir: Option<String>,
    pub commands: Vec<ResolvedCommand>,
}

/// Outcome of a resolution pass.
#[derive(Debug, Serialize)]
pub struct Resolution {
    pub global: ResolvedScope,
    pub groups: Vec<ResolvedGroup>,
    pub warnings: Vec<Warning>,
    /// Group and command failures collected when `fail_fast` is off
    #[serde(skip)]
    pub failures: Vec<ResolveError>,
}

impl Resolution {
    pub fn commands(&self) -> impl Iterator<Item = &ResolvedCommand> {
        self.groups.iter().flat_map(|g| g.commands.iter())
    }

    pub fn command(&self, group: &str, name: &str) -> Option<&ResolvedCommand> {
        self.commands().find(|c| c.group == group && c.name == name)
    }

    pub fn group(&self, name: &str) -> Option<&ResolvedGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolves a configuration against a template registry.
pub struct ConfigResolver<'a> {
    config: &'a ConfigSpec,
    templates: &'a TemplateRegistry,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(config: &'a ConfigSpec, templates: &'a TemplateRegistry) -> Self {
        Self { config, templates }
    }

    /// Run a resolution pass. The process environment is read once, before
    /// any scope is expanded.
    pub fn resolve(&self, options: &ResolveOptions) -> ResolveResult<Resolution> {
        if let Some(name) = &options.group {
            if !self.config.groups.iter().any(|g| &g.name == name) {
                return Err(ResolveError::GroupNotFound(name.clone()));
            }
        }

        let snapshot = options.environment.snapshot();
        let auto = AutoVariables::generate_at(
            options.timestamp.unwrap_or_else(Utc::now),
            options.pid.unwrap_or_else(std::process::id),
        );
        let validator = SecurityValidator::from_rules(&options.rules)?;
        let resolver = ScopeResolver::new(&validator, &snapshot, &auto);

        let mut pass = Pass {
            templates: self.templates,
            resolver: &resolver,
            snapshot: &snapshot,
            fail_fast: options.fail_fast,
            warnings: Vec::new(),
            failures: Vec::new(),
        };

        let global = resolver.resolve_scope(&ScopeDeclaration::global(&self.config.global), &[])?;
        info!(
            "Resolved global scope ({} vars, {} env)",
            global.vars.len(),
            global.env.len()
        );
        if global.allowlist.mode() == AllowlistMode::Reject {
            pass.warn(Warning::EmptyGlobalAllowlist);
        }
        pass.check_unset(&global);

        let mut groups = Vec::new();
        for group in &self.config.groups {
            if options.group.as_ref().is_some_and(|name| name != &group.name) {
                continue;
            }
            match pass.resolve_group(group, &global) {
                Ok(resolved) => groups.push(resolved),
                Err(e) => pass.fail(e)?,
            }
        }

        Ok(Resolution {
            global,
            groups,
            warnings: pass.warnings,
            failures: pass.failures,
        })
    }
}

/// State of one resolution pass.
struct Pass<'a> {
    templates: &'a TemplateRegistry,
    resolver: &'a ScopeResolver<'a>,
    snapshot: &'a EnvSnapshot,
    fail_fast: bool,
    warnings: Vec<Warning>,
    failures: Vec<ResolveError>,
}

impl Pass<'_> {
    fn warn(&mut self, warning: Warning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Record a group or command failure, or propagate it under fail-fast.
    fn fail(&mut self, error: ResolveError) -> ResolveResult<()> {
        if self.fail_fast {
            return Err(error);
        }
        warn!("Skipping after error: {}", error);
        self.failures.push(error);
        Ok(())
    }

    fn check_unset(&mut self, scope: &ResolvedScope) {
        if scope.allowlist.mode() != AllowlistMode::Explicit {
            return;
        }
        for name in scope.allowlist.effective_list() {
            if !self.snapshot.contains_key(&name) {
                self.warn(Warning::AllowlistedVariableUnset {
                    scope: scope.level.to_string(),
                    name,
                });
            }
        }
    }

    fn resolve_group(
        &mut self,
        group: &GroupSpec,
        global: &ResolvedScope,
    ) -> ResolveResult<ResolvedGroup> {
        let parents = [global];
        let scope = self
            .resolver
            .resolve_scope(&ScopeDeclaration::group(group), &parents)?;

        if scope.allowlist.mode() == AllowlistMode::Explicit && scope.allowlist == global.allowlist
        {
            self.warn(Warning::RedundantAllowlist {
                scope: scope.level.to_string(),
            });
        }
        self.check_unset(&scope);

        let workdir = group
            .workdir
            .as_deref()
            .map(|raw| self.resolver.expand_field(&scope, &parents, "workdir", raw))
            .transpose()?;

        let mut commands = Vec::with_capacity(group.commands.len());
        for command in &group.commands {
            match self.resolve_command(group, command, &scope, global, workdir.as_deref()) {
                Ok(resolved) => commands.push(resolved),
                Err(e) => self.fail(e)?,
            }
        }

        info!(
            "Resolved group '{}' ({} vars, {} env, {} commands)",
            group.name,
            scope.vars.len(),
            scope.env.len(),
            commands.len()
        );

        Ok(ResolvedGroup {
            name: group.name.clone(),
            scope,
            workdir,
            commands,
        })
    }

    fn resolve_command(
        &mut self,
        group: &GroupSpec,
        command: &CommandSpec,
        group_scope: &ResolvedScope,
        global: &ResolvedScope,
        group_workdir: Option<&str>,
    ) -> ResolveResult<ResolvedCommand> {
        let label = ScopeLevel::command(&group.name, &command.name).to_string();
        validate_command_spec(&group.name, command).map_err(|source| {
            ResolveError::Declaration {
                scope: label.clone(),
                field: "command".to_string(),
                source,
            }
        })?;

        let raw = match &command.template {
            Some(name) => {
                let bound = self.bind_template(&label, name, command)?;
                RawCommand {
                    cmd: bound.cmd,
                    args: bound.args,
                    env: bound.env,
                    workdir: command.workdir.clone().or(bound.workdir),
                    risk_level: command.risk_level.clone().or(bound.risk_level),
                }
            }
            None => RawCommand {
                cmd: command.cmd.clone().unwrap_or_default(),
                args: command.args.clone().unwrap_or_default(),
                env: command.env.clone().unwrap_or_default(),
                workdir: command.workdir.clone(),
                risk_level: command.risk_level.clone(),
            },
        };

        let risk_level = parse_risk_level(raw.risk_level.as_deref())
            .map_err(|source| ResolveError::Declaration {
                scope: label.clone(),
                field: "risk_level".to_string(),
                source,
            })?
            .unwrap_or_default();

        let parents = [group_scope, global];
        let scope = self.resolver.resolve_scope(
            &ScopeDeclaration::command(&group.name, command, &raw.env),
            &parents,
        )?;
        self.check_unset(&scope);

        let cmd = self
            .resolver
            .expand_field(&scope, &parents, "cmd", &raw.cmd)?;
        let args = raw
            .args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                self.resolver
                    .expand_field(&scope, &parents, &format!("args[{}]", i), arg)
            })
            .collect::<ResolveResult<Vec<_>>>()?;
        let workdir = match raw.workdir.as_deref() {
            Some(dir) => Some(self.resolver.expand_field(&scope, &parents, "workdir", dir)?),
            None => group_workdir.map(String::from),
        };

        let mut env = global.env.clone();
        env.extend(group_scope.env.clone());
        env.extend(scope.env);

        debug!("{}: {} {:?} env={:?}", label, cmd, args, redact_env(&env));

        Ok(ResolvedCommand {
            group: group.name.clone(),
            name: command.name.clone(),
            cmd,
            args,
            env,
            workdir,
            risk_level,
            template: command.template.clone(),
        })
    }

    fn bind_template(
        &mut self,
        label: &str,
        name: &str,
        command: &CommandSpec,
    ) -> ResolveResult<BoundCommand> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| ResolveError::TemplateNotFound {
                scope: label.to_string(),
                template: name.to_string(),
            })?;

        let bound = TemplateBinder::bind(name, template, &command.params).map_err(|source| {
            ResolveError::Template {
                scope: label.to_string(),
                field: "template".to_string(),
                source,
            }
        })?;

        for param in &bound.unused_params {
            self.warn(Warning::UnusedTemplateParameter {
                scope: label.to_string(),
                template: name.to_string(),
                param: param.clone(),
            });
        }

        Ok(bound)
    }
}

/// Command fields before scope expansion.
struct RawCommand {
    cmd: String,
    args: Vec<String>,
    env: Vec<String>,
    workdir: Option<String>,
    risk_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MockEnvironmentSource;
    use cmdscope_spec::GlobalSpec;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn mock_env(pairs: &'static [(&'static str, &'static str)]) -> MockEnvironmentSource {
        let mut mock = MockEnvironmentSource::new();
        mock.expect_snapshot().times(1).returning(move || {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        });
        mock
    }

    fn config() -> ConfigSpec {
        let mut group = GroupSpec::new("build");
        group.vars = strings(&["OUT=%{ROOT}/out"]);
        group.commands = vec![CommandSpec::inline("compile", "make")
            .with_args(["-C", "%{OUT}", "HOME=%{HOME}"])];

        ConfigSpec {
            global: GlobalSpec {
                env_allowlist: Some(strings(&["HOME"])),
                vars: strings(&["ROOT=/srv"]),
                ..Default::default()
            },
            groups: vec![group],
            ..Default::default()
        }
    }

    #[test]
    fn test_snapshot_taken_once() {
        let config = config();
        let templates = TemplateRegistry::new();
        let options = ResolveOptions::new().with_environment(mock_env(&[("HOME", "/home/ci")]));

        let resolution = ConfigResolver::new(&config, &templates)
            .resolve(&options)
            .unwrap();
        let compile = resolution.command("build", "compile").unwrap();
        assert_eq!(compile.args, vec!["-C", "/srv/out", "HOME=/home/ci"]);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_unset_allowlisted_variable_warns() {
        let config = config();
        let templates = TemplateRegistry::new();
        let options = ResolveOptions::new().with_environment(mock_env(&[]));

        let resolution = ConfigResolver::new(&config, &templates)
            .resolve(&options)
            .unwrap();
        assert_eq!(
            resolution.command("build", "compile").unwrap().args[2],
            "HOME="
        );
        assert_eq!(
            resolution.warnings,
            vec![Warning::AllowlistedVariableUnset {
                scope: "global".to_string(),
                name: "HOME".to_string(),
            }]
        );
    }

    #[test]
    fn test_unknown_group_filter() {
        let config = config();
        let templates = TemplateRegistry::new();
        let options = ResolveOptions::new().only_group("deploy");
        assert!(matches!(
            ConfigResolver::new(&config, &templates).resolve(&options),
            Err(ResolveError::GroupNotFound(_))
        ));
    }
}
