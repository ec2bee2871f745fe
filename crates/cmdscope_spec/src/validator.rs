//! Declaration validation.
//!
//! Name rules, `NAME=VALUE` parsing with duplicate detection, and the
//! structural checks on command declarations (template/inline exclusivity).

use std::collections::HashSet;

use crate::error::{SpecError, SpecResult};
use crate::models::{
    CommandSpec, ConfigSpec, EnvDeclaration, EnvImport, GroupSpec, RiskLevel,
    VariableDeclaration,
};

/// Prefix reserved for automatic variables.
pub const RESERVED_PREFIX: &str = "__";

/// Whether `c` may appear in a variable name after the first character.
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Check `[A-Za-z_][A-Za-z0-9_]*` without applying the reserved-prefix rule.
pub fn check_name_syntax(name: &str) -> SpecResult<()> {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Err(SpecError::EmptyVariableName),
    };

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(SpecError::InvalidVariableName {
            name: name.to_string(),
            reason: format!("must start with A-Z, a-z or _ (got {:?})", first),
        });
    }

    if let Some(bad) = chars.find(|c| !is_name_char(*c)) {
        return Err(SpecError::InvalidVariableName {
            name: name.to_string(),
            reason: format!("invalid character {:?}", bad),
        });
    }

    Ok(())
}

/// Validate a user-declared variable name, including the reserved prefix.
pub fn validate_variable_name(name: &str) -> SpecResult<()> {
    check_name_syntax(name)?;
    if name.starts_with(RESERVED_PREFIX) {
        return Err(SpecError::ReservedVariableName(name.to_string()));
    }
    Ok(())
}

/// Split `NAME=VALUE` at the first `=`.
pub fn parse_assignment(entry: &str) -> Option<(&str, &str)> {
    entry.split_once('=')
}

/// Parse an ordered `vars` sequence.
///
/// `taken` carries names already declared in the same scope (for example by
/// `from_env`) so both sequences share one duplicate check.
pub fn parse_variable_declarations(
    entries: &[String],
    field: &str,
    taken: &mut HashSet<String>,
) -> SpecResult<Vec<VariableDeclaration>> {
    let mut declarations = Vec::with_capacity(entries.len());

    for entry in entries {
        let (name, value) =
            parse_assignment(entry).ok_or_else(|| SpecError::MalformedDeclaration {
                field: field.to_string(),
                entry: entry.clone(),
            })?;
        validate_variable_name(name)?;

        if !taken.insert(name.to_string()) {
            return Err(SpecError::DuplicateVariable {
                field: field.to_string(),
                name: name.to_string(),
            });
        }

        declarations.push(VariableDeclaration {
            name: name.to_string(),
            raw_value: value.to_string(),
        });
    }

    Ok(declarations)
}

/// Parse a `from_env` sequence of `internal_name=SYSTEM_VAR` entries.
pub fn parse_env_imports(
    entries: &[String],
    field: &str,
    taken: &mut HashSet<String>,
) -> SpecResult<Vec<EnvImport>> {
    let mut imports = Vec::with_capacity(entries.len());

    for entry in entries {
        let (name, system_name) =
            parse_assignment(entry).ok_or_else(|| SpecError::MalformedDeclaration {
                field: field.to_string(),
                entry: entry.clone(),
            })?;
        validate_variable_name(name)?;
        check_name_syntax(system_name)?;

        if !taken.insert(name.to_string()) {
            return Err(SpecError::DuplicateVariable {
                field: field.to_string(),
                name: name.to_string(),
            });
        }

        imports.push(EnvImport {
            name: name.to_string(),
            system_name: system_name.to_string(),
        });
    }

    Ok(imports)
}

/// Parse an `env` sequence of `KEY=VALUE` entries.
pub fn parse_env_declarations(entries: &[String], field: &str) -> SpecResult<Vec<EnvDeclaration>> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut declarations = Vec::with_capacity(entries.len());

    for entry in entries {
        let (key, value) =
            parse_assignment(entry).ok_or_else(|| SpecError::MalformedDeclaration {
                field: field.to_string(),
                entry: entry.clone(),
            })?;
        validate_variable_name(key)?;

        if !seen.insert(key) {
            return Err(SpecError::DuplicateEnvVariable {
                field: field.to_string(),
                key: key.to_string(),
            });
        }

        declarations.push(EnvDeclaration {
            key: key.to_string(),
            raw_value: value.to_string(),
        });
    }

    Ok(declarations)
}

/// Enforce template/inline field exclusivity on a command declaration.
pub fn validate_command_spec(group: &str, spec: &CommandSpec) -> SpecResult<()> {
    let Some(template) = &spec.template else {
        if spec.cmd.as_deref().map_or(true, str::is_empty) {
            return Err(SpecError::MissingRequiredField {
                group: group.to_string(),
                command: spec.name.clone(),
                field: "cmd".to_string(),
            });
        }
        return Ok(());
    };

    let conflict = if spec.cmd.is_some() {
        Some("cmd")
    } else if spec.args.is_some() {
        Some("args")
    } else if spec.env.is_some() {
        Some("env")
    } else {
        None
    };

    match conflict {
        Some(field) => Err(SpecError::TemplateFieldConflict {
            group: group.to_string(),
            command: spec.name.clone(),
            template: template.clone(),
            field: field.to_string(),
        }),
        None => Ok(()),
    }
}

/// Parse an optional risk level string.
pub fn parse_risk_level(value: Option<&str>) -> SpecResult<Option<RiskLevel>> {
    value.map(str::parse).transpose()
}

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn record<T>(&mut self, context: &str, result: SpecResult<T>) {
        if let Err(e) = result {
            self.add_error(format!("{}: {}", context, e));
        }
    }
}

/// Structural validator for a whole configuration.
///
/// Collects every problem instead of stopping at the first one, which is what
/// the `validate` command wants. Expansion itself is not performed here.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &ConfigSpec) -> ValidationResult {
        let mut result = ValidationResult::new();

        let global = &config.global;
        let mut taken = HashSet::new();
        result.record(
            "global",
            parse_env_imports(&global.from_env, "from_env", &mut taken),
        );
        result.record("global", parse_variable_declarations(&global.vars, "vars", &mut taken));
        result.record("global", parse_env_declarations(&global.env, "env"));

        match &global.env_allowlist {
            Some(list) if list.is_empty() => result.add_warning(
                "global: env_allowlist is empty; every external environment reference will be rejected",
            ),
            None => result.add_warning(
                "global: env_allowlist is not set; external environment access is disabled unless a group sets its own",
            ),
            Some(list) => {
                for name in list {
                    result.record("global.env_allowlist", check_name_syntax(name));
                }
            }
        }

        let mut group_names = HashSet::new();
        for group in &config.groups {
            if !group_names.insert(group.name.as_str()) {
                result.add_error(SpecError::DuplicateGroup(group.name.clone()).to_string());
            }
            Self::validate_group(group, &mut result);
        }

        result
    }

    fn validate_group(group: &GroupSpec, result: &mut ValidationResult) {
        let context = format!("group:{}", group.name);
        if group.name.is_empty() {
            result.add_error("group name cannot be empty");
        }

        let mut taken = HashSet::new();
        result.record(&context, parse_env_imports(&group.from_env, "from_env", &mut taken));
        result.record(&context, parse_variable_declarations(&group.vars, "vars", &mut taken));
        result.record(&context, parse_env_declarations(&group.env, "env"));

        if group.commands.is_empty() {
            result.add_warning(format!("{}: group has no commands", context));
        }

        let mut command_names = HashSet::new();
        for command in &group.commands {
            if !command_names.insert(command.name.as_str()) {
                result.add_error(
                    SpecError::DuplicateCommand {
                        group: group.name.clone(),
                        command: command.name.clone(),
                    }
                    .to_string(),
                );
            }

            let context = format!("command:{}/{}", group.name, command.name);
            result.record(&context, validate_command_spec(&group.name, command));

            let mut taken = HashSet::new();
            result.record(&context, parse_env_imports(&command.from_env, "from_env", &mut taken));
            result.record(&context, parse_variable_declarations(&command.vars, "vars", &mut taken));
            if let Some(env) = &command.env {
                result.record(&context, parse_env_declarations(env, "env"));
            }
            result.record(&context, parse_risk_level(command.risk_level.as_deref()));
        }
    }
}
