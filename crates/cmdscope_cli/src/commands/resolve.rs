//! Resolve command - Expand a configuration into executable commands.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;
use tracing::info;

use cmdscope_core::{ConfigResolver, Resolution, ResolveOptions, ResolvedCommand, Warning};
use cmdscope_policy::redact_env;
use cmdscope_spec::RiskLevel;

use super::{load_config, load_templates, CliError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Path to the runner configuration (YAML or TOML)
    #[arg(short, long, env = "CMDSCOPE_CONFIG")]
    config: PathBuf,

    /// Directory of additional template files
    #[arg(short, long)]
    templates: Option<PathBuf>,

    /// Only resolve this group
    #[arg(short, long)]
    group: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Keep resolving other groups and commands after a failure
    #[arg(long)]
    keep_going: bool,

    /// Print environment values that look like secrets
    #[arg(long)]
    show_secrets: bool,
}

/// A resolved command as printed.
#[derive(Debug, Serialize)]
struct CommandView<'a> {
    group: &'a str,
    name: &'a str,
    cmd: &'a str,
    args: &'a [String],
    env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workdir: Option<&'a str>,
    risk_level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<&'a str>,
}

impl<'a> CommandView<'a> {
    fn new(command: &'a ResolvedCommand, show_secrets: bool) -> Self {
        let env = if show_secrets {
            command.env.clone()
        } else {
            redact_env(&command.env)
        };
        Self {
            group: &command.group,
            name: &command.name,
            cmd: &command.cmd,
            args: &command.args,
            env,
            workdir: command.workdir.as_deref(),
            risk_level: command.risk_level,
            template: command.template.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    commands: Vec<CommandView<'a>>,
    warnings: &'a [Warning],
    failures: Vec<String>,
}

impl<'a> Report<'a> {
    fn new(resolution: &'a Resolution, show_secrets: bool) -> Self {
        Self {
            commands: resolution
                .commands()
                .map(|c| CommandView::new(c, show_secrets))
                .collect(),
            warnings: &resolution.warnings,
            failures: resolution.failures.iter().map(|e| e.to_string()).collect(),
        }
    }
}

pub fn execute(args: ResolveArgs) -> Result<()> {
    info!("Resolving {}", args.config.display());

    let config = load_config(&args.config)?;
    let templates = load_templates(&config, &args.config, args.templates.as_ref())?;

    let mut options = ResolveOptions::new().fail_fast(!args.keep_going);
    if let Some(group) = &args.group {
        options = options.only_group(group.clone());
    }

    let resolution = ConfigResolver::new(&config, &templates).resolve(&options)?;
    let report = Report::new(&resolution, args.show_secrets);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }

    if !resolution.is_complete() {
        return Err(CliError::Incomplete(resolution.failures.len()).into());
    }
    Ok(())
}

fn print_text(report: &Report<'_>) {
    for command in &report.commands {
        println!("📋 {}/{} [{}]", command.group, command.name, command.risk_level);
        if let Some(template) = command.template {
            println!("   template: {}", template);
        }
        println!("   $ {}", render_command_line(command.cmd, command.args));
        if let Some(workdir) = command.workdir {
            println!("   workdir: {}", workdir);
        }
        for (key, value) in &command.env {
            println!("   {}={}", key, value);
        }
    }

    for warning in report.warnings {
        println!("⚠️  {}", warning);
    }
    for failure in &report.failures {
        println!("❌ {}", failure);
    }

    if report.failures.is_empty() {
        println!("✅ {} command(s) resolved", report.commands.len());
    }
}

/// Quote arguments containing whitespace so the printed line reads back as
/// the same argument vector.
fn render_command_line(cmd: &str, args: &[String]) -> String {
    let mut line = cmd.to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.chars().any(char::is_whitespace) {
            line.push_str(&format!("{:?}", arg));
        } else {
            line.push_str(arg);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> ResolvedCommand {
        ResolvedCommand {
            group: "deploy".to_string(),
            name: "push".to_string(),
            cmd: "curl".to_string(),
            args: vec!["-H".to_string(), "Authorization: x".to_string()],
            env: BTreeMap::from([
                ("API_TOKEN".to_string(), "abc123".to_string()),
                ("REGION".to_string(), "eu".to_string()),
            ]),
            workdir: None,
            risk_level: RiskLevel::High,
            template: None,
        }
    }

    #[test]
    fn test_view_redacts_by_default() {
        let command = command();
        let view = CommandView::new(&command, false);
        assert_ne!(view.env["API_TOKEN"], "abc123");
        assert_eq!(view.env["REGION"], "eu");

        let view = CommandView::new(&command, true);
        assert_eq!(view.env["API_TOKEN"], "abc123");
    }

    #[test]
    fn test_render_command_line() {
        let command = command();
        assert_eq!(
            render_command_line(&command.cmd, &command.args),
            "curl -H \"Authorization: x\""
        );
        assert_eq!(render_command_line("true", &[]), "true");
        assert_eq!(render_command_line("echo", &[String::new()]), "echo \"\"");
    }

    #[test]
    fn test_view_serializes_without_empty_options() {
        let command = command();
        let json = serde_json::to_value(CommandView::new(&command, false)).unwrap();
        assert_eq!(json["risk_level"], "high");
        assert!(json.get("workdir").is_none());
        assert!(json.get("template").is_none());
    }
}
