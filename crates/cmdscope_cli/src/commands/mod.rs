//! CLI command definitions.
//!
//! Each subcommand loads a configuration file, optionally a directory of
//! template files, and reports on them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::debug;

use cmdscope_spec::{ConfigReader, ConfigSpec};
use cmdscope_templates::{TemplateLoader, TemplateRegistry};

pub mod resolve;
pub mod templates;
pub mod validate;

/// cmdscope - scoped variable expansion for command runners
#[derive(Parser)]
#[command(name = "cmdscope")]
#[command(version, about = "cmdscope - scoped variable expansion for command runners")]
#[command(long_about = r#"
cmdscope reads a runner configuration, expands %{VAR} references through the
global, group and command scopes, binds command templates and rejects values
that could inject shell syntax.

COMMANDS:
  resolve    → Expand every command and print the result
  validate   → Check declarations and templates without expanding
  templates  → List the templates found in a directory

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Template error
  5 - Expansion or security error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a configuration into executable commands
    Resolve(resolve::ResolveArgs),

    /// Validate a configuration and its templates
    Validate(validate::ValidateArgs),

    /// List templates from a directory
    Templates(templates::TemplatesArgs),
}

/// Failures reported by the commands themselves.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("validation failed with {0} error(s)")]
    ValidationFailed(usize),

    #[error("resolution incomplete: {0} failure(s)")]
    Incomplete(usize),
}

/// Read a configuration file.
pub fn load_config(path: &Path) -> Result<ConfigSpec> {
    debug!("Loading configuration from {}", path.display());
    ConfigReader::from_path(path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))
}

/// Templates declared inline in the configuration, merged with the ones from
/// `dir` when given. A name defined in both places is an error.
pub fn load_templates(
    config: &ConfigSpec,
    config_path: &Path,
    dir: Option<&PathBuf>,
) -> Result<TemplateRegistry> {
    let mut registry =
        TemplateRegistry::from_map(&config.templates, &config_path.display().to_string())?;

    if let Some(dir) = dir {
        let loaded = TemplateLoader::new(dir)
            .load_all()
            .with_context(|| format!("Failed to load templates from {}", dir.display()))?;
        registry.merge(loaded)?;
    }

    debug!("{} template(s) available", registry.len());
    Ok(registry)
}
