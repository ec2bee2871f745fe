//! cmdscope CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Template error
//! - 5: Expansion or security error

use std::process::ExitCode;

use clap::Parser;
use cmdscope_core::ResolveError;
use cmdscope_spec::SpecError;
use cmdscope_templates::TemplateError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, CliError, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
    pub const EXPANSION_ERROR: u8 = 5;
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cmdscope={},warn", level)));

    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let result = match cli.command {
        Commands::Resolve(args) => commands::resolve::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Templates(args) => commands::templates::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Map an error chain to an exit code.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<ResolveError>() {
            return match err {
                ResolveError::Expansion { .. }
                | ResolveError::UnsafeValue { .. }
                | ResolveError::Policy(_) => ExitCodes::EXPANSION_ERROR,
                ResolveError::Template { .. }
                | ResolveError::TemplateNotFound { .. }
                | ResolveError::Templates(_) => ExitCodes::TEMPLATE_ERROR,
                ResolveError::Declaration { .. } | ResolveError::Spec(_) => {
                    ExitCodes::VALIDATION_FAILURE
                }
                ResolveError::GroupNotFound(_) => ExitCodes::INVALID_ARGS,
            };
        }
        if cause.downcast_ref::<TemplateError>().is_some() {
            return ExitCodes::TEMPLATE_ERROR;
        }
        if cause.downcast_ref::<SpecError>().is_some() {
            return ExitCodes::VALIDATION_FAILURE;
        }
        if let Some(err) = cause.downcast_ref::<CliError>() {
            return match err {
                CliError::ValidationFailed(_) => ExitCodes::VALIDATION_FAILURE,
                CliError::Incomplete(_) => ExitCodes::EXPANSION_ERROR,
            };
        }
    }
    ExitCodes::GENERAL_ERROR
}
