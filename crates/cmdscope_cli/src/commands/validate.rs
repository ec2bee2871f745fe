//! Validate command - Check declarations and templates without expanding.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use cmdscope_spec::ConfigValidator;

use super::{load_config, load_templates, CliError};

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the runner configuration (YAML or TOML)
    #[arg(short, long, env = "CMDSCOPE_CONFIG")]
    config: PathBuf,

    /// Directory of additional template files
    #[arg(short, long)]
    templates: Option<PathBuf>,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("Validating {}", args.config.display());

    let config = load_config(&args.config)?;

    println!("📋 Validating declarations...");
    let result = ConfigValidator::validate(&config);
    if result.valid {
        println!("   ✅ Declarations are valid");
    } else {
        println!("   ❌ Declaration validation failed:");
        for error in &result.errors {
            println!("      - {}", error);
        }
    }
    for warning in &result.warnings {
        println!("   ⚠️  {}", warning);
    }

    println!("🧩 Validating templates...");
    match load_templates(&config, &args.config, args.templates.as_ref()) {
        Ok(registry) => println!("   ✅ {} template(s) loaded", registry.len()),
        Err(e) => {
            println!("   ❌ {:#}", e);
            return Err(e);
        }
    }

    if !result.valid {
        return Err(CliError::ValidationFailed(result.errors.len()).into());
    }

    println!();
    println!("✅ Validation passed");
    Ok(())
}
