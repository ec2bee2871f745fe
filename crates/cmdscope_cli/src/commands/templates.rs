//! Templates command - List the templates in a directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use cmdscope_templates::TemplateLoader;

#[derive(Args)]
pub struct TemplatesArgs {
    /// Directory containing template files
    #[arg(short, long)]
    templates: PathBuf,
}

pub fn execute(args: TemplatesArgs) -> Result<()> {
    info!("Loading templates from {}", args.templates.display());

    let registry = TemplateLoader::new(&args.templates)
        .load_all()
        .with_context(|| format!("Failed to load templates from {}", args.templates.display()))?;

    if registry.is_empty() {
        println!("⚠️  No templates found in {}", args.templates.display());
        return Ok(());
    }

    println!("📋 {} template(s):", registry.len());
    for (name, template) in registry.iter() {
        let risk = template.risk_level.as_deref().unwrap_or("low");
        match &template.description {
            Some(description) => println!("   {} [{}] - {}", name, risk, description),
            None => println!("   {} [{}]", name, risk),
        }
        if let Some(source) = registry.source(name) {
            println!("      from {}", source);
        }
    }
    Ok(())
}
