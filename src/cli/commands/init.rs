//! `vanguard init` command.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::Path;

use crate::cli::context::AppContext;
use crate::domain::models::Config;

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

/// Create `.vanguard/config.yaml` and the database with its schema.
pub async fn execute(args: InitArgs, json: bool) -> Result<()> {
    let config_path = Path::new(".vanguard/config.yaml");
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            config_path.display()
        );
    }

    std::fs::create_dir_all(".vanguard").context("Failed to create .vanguard directory")?;

    let config = Config::default();
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize default config")?;
    std::fs::write(config_path, yaml).context("Failed to write config file")?;

    // Opening the context creates the database and applies migrations
    let ctx = AppContext::with_config(config).await?;
    crate::adapters::sqlite::verify_connection(&ctx.pool).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "config": config_path.display().to_string(),
                "database": ctx.config.database.path,
            }))?
        );
    } else {
        println!("Initialized vanguard project.");
        println!("  Config: {}", config_path.display());
        println!("  Database: {}", ctx.config.database.path);
    }
    Ok(())
}
