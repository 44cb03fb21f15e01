use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use dialoguer::{Confirm, Input};
use mongrate_config::{AppConfig, ConfigLoader};
use tracing::info;

/// Write a starter config. Prompts for each value on a terminal; elsewhere
/// the defaults are written as-is.
pub fn run_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (pass --force to overwrite)",
            config_path.display()
        );
    }

    let config = if std::io::stdin().is_terminal() {
        prompt_config()?
    } else {
        println!("Non-interactive environment detected, writing defaults.");
        AppConfig::default()
    };

    write_config(config_path, &config)?;

    println!();
    println!("  Config written to {}", config_path.display());
    println!("  Run `mongrate status` to preview pending scripts.");
    println!();
    Ok(())
}

fn prompt_config() -> Result<AppConfig> {
    println!();
    println!("  Mongrate Setup");
    println!("  --------------");
    println!();

    let mut config = AppConfig::default();

    config.database.uri = Input::new()
        .with_prompt("MongoDB connection string")
        .default(config.database.uri.clone())
        .interact_text()
        .context("connection string input cancelled")?;

    config.database.name = Input::new()
        .with_prompt("Database name")
        .default(config.database.name.clone())
        .interact_text()
        .context("database name input cancelled")?;

    let scripts_dir: String = Input::new()
        .with_prompt("Scripts directory")
        .default(config.migration.scripts_dir.display().to_string())
        .interact_text()
        .context("scripts directory input cancelled")?;
    config.migration.scripts_dir = PathBuf::from(scripts_dir);

    let suffix: String = Input::new()
        .with_prompt("History collection suffix (optional)")
        .allow_empty(true)
        .interact_text()
        .context("suffix input cancelled")?;
    let suffix = suffix.trim();
    config.migration.collection_suffix = (!suffix.is_empty()).then(|| suffix.to_string());

    config.migration.fail_on_order_mismatch = Confirm::new()
        .with_prompt("Fail when an applied script sorts below a pending one?")
        .default(config.migration.fail_on_order_mismatch)
        .interact()
        .context("order check choice cancelled")?;

    Ok(config)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<()> {
    ConfigLoader::write(path, config)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("config written to {}", path.display());
    Ok(())
}
