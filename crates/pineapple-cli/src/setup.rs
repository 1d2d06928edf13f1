//! Config file handling for the CLI — load, show, init.

use colored::*;
use std::path::{Path, PathBuf};

use pineapple_core::config::UpdaterConfig;

/// Config path: the `--config` override or the per-user default.
pub fn config_path(override_path: Option<&Path>) -> PathBuf {
    override_path
        .map(Path::to_path_buf)
        .unwrap_or_else(UpdaterConfig::default_path)
}

pub fn load_config(override_path: Option<&Path>) -> anyhow::Result<UpdaterConfig> {
    let path = config_path(override_path);
    let config = UpdaterConfig::load(&path)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Application data directory (logs live here).
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pineapple")
}

pub fn run_config_show(override_path: Option<&Path>) -> anyhow::Result<()> {
    let path = config_path(override_path);

    println!();
    println!("  {} {}", "Config file:".dimmed(), path.display());
    if !path.exists() {
        println!(
            "  {}",
            "No config file yet, showing defaults. Run `pineapple config init` to write one."
                .yellow()
        );
    }
    println!();

    let config = UpdaterConfig::load(&path)?;
    let rendered = toml::to_string_pretty(&config)?;
    for line in rendered.lines() {
        if line.starts_with('[') {
            println!("  {}", line.cyan().bold());
        } else if let Some((key, value)) = line.split_once(" = ") {
            println!("  {} = {}", key.cyan(), value.green());
        } else {
            println!("  {}", line);
        }
    }
    println!();
    Ok(())
}

pub fn run_config_init(override_path: Option<&Path>) -> anyhow::Result<()> {
    let path = config_path(override_path);
    if path.exists() {
        println!(
            "  {} {}",
            "Config already exists:".yellow(),
            path.display()
        );
        return Ok(());
    }

    UpdaterConfig::default().save(&path)?;
    println!("  {} {}", "✅ Wrote default config to".green(), path.display());
    Ok(())
}
