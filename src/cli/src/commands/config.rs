//! Configuration inspection commands.
//!
//! The effective configuration is the file given with `--config` (if any)
//! with `KEEL__*` environment variables layered on top.

use anyhow::{Context, Result};
use clap::Subcommand;
use keel_core::config::Config;
use std::path::Path;

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Show the built-in defaults
    Defaults,
}

/// Load the effective configuration.
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let path_str = path
                .to_str()
                .with_context(|| format!("Config path is not valid UTF-8: {}", path.display()))?;
            Config::from_file(path_str)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => Config::load().context("Failed to load config from environment"),
    }
}

pub fn execute(cmd: ConfigCommands, settings: &Config, format: OutputFormat) -> Result<()> {
    let config = match cmd {
        ConfigCommands::Show => settings.clone(),
        ConfigCommands::Defaults => Config::default(),
    };

    match format {
        OutputFormat::Table => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to serialize config")?;
            print!("{}", rendered);
        }
        _ => output::print_item(&config, format)?,
    }

    Ok(())
}
