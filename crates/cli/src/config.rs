//! Saved CLI defaults

use anyhow::{Context, Result};
use colored::Colorize;
use descheduler_lib::config::StrategyConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::{format_limit, OutputFormat};

/// Defaults applied to `plan` and `run` when the matching flag is absent
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub max_evictions_total: Option<i64>,
    pub max_evictions_per_node: Option<i64>,
    pub excluded_namespaces: Vec<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        serde_json::from_str(&content).context("Failed to parse config file")
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Reject budgets the descheduler would refuse
    pub fn validate(&self) -> Result<()> {
        StrategyConfig {
            max_evictions_total: self.max_evictions_total,
            max_evictions_per_node: self.max_evictions_per_node,
            ..Default::default()
        }
        .validate()?;
        Ok(())
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("dsctl").join("config.json"))
    }
}

/// Print saved defaults
pub fn show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Table => {
            println!("{}", "Saved Defaults".bold());
            println!("{}", "=".repeat(40));
            println!("Max evictions total:    {}", format_limit(config.max_evictions_total));
            println!("Max evictions per node: {}", format_limit(config.max_evictions_per_node));
            if config.excluded_namespaces.is_empty() {
                println!("Excluded namespaces:    {}", "none".dimmed());
            } else {
                println!("Excluded namespaces:    {}", config.excluded_namespaces.join(", "));
            }
        }
    }
    Ok(())
}
