//! Daemon configuration
//!
//! Read from `DESCHEDULER_*` environment variables, e.g.
//! `DESCHEDULER_INTERVAL_SECS=60` or
//! `DESCHEDULER_EXCLUDED_NAMESPACES=kube-system,monitoring`.

use anyhow::{Context, Result};
use descheduler_lib::config::StrategyConfig;
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "DESCHEDULER";

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DeschedulerConfig {
    /// Instance name used in logs, from the downward API
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between passes; 0 runs a single pass and exits
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default)]
    pub max_evictions_total: Option<i64>,

    #[serde(default)]
    pub max_evictions_per_node: Option<i64>,

    #[serde(default)]
    pub include_ownerless: bool,

    #[serde(default)]
    pub evict_local_storage_pods: bool,

    #[serde(default)]
    pub evict_system_critical_pods: bool,

    #[serde(default)]
    pub priority_threshold: Option<i32>,

    #[serde(default)]
    pub excluded_namespaces: Vec<String>,

    #[serde(default = "default_dispatch_concurrency")]
    pub dispatch_concurrency: usize,

    #[serde(default)]
    pub dry_run: bool,
}

fn default_instance() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "descheduler".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_interval() -> u64 {
    300
}

fn default_dispatch_concurrency() -> usize {
    StrategyConfig::default().dispatch_concurrency
}

impl DeschedulerConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_env(environment())
    }

    fn from_env(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env)
            .build()
            .context("Failed to read configuration")?;

        let loaded: Self = config
            .try_deserialize()
            .context("Invalid descheduler configuration")?;

        loaded
            .strategy()
            .validate()
            .context("Invalid eviction limits")?;

        Ok(loaded)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Strategy section handed to the descheduler
    pub fn strategy(&self) -> StrategyConfig {
        StrategyConfig {
            max_evictions_total: self.max_evictions_total,
            max_evictions_per_node: self.max_evictions_per_node,
            include_ownerless: self.include_ownerless,
            evict_local_storage_pods: self.evict_local_storage_pods,
            evict_system_critical_pods: self.evict_system_critical_pods,
            priority_threshold: self.priority_threshold,
            excluded_namespaces: self.excluded_namespaces.clone(),
            dispatch_concurrency: self.dispatch_concurrency,
            dry_run: self.dry_run,
        }
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("excluded_namespaces")
}
