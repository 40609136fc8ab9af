//! Spread Descheduler CLI
//!
//! A command-line tool for inspecting duplicate-replica distribution,
//! previewing rebalancing plans and running a single descheduling pass.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{groups, plan, run};
use descheduler_lib::config::StrategyConfig;
use descheduler_lib::snapshot::{FileSnapshotSource, SnapshotSource};
use descheduler_lib::k8s::KubeSnapshotSource;
use std::path::PathBuf;

/// Spread Descheduler CLI
#[derive(Parser)]
#[command(name = "dsctl")]
#[command(author, version, about = "CLI for the Spread Descheduler", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kubeconfig: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show how duplicate groups are spread across nodes
    Groups {
        /// Read the cluster state from a JSON snapshot instead of the cluster
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Index replicas without a controller as well
        #[arg(long)]
        include_ownerless: bool,

        /// Include groups with a single member
        #[arg(long)]
        all: bool,
    },

    /// Compute the eviction plan without evicting anything
    Plan {
        /// Read the cluster state from a JSON snapshot instead of the cluster
        #[arg(long)]
        snapshot: Option<PathBuf>,

        #[command(flatten)]
        strategy: StrategyArgs,
    },

    /// Run one descheduling pass against the cluster
    Run {
        #[command(flatten)]
        strategy: StrategyArgs,

        /// Compute and report the plan without submitting evictions
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage saved defaults
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show saved defaults
    Show,

    /// Save default budgets and exclusions
    Set {
        #[arg(long)]
        max_evictions_total: Option<i64>,

        #[arg(long)]
        max_evictions_per_node: Option<i64>,

        /// Namespace never to evict from (repeatable)
        #[arg(long = "exclude-namespace")]
        excluded_namespaces: Vec<String>,
    },
}

/// Budget and eligibility flags shared by `plan` and `run`
#[derive(Args, Debug, Clone, Default)]
pub struct StrategyArgs {
    /// Maximum evictions in this pass
    #[arg(long)]
    pub max_evictions_total: Option<i64>,

    /// Maximum evictions per node in this pass
    #[arg(long)]
    pub max_evictions_per_node: Option<i64>,

    /// Index replicas without a controller as well
    #[arg(long)]
    pub include_ownerless: bool,

    /// Allow evicting replicas with emptyDir or hostPath volumes
    #[arg(long)]
    pub evict_local_storage: bool,

    /// Allow evicting system-critical replicas
    #[arg(long)]
    pub evict_system_critical: bool,

    /// Protect replicas at or above this priority
    #[arg(long)]
    pub priority_threshold: Option<i32>,

    /// Namespace never to evict from (repeatable)
    #[arg(long = "exclude-namespace")]
    pub excluded_namespaces: Vec<String>,

    /// Concurrent eviction requests
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl StrategyArgs {
    /// Merge flags over saved defaults; flags win
    pub fn to_strategy(&self, saved: &config::Config, dry_run: bool) -> StrategyConfig {
        let defaults = StrategyConfig::default();

        let mut excluded_namespaces = saved.excluded_namespaces.clone();
        for ns in &self.excluded_namespaces {
            if !excluded_namespaces.contains(ns) {
                excluded_namespaces.push(ns.clone());
            }
        }

        StrategyConfig {
            max_evictions_total: self.max_evictions_total.or(saved.max_evictions_total),
            max_evictions_per_node: self
                .max_evictions_per_node
                .or(saved.max_evictions_per_node),
            include_ownerless: self.include_ownerless,
            evict_local_storage_pods: self.evict_local_storage,
            evict_system_critical_pods: self.evict_system_critical,
            priority_threshold: self.priority_threshold,
            excluded_namespaces,
            dispatch_concurrency: self.concurrency.unwrap_or(defaults.dispatch_concurrency),
            dry_run,
        }
    }
}

/// Snapshot from a file if given, otherwise from the cluster
async fn snapshot_source(
    snapshot: Option<PathBuf>,
    kubeconfig: Option<&str>,
) -> Result<Box<dyn SnapshotSource>> {
    match snapshot {
        Some(path) => Ok(Box::new(FileSnapshotSource::new(path))),
        None => {
            let client = client::connect(kubeconfig).await?;
            Ok(Box::new(KubeSnapshotSource::new(client)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let saved = config::Config::load()?;

    match cli.command {
        Commands::Groups {
            snapshot,
            include_ownerless,
            all,
        } => {
            let source = snapshot_source(snapshot, cli.kubeconfig.as_deref()).await?;
            groups::show_groups(source.as_ref(), include_ownerless, all, cli.format).await?;
        }
        Commands::Plan { snapshot, strategy } => {
            let source = snapshot_source(snapshot, cli.kubeconfig.as_deref()).await?;
            let strategy = strategy.to_strategy(&saved, true);
            plan::show_plan(source.as_ref(), &strategy, cli.format).await?;
        }
        Commands::Run { strategy, dry_run } => {
            let client = client::connect(cli.kubeconfig.as_deref()).await?;
            let strategy = strategy.to_strategy(&saved, dry_run);
            run::run_pass(client, strategy, cli.format).await?;
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => {
                config::show(&saved, cli.format)?;
            }
            ConfigCommands::Set {
                max_evictions_total,
                max_evictions_per_node,
                excluded_namespaces,
            } => {
                let mut updated = saved;
                updated.max_evictions_total = max_evictions_total.or(updated.max_evictions_total);
                updated.max_evictions_per_node =
                    max_evictions_per_node.or(updated.max_evictions_per_node);
                if !excluded_namespaces.is_empty() {
                    updated.excluded_namespaces = excluded_namespaces;
                }
                updated.validate()?;
                updated.save()?;
                output::print_success("Saved defaults");
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_saved_defaults() {
        let saved = config::Config {
            max_evictions_total: Some(10),
            max_evictions_per_node: Some(2),
            excluded_namespaces: vec!["kube-system".to_string()],
        };
        let args = StrategyArgs {
            max_evictions_per_node: Some(1),
            excluded_namespaces: vec!["kube-system".to_string(), "monitoring".to_string()],
            ..Default::default()
        };

        let strategy = args.to_strategy(&saved, false);

        assert_eq!(strategy.max_evictions_total, Some(10));
        assert_eq!(strategy.max_evictions_per_node, Some(1));
        assert_eq!(strategy.excluded_namespaces, vec!["kube-system", "monitoring"]);
        assert_eq!(strategy.dispatch_concurrency, 4);
        assert!(!strategy.dry_run);
    }

    #[test]
    fn test_cli_parses_plan_flags() {
        let cli = Cli::try_parse_from([
            "dsctl",
            "plan",
            "--snapshot",
            "cluster.json",
            "--max-evictions-per-node",
            "1",
            "--exclude-namespace",
            "kube-system",
            "--format",
            "json",
        ])
        .unwrap();

        assert!(matches!(cli.format, output::OutputFormat::Json));
        match cli.command {
            Commands::Plan { snapshot, strategy } => {
                assert_eq!(snapshot, Some(PathBuf::from("cluster.json")));
                assert_eq!(strategy.max_evictions_per_node, Some(1));
                assert_eq!(strategy.excluded_namespaces, vec!["kube-system"]);
            }
            _ => panic!("expected plan command"),
        }
    }
}
