//! One-shot descheduling pass

use anyhow::Result;
use colored::Colorize;
use descheduler_lib::config::StrategyConfig;
use descheduler_lib::eviction::EvictionOutcome;
use descheduler_lib::health::HealthRegistry;
use descheduler_lib::k8s::{KubeEvictionSink, KubeSnapshotSource};
use descheduler_lib::observability::StructuredLogger;
use descheduler_lib::runner::{Descheduler, PassOutcome};
use serde::Serialize;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{color_outcome, print_info, print_json, print_table, OutputFormat};

/// Row for the eviction report table
#[derive(Tabled, Serialize)]
struct RecordRow {
    #[tabled(rename = "Replica")]
    replica: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn record_rows(outcome: &PassOutcome) -> Vec<RecordRow> {
    outcome
        .report
        .records
        .iter()
        .map(|record| {
            let (status, detail) = match &record.outcome {
                EvictionOutcome::Evicted => ("evicted", String::new()),
                EvictionOutcome::Failed { error } => ("failed", error.clone()),
                EvictionOutcome::SkippedBudget { scope } => (
                    "skipped_budget",
                    format!("{:?} budget exhausted", scope).to_lowercase(),
                ),
            };
            RecordRow {
                replica: record.replica.to_string(),
                node: record.node.clone(),
                outcome: color_outcome(status),
                detail,
            }
        })
        .collect()
}

/// Plan against the live cluster and submit evictions
pub async fn run_pass(
    client: kube::Client,
    strategy: StrategyConfig,
    format: OutputFormat,
) -> Result<()> {
    let dry_run = strategy.dry_run;
    let descheduler = Descheduler::new(
        Arc::new(KubeSnapshotSource::new(client.clone())),
        Arc::new(KubeEvictionSink::new(client)),
        strategy,
        HealthRegistry::new(),
        StructuredLogger::new("dsctl"),
    )?;

    let outcome = descheduler.run_pass().await?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table => {
            let title = if dry_run {
                "Descheduling Pass (dry run)"
            } else {
                "Descheduling Pass"
            };
            println!("{}", title.bold());
            println!("{}", "=".repeat(60));
            println!("Excess replicas:        {}", outcome.plan.total_excess());
            println!("Candidates:             {}", outcome.plan.selected_count());
            println!();

            if outcome.report.records.is_empty() {
                print_info("Nothing to evict");
                return Ok(());
            }

            print_table(&record_rows(&outcome), format);
            println!();

            let report = &outcome.report;
            println!(
                "{} {}  {} {}  {} {}",
                "Evicted:".bold(),
                report.succeeded.to_string().green(),
                "Failed:".bold(),
                report.failed.to_string().red(),
                "Skipped:".bold(),
                report.skipped_budget.to_string().yellow()
            );
            if dry_run {
                print_info("Dry run: no evictions were submitted");
            }
        }
    }

    Ok(())
}
