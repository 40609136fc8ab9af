//! Eviction plan preview

use anyhow::Result;
use colored::Colorize;
use descheduler_lib::config::StrategyConfig;
use descheduler_lib::duplicates::{DuplicatePlan, RemoveDuplicates};
use descheduler_lib::policy::EligibilityPolicy;
use descheduler_lib::snapshot::SnapshotSource;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{
    format_limit, print_json, print_success, print_table, print_warning, OutputFormat,
};

/// Row for the candidates table
#[derive(Tabled, Serialize)]
struct CandidateRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Replica")]
    replica: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "On Node")]
    on_node: usize,
    #[tabled(rename = "Allowed")]
    allowed: usize,
}

fn candidate_rows(plan: &DuplicatePlan) -> Vec<CandidateRow> {
    plan.candidates()
        .into_iter()
        .map(|c| CandidateRow {
            node: c.reason.node.clone(),
            replica: c.replica.id.to_string(),
            group: c.reason.group.to_string(),
            on_node: c.reason.on_node,
            allowed: c.reason.allowed,
        })
        .collect()
}

/// Compute and print the plan for one snapshot
pub async fn show_plan(
    source: &dyn SnapshotSource,
    strategy: &StrategyConfig,
    format: OutputFormat,
) -> Result<()> {
    strategy.validate()?;
    let snapshot = source.snapshot().await?;
    let plan = RemoveDuplicates::from_config(strategy)
        .plan(&snapshot, &EligibilityPolicy::from_config(strategy));

    match format {
        OutputFormat::Json => print_json(&plan)?,
        OutputFormat::Table => {
            println!("{}", "Rebalancing Plan".bold());
            println!("{}", "=".repeat(60));
            println!("Replicas indexed:       {}", plan.replicas_indexed);
            println!("Groups observed:        {}", plan.groups_observed);
            println!("Excess replicas:        {}", plan.total_excess());
            println!(
                "Budget (total/node):    {} / {}",
                format_limit(strategy.max_evictions_total),
                format_limit(strategy.max_evictions_per_node)
            );
            println!();

            if plan.is_empty() {
                print_success("Every duplicate group is within its fair share");
                return Ok(());
            }

            print_table(&candidate_rows(&plan), format);

            let unselected = plan.unselected_count();
            if unselected > 0 {
                println!();
                print_warning(&format!(
                    "{} excess replica(s) left in place: not enough eligible members",
                    unselected
                ));
            }
        }
    }

    Ok(())
}
