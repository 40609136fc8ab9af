//! Duplicate group distribution

use anyhow::Result;
use colored::Colorize;
use descheduler_lib::duplicates::{FairnessPlan, RemoveDuplicates};
use descheduler_lib::snapshot::SnapshotSource;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{color_excess, print_info, print_table, OutputFormat};

/// Row for the distribution table, one per group and node
#[derive(Tabled, Serialize)]
struct GroupRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Total")]
    total: usize,
    #[tabled(rename = "Actual")]
    actual: usize,
    #[tabled(rename = "Allowed")]
    allowed: usize,
    #[tabled(rename = "Excess")]
    #[serde(skip)]
    excess_display: String,
    #[tabled(skip)]
    excess: usize,
}

/// Show how each duplicate group is spread across nodes
pub async fn show_groups(
    source: &dyn SnapshotSource,
    include_ownerless: bool,
    all: bool,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = source.snapshot().await?;
    let index = RemoveDuplicates::new(include_ownerless).index(&snapshot);
    let fairness = FairnessPlan::compute(&index);

    let mut rows = Vec::new();
    for (key, allotment) in fairness.groups() {
        if !all && allotment.total < 2 {
            continue;
        }
        for (node, share) in &allotment.nodes {
            rows.push(GroupRow {
                group: key.to_string(),
                node: node.clone(),
                total: allotment.total,
                actual: share.actual,
                allowed: share.allowed,
                excess_display: color_excess(share.excess),
                excess: share.excess,
            });
        }
    }

    if let OutputFormat::Table = format {
        println!("{}", "Duplicate Groups".bold());
        println!("{}", "=".repeat(60));
        println!(
            "Nodes: {}  Replicas indexed: {}",
            index.node_names().count(),
            index.replica_count()
        );
        println!();
    }

    print_table(&rows, format);

    if let OutputFormat::Table = format {
        let excess = fairness.total_excess();
        if excess > 0 {
            println!();
            print_info(&format!(
                "{} replica(s) above their node's fair share; run `dsctl plan` to preview evictions",
                excess
            ));
        }
    }

    Ok(())
}
