//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an optional budget
pub fn format_limit(limit: Option<i64>) -> String {
    limit
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unlimited".to_string())
}

/// Color an excess count: zero is fine, anything else needs attention
pub fn color_excess(excess: usize) -> String {
    if excess == 0 {
        excess.to_string().green().to_string()
    } else {
        excess.to_string().red().bold().to_string()
    }
}

/// Color an eviction outcome
pub fn color_outcome(outcome: &str) -> String {
    match outcome {
        "evicted" => outcome.green().to_string(),
        "skipped_budget" => outcome.yellow().to_string(),
        "failed" => outcome.red().to_string(),
        _ => outcome.to_string(),
    }
}
