//! Subcommand implementations

pub mod groups;
pub mod plan;
pub mod run;
