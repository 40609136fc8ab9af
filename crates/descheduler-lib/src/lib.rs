//! Duplicate-replica rebalancing for Kubernetes clusters
//!
//! This crate provides the core functionality for:
//! - Grouping replicas of the same workload and computing fair shares
//! - Selecting excess replicas subject to eligibility checks
//! - Budgeted, concurrent eviction submission
//! - Kubernetes snapshot and eviction adapters
//! - Health checks and observability

pub mod config;
pub mod duplicates;
pub mod error;
pub mod eviction;
pub mod health;
pub mod k8s;
pub mod models;
pub mod observability;
pub mod policy;
pub mod runner;
pub mod snapshot;

pub use config::{EvictionLimits, StrategyConfig};
pub use duplicates::{DuplicatePlan, EvictionCandidate, GroupKey, RemoveDuplicates};
pub use error::{ConfigError, EvictionError};
pub use eviction::{DryRunSink, EvictionDriver, EvictionReport, EvictionSink};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DeschedulerMetrics, StructuredLogger};
pub use policy::{EligibilityPolicy, EligibilityPredicate};
pub use runner::{Descheduler, DeschedulingLoop, LoopConfig, PassOutcome};
pub use snapshot::{FileSnapshotSource, SnapshotSource, StaticSnapshotSource};
