//! Error types surfaced by the descheduler library

use thiserror::Error;

/// Invalid strategy configuration, detected before any eviction is submitted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be >= 0, got {value}")]
    NegativeBudget { field: &'static str, value: i64 },

    #[error("dispatch_concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Failure reported by an eviction sink for a single replica
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvictionError {
    /// The replica no longer exists
    #[error("replica not found")]
    NotFound,

    /// A disruption budget currently forbids the eviction
    #[error("eviction blocked by disruption budget: {0}")]
    DisruptionBudget(String),

    /// Any other API-level failure
    #[error("eviction request failed: {0}")]
    Api(String),
}
