//! Eviction execution
//!
//! This module provides:
//! - The [`EvictionSink`] seam through which evictions leave the process
//! - Atomic global and per-node eviction budgets
//! - The driver that submits candidates and reports per-candidate outcomes
//!
//! Retries and backoff belong to the sink implementation, never to the
//! driver.

mod budget;
mod driver;

pub use budget::{BudgetScope, EvictionBudget, Reservation};
pub use driver::{EvictionDriver, EvictionOutcome, EvictionRecord, EvictionReport};

use crate::error::EvictionError;
use crate::models::ReplicaId;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Accepts one eviction request at a time
#[async_trait]
pub trait EvictionSink: Send + Sync {
    /// Request eviction of a single replica
    async fn evict(&self, replica: &ReplicaId) -> Result<(), EvictionError>;
}

/// Sink that records requests instead of evicting
#[derive(Debug, Default)]
pub struct DryRunSink {
    recorded: Mutex<Vec<ReplicaId>>,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, in arrival order
    pub async fn recorded(&self) -> Vec<ReplicaId> {
        self.recorded.lock().await.clone()
    }
}

#[async_trait]
impl EvictionSink for DryRunSink {
    async fn evict(&self, replica: &ReplicaId) -> Result<(), EvictionError> {
        self.recorded.lock().await.push(replica.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_sink_records() {
        let sink = DryRunSink::new();
        sink.evict(&ReplicaId::new("default", "p1")).await.unwrap();
        sink.evict(&ReplicaId::new("default", "p2")).await.unwrap();

        let recorded = sink.recorded().await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].name, "p1");
    }
}
