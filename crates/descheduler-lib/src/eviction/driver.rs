//! Eviction submission with budgets and per-candidate outcomes

use super::budget::{BudgetScope, EvictionBudget, Reservation};
use super::EvictionSink;
use crate::config::EvictionLimits;
use crate::duplicates::EvictionCandidate;
use crate::error::EvictionError;
use crate::models::ReplicaId;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;

/// What happened to one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvictionOutcome {
    Evicted,
    Failed { error: String },
    SkippedBudget { scope: BudgetScope },
}

/// Outcome for one candidate, in candidate order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvictionRecord {
    pub replica: ReplicaId,
    pub node: String,
    pub outcome: EvictionOutcome,
}

/// Totals for one execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Submissions sent to the sink
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped_budget: usize,
    pub failed: usize,
    pub records: Vec<EvictionRecord>,
}

impl EvictionReport {
    fn from_records(records: Vec<EvictionRecord>) -> Self {
        let mut report = Self::default();
        for record in &records {
            match record.outcome {
                EvictionOutcome::Evicted => {
                    report.attempted += 1;
                    report.succeeded += 1;
                }
                EvictionOutcome::Failed { .. } => {
                    report.attempted += 1;
                    report.failed += 1;
                }
                EvictionOutcome::SkippedBudget { .. } => report.skipped_budget += 1,
            }
        }
        report.records = records;
        report
    }
}

/// Submits evictions to a sink without retrying
///
/// Budget reservations are taken in candidate order before dispatch, so the
/// set of candidates that get submitted does not depend on sink latency.
/// Up to `concurrency` submissions are in flight at once. A failed
/// submission is recorded and the remaining candidates proceed.
pub struct EvictionDriver {
    sink: Arc<dyn EvictionSink>,
    concurrency: usize,
}

impl EvictionDriver {
    pub fn new(sink: Arc<dyn EvictionSink>, concurrency: usize) -> Self {
        Self {
            sink,
            concurrency: concurrency.max(1),
        }
    }

    /// Execute against a fresh budget built from the limits
    pub async fn execute(
        &self,
        candidates: &[EvictionCandidate],
        limits: EvictionLimits,
    ) -> EvictionReport {
        let budget = EvictionBudget::new(limits);
        self.execute_with_budget(candidates, &budget).await
    }

    /// Execute against a caller-owned budget
    pub async fn execute_with_budget(
        &self,
        candidates: &[EvictionCandidate],
        budget: &EvictionBudget,
    ) -> EvictionReport {
        let mut outcomes: Vec<Option<EvictionOutcome>> = vec![None; candidates.len()];
        let mut in_flight: JoinSet<(usize, Result<(), EvictionError>)> = JoinSet::new();

        for (position, candidate) in candidates.iter().enumerate() {
            match budget.try_reserve(candidate.node()) {
                Reservation::Exhausted(scope) => {
                    outcomes[position] = Some(EvictionOutcome::SkippedBudget { scope });
                }
                Reservation::Granted => {
                    while in_flight.len() >= self.concurrency {
                        Self::collect_one(&mut in_flight, &mut outcomes).await;
                    }

                    let sink = Arc::clone(&self.sink);
                    let replica = candidate.replica.id.clone();
                    in_flight.spawn(async move { (position, sink.evict(&replica).await) });
                }
            }
        }

        while !in_flight.is_empty() {
            Self::collect_one(&mut in_flight, &mut outcomes).await;
        }

        let records = candidates
            .iter()
            .zip(outcomes)
            .map(|(candidate, outcome)| EvictionRecord {
                replica: candidate.replica.id.clone(),
                node: candidate.node().to_string(),
                // A submission whose task died never reported back
                outcome: outcome.unwrap_or_else(|| EvictionOutcome::Failed {
                    error: "eviction task aborted".to_string(),
                }),
            })
            .collect();

        EvictionReport::from_records(records)
    }

    async fn collect_one(
        in_flight: &mut JoinSet<(usize, Result<(), EvictionError>)>,
        outcomes: &mut [Option<EvictionOutcome>],
    ) {
        match in_flight.join_next().await {
            Some(Ok((position, Ok(())))) => {
                outcomes[position] = Some(EvictionOutcome::Evicted);
            }
            Some(Ok((position, Err(e)))) => {
                outcomes[position] = Some(EvictionOutcome::Failed {
                    error: e.to_string(),
                });
            }
            Some(Err(_)) | None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::{GroupKey, SelectionReason};
    use crate::eviction::DryRunSink;
    use crate::models::Replica;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn candidate(name: &str, node: &str) -> EvictionCandidate {
        EvictionCandidate {
            replica: Replica::new("default", name).on_node(node),
            reason: SelectionReason {
                group: GroupKey::Owned("default/ReplicaSet/rs-1/nginx".to_string()),
                node: node.to_string(),
                on_node: 2,
                allowed: 1,
                excess: 1,
            },
        }
    }

    fn limits(total: Option<u64>, per_node: Option<u64>, concurrency: usize) -> EvictionLimits {
        EvictionLimits {
            total,
            per_node,
            concurrency,
        }
    }

    /// Sink that fails for a fixed set of names
    struct FlakySink {
        failing: HashSet<String>,
    }

    #[async_trait]
    impl EvictionSink for FlakySink {
        async fn evict(&self, replica: &ReplicaId) -> Result<(), EvictionError> {
            if self.failing.contains(&replica.name) {
                Err(EvictionError::DisruptionBudget("too many requests".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// Sink that tracks the peak number of concurrent calls
    #[derive(Default)]
    struct SlowSink {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl EvictionSink for SlowSink {
        async fn evict(&self, _replica: &ReplicaId) -> Result<(), EvictionError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_global_budget_skips_second_node() {
        let sink = Arc::new(DryRunSink::new());
        let driver = EvictionDriver::new(sink.clone(), 1);
        let candidates = vec![candidate("p1", "a"), candidate("p2", "b")];

        let report = driver.execute(&candidates, limits(Some(1), None, 1)).await;

        assert_eq!(report.attempted, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped_budget, 1);
        assert_eq!(
            report.records[1].outcome,
            EvictionOutcome::SkippedBudget {
                scope: BudgetScope::Global
            }
        );
        assert_eq!(sink.recorded().await.len(), 1);
    }

    #[tokio::test]
    async fn test_per_node_budget_skips_rest_of_node() {
        let sink = Arc::new(DryRunSink::new());
        let driver = EvictionDriver::new(sink.clone(), 2);
        let candidates = vec![
            candidate("p1", "a"),
            candidate("p2", "a"),
            candidate("p3", "a"),
            candidate("p4", "b"),
        ];

        let report = driver.execute(&candidates, limits(None, Some(1), 2)).await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.skipped_budget, 2);
        let evicted: Vec<_> = report
            .records
            .iter()
            .filter(|r| r.outcome == EvictionOutcome::Evicted)
            .map(|r| r.replica.name.as_str())
            .collect();
        assert_eq!(evicted, vec!["p1", "p4"]);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_abort_remaining() {
        let sink = Arc::new(FlakySink {
            failing: ["p2".to_string()].into_iter().collect(),
        });
        let driver = EvictionDriver::new(sink, 1);
        let candidates = vec![candidate("p1", "a"), candidate("p2", "b"), candidate("p3", "c")];

        let report = driver.execute(&candidates, EvictionLimits::unlimited()).await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(matches!(
            report.records[1].outcome,
            EvictionOutcome::Failed { .. }
        ));
        assert_eq!(report.records[2].outcome, EvictionOutcome::Evicted);
    }

    #[tokio::test]
    async fn test_failed_submission_still_counts_against_budget() {
        let sink = Arc::new(FlakySink {
            failing: ["p1".to_string()].into_iter().collect(),
        });
        let driver = EvictionDriver::new(sink, 1);
        let candidates = vec![candidate("p1", "a"), candidate("p2", "b")];

        let report = driver.execute(&candidates, limits(Some(1), None, 1)).await;

        assert_eq!(report.attempted, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped_budget, 1);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_and_budget_respected() {
        let sink = Arc::new(SlowSink::default());
        let driver = EvictionDriver::new(sink.clone(), 3);
        let candidates: Vec<_> = (0..20)
            .map(|i| candidate(&format!("p{}", i), &format!("n{}", i % 4)))
            .collect();

        let report = driver
            .execute(&candidates, limits(Some(10), Some(2), 3))
            .await;

        assert_eq!(report.attempted, 8);
        assert_eq!(report.succeeded, 8);
        assert_eq!(report.skipped_budget, 12);
        assert!(sink.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let driver = EvictionDriver::new(Arc::new(DryRunSink::new()), 4);
        let report = driver.execute(&[], EvictionLimits::unlimited()).await;
        assert_eq!(report, EvictionReport::default());
    }
}
