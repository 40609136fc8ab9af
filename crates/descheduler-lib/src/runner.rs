//! Descheduling passes and the periodic loop
//!
//! A pass takes a snapshot, plans against it and submits the selected
//! candidates. Logging, metrics and health reporting all happen here so the
//! planner and the driver stay pure.

use crate::config::{EvictionLimits, StrategyConfig};
use crate::duplicates::{DuplicatePlan, RemoveDuplicates};
use crate::error::ConfigError;
use crate::eviction::{DryRunSink, EvictionDriver, EvictionReport, EvictionSink};
use crate::health::{components, HealthRegistry};
use crate::observability::{DeschedulerMetrics, StructuredLogger};
use crate::policy::{EligibilityPolicy, EligibilityPredicate};
use crate::snapshot::SnapshotSource;
use anyhow::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Builds the per-pass eligibility predicate
///
/// Called once per pass so stateful checks such as a disruption allowance
/// start fresh each time.
pub type PolicyFactory =
    Arc<dyn Fn(&StrategyConfig) -> Box<dyn EligibilityPredicate> + Send + Sync>;

/// Result of one pass
#[derive(Debug, Clone, Serialize)]
pub struct PassOutcome {
    pub pass: u64,
    pub dry_run: bool,
    pub plan: DuplicatePlan,
    pub report: EvictionReport,
    pub elapsed_ms: u64,
}

/// Runs descheduling passes against a snapshot source and an eviction sink
pub struct Descheduler {
    source: Arc<dyn SnapshotSource>,
    sink: Arc<dyn EvictionSink>,
    config: StrategyConfig,
    limits: EvictionLimits,
    strategy: RemoveDuplicates,
    policy: PolicyFactory,
    health: HealthRegistry,
    metrics: DeschedulerMetrics,
    logger: StructuredLogger,
    passes: AtomicU64,
}

impl Descheduler {
    /// Create a descheduler, rejecting invalid budgets up front
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        sink: Arc<dyn EvictionSink>,
        config: StrategyConfig,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Result<Self, ConfigError> {
        let limits = config.validate()?;
        Ok(Self {
            source,
            sink,
            strategy: RemoveDuplicates::from_config(&config),
            limits,
            config,
            policy: Arc::new(|config: &StrategyConfig| -> Box<dyn EligibilityPredicate> {
                Box::new(EligibilityPolicy::from_config(config))
            }),
            health,
            metrics: DeschedulerMetrics::new(),
            logger,
            passes: AtomicU64::new(0),
        })
    }

    /// Replace the eligibility policy factory
    pub fn with_policy(mut self, policy: PolicyFactory) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Passes started so far
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Snapshot, plan and evict once
    ///
    /// Fails only when the snapshot cannot be taken; eviction failures are
    /// reported in the outcome.
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        let pass = self.passes.fetch_add(1, Ordering::Relaxed) + 1;
        let start = Instant::now();
        self.logger.log_pass_started(pass);

        let snapshot = match self.source.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.logger.log_snapshot_error(pass, &e);
                self.metrics.inc_pass_errors();
                self.health
                    .set_unhealthy(components::SNAPSHOT_SOURCE, format!("{:#}", e))
                    .await;
                return Err(e);
            }
        };
        self.health.set_healthy(components::SNAPSHOT_SOURCE).await;

        let predicate = (self.policy)(&self.config);
        let plan = self.strategy.plan(&snapshot, predicate.as_ref());
        self.metrics.record_plan(&plan);
        self.logger.log_plan(pass, &plan);
        self.health.set_healthy(components::PLANNER).await;

        let sink: Arc<dyn EvictionSink> = if self.config.dry_run {
            Arc::new(DryRunSink::new())
        } else {
            Arc::clone(&self.sink)
        };
        let driver = EvictionDriver::new(sink, self.limits.concurrency);
        let report = driver.execute(&plan.candidates(), self.limits).await;

        for record in &report.records {
            self.logger.log_eviction(pass, record);
        }
        self.metrics.record_report(&report);
        self.update_evictor_health(&report).await;

        let elapsed = start.elapsed();
        self.metrics.observe_pass_duration(elapsed.as_secs_f64());
        self.logger
            .log_pass_completed(pass, &report, elapsed.as_millis(), self.config.dry_run);
        self.health.set_ready(true).await;

        Ok(PassOutcome {
            pass,
            dry_run: self.config.dry_run,
            plan,
            report,
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }

    async fn update_evictor_health(&self, report: &EvictionReport) {
        if report.attempted > 0 && report.failed == report.attempted {
            self.health
                .set_unhealthy(
                    components::EVICTOR,
                    format!("All {} evictions failed", report.failed),
                )
                .await;
        } else if report.failed > 0 {
            self.health
                .set_degraded(
                    components::EVICTOR,
                    format!("{} of {} evictions failed", report.failed, report.attempted),
                )
                .await;
        } else {
            self.health.set_healthy(components::EVICTOR).await;
        }
    }
}

/// Configuration for the descheduling loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Time between passes; zero runs a single pass and returns
    pub interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

/// Runs passes periodically until shutdown
pub struct DeschedulingLoop {
    descheduler: Arc<Descheduler>,
    config: LoopConfig,
}

impl DeschedulingLoop {
    pub fn new(descheduler: Arc<Descheduler>, config: LoopConfig) -> Self {
        Self {
            descheduler,
            config,
        }
    }

    /// Run until a shutdown signal arrives
    ///
    /// A failed pass has already been logged and reported to health; the
    /// loop carries on with the next tick.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.config.interval.is_zero() {
            let _ = self.descheduler.run_pass().await;
            return;
        }

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.descheduler.run_pass().await;
                }
                _ = shutdown.recv() => {
                    self.descheduler.logger().log_shutdown("shutdown signal received");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvictionError;
    use crate::health::ComponentStatus;
    use crate::models::{ClusterSnapshot, NodeInfo, OwnerReference, Replica, ReplicaId};
    use crate::policy::DisruptionAllowance;
    use crate::snapshot::StaticSnapshotSource;
    use async_trait::async_trait;

    struct BrokenSource;

    #[async_trait]
    impl SnapshotSource for BrokenSource {
        async fn snapshot(&self) -> Result<ClusterSnapshot> {
            anyhow::bail!("connection refused")
        }
    }

    struct RejectingSink;

    #[async_trait]
    impl EvictionSink for RejectingSink {
        async fn evict(&self, _replica: &ReplicaId) -> Result<(), EvictionError> {
            Err(EvictionError::DisruptionBudget("Cannot evict pod".to_string()))
        }
    }

    /// Five replicas of one ReplicaSet, four of them on node-a
    fn skewed_snapshot() -> ClusterSnapshot {
        let replicas = (0..5)
            .map(|i| {
                Replica::new("default", format!("web-{}", i))
                    .on_node(if i < 4 { "node-a" } else { "node-b" })
                    .owned_by(OwnerReference::controller("ReplicaSet", "web"))
                    .with_image("nginx:1.25")
            })
            .collect();
        ClusterSnapshot::new(vec![NodeInfo::new("node-a"), NodeInfo::new("node-b")], replicas)
    }

    fn descheduler(
        source: Arc<dyn SnapshotSource>,
        sink: Arc<dyn EvictionSink>,
        config: StrategyConfig,
    ) -> Descheduler {
        Descheduler::new(
            source,
            sink,
            config,
            HealthRegistry::new(),
            StructuredLogger::new("test"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_pass_evicts_excess() {
        let sink = Arc::new(DryRunSink::new());
        let d = descheduler(
            Arc::new(StaticSnapshotSource::new(skewed_snapshot())),
            sink.clone(),
            StrategyConfig::default(),
        );

        let outcome = d.run_pass().await.unwrap();

        assert_eq!(outcome.pass, 1);
        assert_eq!(outcome.plan.selected_count(), 1);
        assert_eq!(outcome.report.succeeded, 1);
        assert_eq!(sink.recorded().await.len(), 1);
        assert!(d.health().readiness().await.ready);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_sink_untouched() {
        let sink = Arc::new(DryRunSink::new());
        let d = descheduler(
            Arc::new(StaticSnapshotSource::new(skewed_snapshot())),
            sink.clone(),
            StrategyConfig {
                dry_run: true,
                ..Default::default()
            },
        );

        let outcome = d.run_pass().await.unwrap();

        assert!(outcome.dry_run);
        assert_eq!(outcome.report.succeeded, 1);
        assert!(sink.recorded().await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_failure_marks_source_unhealthy() {
        let d = descheduler(
            Arc::new(BrokenSource),
            Arc::new(DryRunSink::new()),
            StrategyConfig::default(),
        );
        d.health().register_all().await;

        assert!(d.run_pass().await.is_err());
        assert_eq!(
            d.health().status(components::SNAPSHOT_SOURCE).await,
            Some(ComponentStatus::Unhealthy)
        );
        assert!(!d.health().readiness().await.ready);
    }

    #[tokio::test]
    async fn test_rejected_evictions_mark_evictor_unhealthy() {
        let d = descheduler(
            Arc::new(StaticSnapshotSource::new(skewed_snapshot())),
            Arc::new(RejectingSink),
            StrategyConfig::default(),
        );

        let outcome = d.run_pass().await.unwrap();

        assert_eq!(outcome.report.failed, 1);
        assert_eq!(
            d.health().status(components::EVICTOR).await,
            Some(ComponentStatus::Unhealthy)
        );
    }

    #[tokio::test]
    async fn test_invalid_budget_rejected_at_construction() {
        let result = Descheduler::new(
            Arc::new(StaticSnapshotSource::new(skewed_snapshot())),
            Arc::new(DryRunSink::new()),
            StrategyConfig {
                max_evictions_total: Some(-1),
                ..Default::default()
            },
            HealthRegistry::new(),
            StructuredLogger::new("test"),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_custom_policy_is_rebuilt_each_pass() {
        let sink = Arc::new(DryRunSink::new());
        let d = descheduler(
            Arc::new(StaticSnapshotSource::new(skewed_snapshot())),
            sink.clone(),
            StrategyConfig::default(),
        )
        .with_policy(Arc::new(
            |config: &StrategyConfig| -> Box<dyn EligibilityPredicate> {
                Box::new(
                    EligibilityPolicy::from_config(config)
                        .and(DisruptionAllowance::new().allow("default", "ReplicaSet", "web", 1)),
                )
            },
        ));

        // A shared allowance would be spent after the first pass
        for _ in 0..2 {
            let outcome = d.run_pass().await.unwrap();
            assert_eq!(outcome.plan.selected_count(), 1);
        }
        assert_eq!(d.passes(), 2);
        assert_eq!(sink.recorded().await.len(), 2);
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown() {
        let d = Arc::new(descheduler(
            Arc::new(StaticSnapshotSource::new(skewed_snapshot())),
            Arc::new(DryRunSink::new()),
            StrategyConfig::default(),
        ));
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(
            DeschedulingLoop::new(
                Arc::clone(&d),
                LoopConfig {
                    interval: Duration::from_millis(10),
                },
            )
            .run(rx),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(d.passes() >= 1);
    }

    #[tokio::test]
    async fn test_zero_interval_runs_once() {
        let d = Arc::new(descheduler(
            Arc::new(StaticSnapshotSource::new(skewed_snapshot())),
            Arc::new(DryRunSink::new()),
            StrategyConfig::default(),
        ));
        let (_tx, rx) = broadcast::channel(1);

        DeschedulingLoop::new(
            Arc::clone(&d),
            LoopConfig {
                interval: Duration::ZERO,
            },
        )
        .run(rx)
        .await;

        assert_eq!(d.passes(), 1);
    }
}
