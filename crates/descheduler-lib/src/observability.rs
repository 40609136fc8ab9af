//! Observability infrastructure for the descheduler
//!
//! Provides:
//! - Prometheus metrics (pass latency, excess detected, eviction outcomes)
//! - Structured JSON logging with tracing
//!
//! Planning and eviction code stays free of logging; everything here is
//! called by the pass runner around it.

use crate::duplicates::DuplicatePlan;
use crate::eviction::{EvictionOutcome, EvictionRecord, EvictionReport};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for pass latency (in seconds)
const PASS_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DeschedulerMetricsInner> = OnceLock::new();

struct DeschedulerMetricsInner {
    pass_duration_seconds: Histogram,
    passes: IntCounter,
    pass_errors: IntCounter,
    groups_observed: IntGauge,
    excess_replicas: IntGauge,
    candidates_selected: IntGauge,
    evictions: IntCounterVec,
    last_pass_timestamp: IntGauge,
}

impl DeschedulerMetricsInner {
    fn new() -> Self {
        Self {
            pass_duration_seconds: register_histogram!(
                "descheduler_pass_duration_seconds",
                "Time spent on one snapshot, plan and evict pass",
                PASS_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register pass_duration_seconds"),

            passes: register_int_counter!(
                "descheduler_passes_total",
                "Total number of completed descheduling passes"
            )
            .expect("Failed to register passes_total"),

            pass_errors: register_int_counter!(
                "descheduler_pass_errors_total",
                "Total number of passes aborted before planning"
            )
            .expect("Failed to register pass_errors_total"),

            groups_observed: register_int_gauge!(
                "descheduler_duplicate_groups",
                "Duplicate groups observed in the last snapshot"
            )
            .expect("Failed to register duplicate_groups"),

            excess_replicas: register_int_gauge!(
                "descheduler_excess_replicas",
                "Replicas above their node's fair share in the last pass"
            )
            .expect("Failed to register excess_replicas"),

            candidates_selected: register_int_gauge!(
                "descheduler_candidates_selected",
                "Eviction candidates selected in the last pass"
            )
            .expect("Failed to register candidates_selected"),

            evictions: register_int_counter_vec!(
                "descheduler_evictions_total",
                "Eviction outcomes by result",
                &["result"]
            )
            .expect("Failed to register evictions_total"),

            last_pass_timestamp: register_int_gauge!(
                "descheduler_last_pass_timestamp_seconds",
                "Unix time of the last completed pass"
            )
            .expect("Failed to register last_pass_timestamp_seconds"),
        }
    }
}

/// Descheduler metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct DeschedulerMetrics {
    _private: (),
}

impl Default for DeschedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DeschedulerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DeschedulerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DeschedulerMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_pass_duration(&self, duration_secs: f64) {
        self.inner().pass_duration_seconds.observe(duration_secs);
    }

    pub fn inc_pass_errors(&self) {
        self.inner().pass_errors.inc();
    }

    /// Record the shape of a computed plan
    pub fn record_plan(&self, plan: &DuplicatePlan) {
        let inner = self.inner();
        inner.groups_observed.set(plan.groups_observed as i64);
        inner.excess_replicas.set(plan.total_excess() as i64);
        inner.candidates_selected.set(plan.selected_count() as i64);
    }

    /// Record eviction outcomes and mark the pass complete
    pub fn record_report(&self, report: &EvictionReport) {
        let inner = self.inner();
        inner
            .evictions
            .with_label_values(&["succeeded"])
            .inc_by(report.succeeded as u64);
        inner
            .evictions
            .with_label_values(&["failed"])
            .inc_by(report.failed as u64);
        inner
            .evictions
            .with_label_values(&["skipped_budget"])
            .inc_by(report.skipped_budget as u64);
        inner.passes.inc();
        inner
            .last_pass_timestamp
            .set(chrono::Utc::now().timestamp());
    }
}

/// Structured logger for descheduler events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, interval_secs: u64, dry_run: bool) {
        info!(
            event = "descheduler_started",
            instance = %self.instance,
            version = %version,
            interval_secs = interval_secs,
            dry_run = dry_run,
            "Descheduler started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "descheduler_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Descheduler shutting down"
        );
    }

    pub fn log_pass_started(&self, pass: u64) {
        debug!(
            event = "pass_started",
            instance = %self.instance,
            pass = pass,
            "Descheduling pass started"
        );
    }

    pub fn log_snapshot_error(&self, pass: u64, error: &anyhow::Error) {
        warn!(
            event = "snapshot_failed",
            instance = %self.instance,
            pass = pass,
            error = %format!("{:#}", error),
            "Failed to take cluster snapshot, skipping pass"
        );
    }

    /// Log the plan, one line per node with excess
    pub fn log_plan(&self, pass: u64, plan: &DuplicatePlan) {
        info!(
            event = "plan_computed",
            instance = %self.instance,
            pass = pass,
            replicas = plan.replicas_indexed,
            groups = plan.groups_observed,
            excess = plan.total_excess(),
            selected = plan.selected_count(),
            unselected = plan.unselected_count(),
            "Computed duplicate rebalancing plan"
        );

        for node in &plan.nodes {
            debug!(
                event = "node_excess",
                instance = %self.instance,
                pass = pass,
                node = %node.node,
                selected = node.selected_count(),
                unselected = node.unselected_count(),
                "Node hosts excess duplicates"
            );
        }
    }

    pub fn log_eviction(&self, pass: u64, record: &EvictionRecord) {
        match &record.outcome {
            EvictionOutcome::Evicted => info!(
                event = "eviction_submitted",
                instance = %self.instance,
                pass = pass,
                namespace = %record.replica.namespace,
                pod_name = %record.replica.name,
                node = %record.node,
                "Evicted duplicate replica"
            ),
            EvictionOutcome::Failed { error } => warn!(
                event = "eviction_failed",
                instance = %self.instance,
                pass = pass,
                namespace = %record.replica.namespace,
                pod_name = %record.replica.name,
                node = %record.node,
                error = %error,
                "Eviction request failed"
            ),
            EvictionOutcome::SkippedBudget { scope } => debug!(
                event = "eviction_skipped",
                instance = %self.instance,
                pass = pass,
                namespace = %record.replica.namespace,
                pod_name = %record.replica.name,
                node = %record.node,
                budget = ?scope,
                "Eviction budget exhausted"
            ),
        }
    }

    pub fn log_pass_completed(
        &self,
        pass: u64,
        report: &EvictionReport,
        elapsed_ms: u128,
        dry_run: bool,
    ) {
        info!(
            event = "pass_completed",
            instance = %self.instance,
            pass = pass,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped_budget = report.skipped_budget,
            elapsed_ms = elapsed_ms as u64,
            dry_run = dry_run,
            "Descheduling pass completed"
        );
    }
}
