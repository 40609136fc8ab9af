//! Descheduler - duplicate replica rebalancing daemon
//!
//! Runs in-cluster as a Deployment, periodically evicting replicas that are
//! piled up on one node so the scheduler can spread them out again.

use anyhow::{Context, Result};
use descheduler::{api, config::DeschedulerConfig};
use descheduler_lib::{
    health::HealthRegistry,
    k8s::{KubeEvictionSink, KubeSnapshotSource},
    observability::{DeschedulerMetrics, StructuredLogger},
    runner::{Descheduler, DeschedulingLoop, LoopConfig},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DESCHEDULER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = DeschedulerConfig::load()?;
    info!(
        instance = %config.instance,
        interval_secs = config.interval_secs,
        "Descheduler configured"
    );

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let metrics = DeschedulerMetrics::new();
    let logger = StructuredLogger::new(&config.instance);
    let strategy = config.strategy();
    logger.log_startup(DESCHEDULER_VERSION, config.interval_secs, strategy.dry_run);

    let descheduler = Arc::new(Descheduler::new(
        Arc::new(KubeSnapshotSource::new(client.clone())),
        Arc::new(KubeEvictionSink::new(client)),
        strategy,
        health_registry.clone(),
        logger.clone(),
    )?);

    let app_state = Arc::new(api::AppState::new(health_registry, metrics));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_config = LoopConfig {
        interval: config.interval(),
    };
    let mut loop_handle =
        tokio::spawn(DeschedulingLoop::new(descheduler, loop_config).run(shutdown_rx));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
            let _ = shutdown_tx.send(());
            if let Err(e) = loop_handle.await {
                error!(error = %e, "Descheduling loop panicked");
            }
        }
        result = &mut loop_handle => {
            // Only a zero interval lets the loop finish on its own
            if let Err(e) = result {
                error!(error = %e, "Descheduling loop panicked");
            }
            logger.log_shutdown("single pass completed");
        }
    }

    api_handle.abort();
    info!("Shutting down");

    Ok(())
}
