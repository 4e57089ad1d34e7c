//! QoS Agent - Node QoS avoidance decision engine
//!
//! This binary runs as a DaemonSet on each Kubernetes node, evaluating
//! QoS objectives against node metrics and enacting avoidance actions
//! on low priority pods.

use anyhow::Result;
use ensurance::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    probe::CachedProbe,
    EnsuranceLoopBuilder, PolicyRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod bundle;
mod config;
mod executor;
mod probe;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting qos-agent");

    // Load configuration
    let config = config::AgentConfig::load()?;
    info!(node_name = %config.node_name, "Agent configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::ENGINE).await;
    health_registry.register(components::PROBE).await;
    health_registry.register(components::EXECUTOR).await;
    health_registry.register(components::POLICY).await;

    // Initialize structured logger
    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION);

    // Apply the policy bundle, if configured
    let registry = Arc::new(PolicyRegistry::new());
    if let Some(path) = &config.policy_bundle_path {
        let bundle = bundle::PolicyBundle::load(path)?;
        let (_, rejected) = bundle.apply(&registry);
        if rejected > 0 {
            health_registry
                .set_degraded(components::POLICY, format!("{rejected} objects rejected"))
                .await;
        }
    }

    // Wire the metric probe behind a local TTL cache
    let http_probe = probe::HttpMetricProbe::new(
        &config.metric_endpoint,
        Duration::from_secs(config.probe_safety_timeout_secs),
    )?;
    let probe = Arc::new(CachedProbe::new(
        Arc::new(http_probe),
        Duration::from_secs(config.probe_cache_ttl_secs),
    ));

    let executor = Arc::new(executor::LoggingExecutor::new(&config.node_name));

    // Build the evaluation engine
    let engine = Arc::new(
        EnsuranceLoopBuilder::new()
            .registry(registry.clone())
            .probe(probe)
            .executor(executor)
            .node_name(&config.node_name)
            .interval(Duration::from_secs(config.tick_interval_secs))
            .jitter(Duration::from_millis(config.tick_jitter_ms))
            .safety_timeout(Duration::from_secs(config.probe_safety_timeout_secs))
            .build()?,
    );

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        engine.tracker(),
        registry,
    ));

    // Mark agent as ready after initialization
    health_registry.set_ready(true).await;

    // Start the API server and the evaluation loop
    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let engine_handle = tokio::spawn(engine.run(shutdown_rx));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());
    let _ = engine_handle.await;
    info!("Shutting down");

    Ok(())
}
