//! Observability infrastructure for the QoS ensurance engine
//!
//! Provides:
//! - Prometheus metrics (tick latency, trigger/restore counts, cooldown
//!   denials, probe and executor failures)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for tick latency (in seconds)
const TICK_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    tick_duration_seconds: Histogram,
    objectives_tracked: IntGauge,
    pods_tracked: IntGauge,
    probe_failures: IntCounter,
    objectives_triggered: IntCounter,
    objectives_restored: IntCounter,
    enactments: IntCounter,
    preview_decisions: IntCounter,
    cooldown_denials: IntCounter,
    executor_failures: IntCounter,
    config_errors: IntCounter,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            tick_duration_seconds: register_histogram!(
                "qos_engine_tick_duration_seconds",
                "Time spent running one evaluation tick",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_duration_seconds"),

            objectives_tracked: register_int_gauge!(
                "qos_engine_objectives_tracked",
                "Number of objectives currently tracked by the engine"
            )
            .expect("Failed to register objectives_tracked"),

            pods_tracked: register_int_gauge!(
                "qos_engine_pods_tracked",
                "Number of pods in the node snapshot"
            )
            .expect("Failed to register pods_tracked"),

            probe_failures: register_int_counter!(
                "qos_engine_probe_failures_total",
                "Metric probes that failed or timed out (unknown ticks)"
            )
            .expect("Failed to register probe_failures"),

            objectives_triggered: register_int_counter!(
                "qos_engine_objectives_triggered_total",
                "Objectives that crossed their avoidance threshold"
            )
            .expect("Failed to register objectives_triggered"),

            objectives_restored: register_int_counter!(
                "qos_engine_objectives_restored_total",
                "Objectives that crossed their restore threshold"
            )
            .expect("Failed to register objectives_restored"),

            enactments: register_int_counter!(
                "qos_engine_enactments_total",
                "Executor enact/restore invocations dispatched"
            )
            .expect("Failed to register enactments"),

            preview_decisions: register_int_counter!(
                "qos_engine_preview_decisions_total",
                "Decisions recorded under the Preview strategy"
            )
            .expect("Failed to register preview_decisions"),

            cooldown_denials: register_int_counter!(
                "qos_engine_cooldown_denials_total",
                "Enactments denied by the cooldown gate"
            )
            .expect("Failed to register cooldown_denials"),

            executor_failures: register_int_counter!(
                "qos_engine_executor_failures_total",
                "Targets the executor reported as failed"
            )
            .expect("Failed to register executor_failures"),

            config_errors: register_int_counter!(
                "qos_engine_config_errors_total",
                "Rejected policy objects and unresolved action references"
            )
            .expect("Failed to register config_errors"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share
/// the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_tick_duration(&self, duration_secs: f64) {
        self.inner().tick_duration_seconds.observe(duration_secs);
    }

    pub fn set_objectives_tracked(&self, count: i64) {
        self.inner().objectives_tracked.set(count);
    }

    pub fn set_pods_tracked(&self, count: i64) {
        self.inner().pods_tracked.set(count);
    }

    pub fn inc_probe_failures(&self) {
        self.inner().probe_failures.inc();
    }

    pub fn inc_objectives_triggered(&self) {
        self.inner().objectives_triggered.inc();
    }

    pub fn inc_objectives_restored(&self) {
        self.inner().objectives_restored.inc();
    }

    pub fn inc_enactments(&self) {
        self.inner().enactments.inc();
    }

    pub fn inc_preview_decisions(&self) {
        self.inner().preview_decisions.inc();
    }

    pub fn inc_cooldown_denials(&self, denied: u64) {
        self.inner().cooldown_denials.inc_by(denied);
    }

    pub fn inc_executor_failures(&self, failed: u64) {
        self.inner().executor_failures.inc_by(failed);
    }

    pub fn inc_config_errors(&self) {
        self.inner().config_errors.inc();
    }
}

/// Structured logger for engine events
///
/// Consistent JSON-formatted records for decisions and degradations so
/// preview and real runs are comparable downstream.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "engine_started",
            node = %self.node_name,
            agent_version = %version,
            "QoS ensurance engine started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            node = %self.node_name,
            reason = %reason,
            "QoS ensurance engine shutting down"
        );
    }

    /// An objective crossed its avoidance threshold.
    pub fn log_objective_triggered(&self, policy: &str, objective: &str, action: &str) {
        warn!(
            event = "objective_triggered",
            node = %self.node_name,
            policy = %policy,
            objective = %objective,
            action = %action,
            "Objective crossed avoidance threshold"
        );
    }

    /// An objective crossed its restore threshold.
    pub fn log_objective_restored(&self, policy: &str, objective: &str, action: &str) {
        info!(
            event = "objective_restored",
            node = %self.node_name,
            policy = %policy,
            objective = %objective,
            action = %action,
            "Objective restored"
        );
    }

    /// A Preview-strategy decision; the executor was not invoked.
    pub fn log_preview_decision(
        &self,
        policy: &str,
        objective: &str,
        action: &str,
        operation: &str,
        targets: &[String],
        would_admit: usize,
    ) {
        info!(
            event = "preview_decision",
            node = %self.node_name,
            policy = %policy,
            objective = %objective,
            action = %action,
            operation = %operation,
            targets = ?targets,
            would_admit = would_admit,
            "Preview decision recorded, executor skipped"
        );
    }

    /// Eviction escalated after throttling failed to restore.
    pub fn log_escalation(&self, policy: &str, objective: &str, action: &str, grace_ticks: u32) {
        warn!(
            event = "eviction_escalated",
            node = %self.node_name,
            policy = %policy,
            objective = %objective,
            action = %action,
            grace_ticks = grace_ticks,
            "Escalating to eviction after throttle grace period"
        );
    }

    /// Probe failure or timeout; degraded observability, not fatal.
    pub fn log_probe_degraded(&self, policy: &str, objective: &str, metric: &str, error: &str) {
        warn!(
            event = "probe_degraded",
            node = %self.node_name,
            policy = %policy,
            objective = %objective,
            metric = %metric,
            error = %error,
            "Metric unavailable, counters preserved"
        );
    }

    /// A triggered objective references an unregistered action.
    pub fn log_action_unresolved(&self, policy: &str, objective: &str, action: &str) {
        warn!(
            event = "action_unresolved",
            node = %self.node_name,
            policy = %policy,
            objective = %objective,
            action = %action,
            "Avoidance action not registered, objective pending"
        );
    }

    /// Executor finished an enact/restore call.
    pub fn log_execution_outcome(
        &self,
        action: &str,
        operation: &str,
        applied: usize,
        failed: usize,
    ) {
        if failed > 0 {
            warn!(
                event = "execution_outcome",
                node = %self.node_name,
                action = %action,
                operation = %operation,
                applied = applied,
                failed = failed,
                "Executor reported partial failure"
            );
        } else {
            info!(
                event = "execution_outcome",
                node = %self.node_name,
                action = %action,
                operation = %operation,
                applied = applied,
                failed = failed,
                "Executor call complete"
            );
        }
    }
}
