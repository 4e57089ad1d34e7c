//! The evaluation tick loop
//!
//! One scheduler drives all objectives. Within a tick objectives are
//! evaluated concurrently (state is partitioned by objective identity);
//! ticks for one objective never overlap because every task joins
//! before the next tick starts. Executor calls are dispatched
//! fire-and-forget so a slow mutation never blocks the next tick.

use crate::decision::{
    evaluate, ActionSelector, CooldownGate, Decision, HysteresisTracker, ObjectiveKey,
    SelectError, TransitionEdge, Verdict,
};
use crate::executor::{ActionExecutor, TargetSet};
use crate::models::{AvoidanceAction, MetricRule};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::policy::{BoundObjective, PolicyRegistry};
use crate::probe::MetricProbe;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Configuration for the evaluation loop
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base evaluation interval (default: 10 seconds)
    pub interval: Duration,
    /// Maximum jitter to add to the interval (default: 1 second)
    pub jitter: Duration,
    /// Upper bound on any single probe, applied on top of the
    /// policy's own timeout (default: 10 seconds)
    pub safety_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            jitter: Duration::from_secs(1),
            safety_timeout: Duration::from_secs(10),
        }
    }
}

/// Which of an action's capabilities an enactment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnactScope {
    /// First enactment of a triggered episode.
    Initial,
    /// Escalation after the throttle grace period expired.
    EvictionOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Enact,
    Restore,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match self {
            Operation::Enact => "enact",
            Operation::Restore => "restore",
        }
    }
}

/// The avoidance decision engine's tick loop.
pub struct EnsuranceLoop {
    registry: Arc<PolicyRegistry>,
    probe: Arc<dyn MetricProbe>,
    executor: Arc<dyn ActionExecutor>,
    tracker: Arc<HysteresisTracker>,
    gate: Arc<CooldownGate>,
    selector: ActionSelector,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    config: EngineConfig,
}

impl EnsuranceLoop {
    pub fn new(
        registry: Arc<PolicyRegistry>,
        probe: Arc<dyn MetricProbe>,
        executor: Arc<dyn ActionExecutor>,
        node_name: impl Into<String>,
        config: EngineConfig,
    ) -> Self {
        Self {
            selector: ActionSelector::new(registry.clone()),
            registry,
            probe,
            executor,
            tracker: Arc::new(HysteresisTracker::new()),
            gate: Arc::new(CooldownGate::new()),
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new(node_name),
            config,
        }
    }

    /// State table handle for status reporting.
    pub fn tracker(&self) -> Arc<HysteresisTracker> {
        self.tracker.clone()
    }

    /// Run the evaluation loop until shutdown is signalled.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting QoS evaluation loop"
        );

        let mut tick_count = 0u64;

        loop {
            tokio::select! {
                _ = sleep(self.current_interval()) => {
                    let start = Instant::now();
                    let evaluated = Arc::clone(&self).tick().await;
                    let elapsed = start.elapsed();

                    tick_count += 1;
                    self.metrics.observe_tick_duration(elapsed.as_secs_f64());

                    if tick_count % 6 == 0 {
                        // Every minute at the 10s default interval
                        debug!(
                            objectives = evaluated,
                            elapsed_ms = elapsed.as_millis(),
                            "Evaluation tick complete"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down QoS evaluation loop");
                    break;
                }
            }
        }
    }

    /// Interval with jitter to prevent thundering herd across agents.
    fn current_interval(&self) -> Duration {
        self.config.interval + Duration::from_millis(rand_jitter(self.config.jitter.as_millis() as u64))
    }

    /// Run one evaluation tick over every configured objective.
    /// Returns the number of objectives evaluated.
    pub async fn tick(self: Arc<Self>) -> usize {
        let objectives = self.registry.objectives();

        // Objectives removed from policy lose their state; in-flight
        // executor calls still complete.
        let live: HashSet<ObjectiveKey> = objectives
            .iter()
            .map(|b| ObjectiveKey::new(&b.policy, &b.objective.name))
            .collect();
        self.tracker.retain(&live);

        self.metrics.set_objectives_tracked(objectives.len() as i64);
        self.metrics.set_pods_tracked(self.registry.pod_count() as i64);

        let count = objectives.len();
        let mut tasks = JoinSet::new();
        for bound in objectives {
            let engine = Arc::clone(&self);
            tasks.spawn(async move { engine.evaluate_objective(bound).await });
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Objective evaluation task panicked");
            }
        }

        count
    }

    /// Evaluate one objective for this tick.
    async fn evaluate_objective(&self, bound: BoundObjective) {
        let key = ObjectiveKey::new(&bound.policy, &bound.objective.name);
        let Some(rule) = bound.objective.metric_rule.clone() else {
            // Rejected at validation; nothing to evaluate.
            return;
        };

        let sample = self.probe_value(&key, &bound, &rule).await;
        let verdict = evaluate(&rule, sample);

        match self.tracker.observe(&key, verdict, &bound.objective) {
            Some(TransitionEdge::Enact) => {
                self.metrics.inc_objectives_triggered();
                self.logger.log_objective_triggered(
                    &key.policy,
                    &key.objective,
                    &bound.objective.avoidance_action_name,
                );
                self.enact(&key, &bound, EnactScope::Initial);
            }
            Some(TransitionEdge::Restore) => {
                self.metrics.inc_objectives_restored();
                self.logger.log_objective_restored(
                    &key.policy,
                    &key.objective,
                    &bound.objective.avoidance_action_name,
                );
                self.restore(&key, &bound);
            }
            None => {
                if self.tracker.is_pending(&key) {
                    // A previous Enact could not resolve its action;
                    // keep retrying until the reference appears.
                    self.enact(&key, &bound, EnactScope::Initial);
                } else {
                    self.maybe_escalate(&key, &bound);
                }
            }
        }
    }

    /// Probe the rule's current value, bounded by the policy timeout
    /// and the engine safety timeout. Failures map to an unknown tick.
    async fn probe_value(
        &self,
        key: &ObjectiveKey,
        bound: &BoundObjective,
        rule: &MetricRule,
    ) -> Option<f64> {
        let limit = if bound.timeout_seconds == 0 {
            self.config.safety_timeout
        } else {
            Duration::from_secs(u64::from(bound.timeout_seconds)).min(self.config.safety_timeout)
        };

        match timeout(limit, self.probe.probe(rule)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                self.metrics.inc_probe_failures();
                self.logger
                    .log_probe_degraded(&key.policy, &key.objective, &rule.name, &e.to_string());
                None
            }
            Err(_) => {
                self.metrics.inc_probe_failures();
                self.logger.log_probe_degraded(
                    &key.policy,
                    &key.objective,
                    &rule.name,
                    "probe timed out",
                );
                None
            }
        }
    }

    /// Enact the objective's action for the given capability scope.
    fn enact(&self, key: &ObjectiveKey, bound: &BoundObjective, scope: EnactScope) {
        let decision = match self.selector.select(bound) {
            Ok(decision) => decision,
            Err(SelectError::ActionNotFound(name)) => {
                self.tracker.set_pending(key, true);
                self.metrics.inc_config_errors();
                self.logger
                    .log_action_unresolved(&key.policy, &key.objective, &name);
                return;
            }
        };
        self.tracker.set_pending(key, false);

        let targets = scoped_targets(&decision, scope);
        if targets.is_empty() {
            return;
        }

        if decision.preview {
            self.record_preview(key, &decision, Operation::Enact, &targets);
            return;
        }

        let admitted = self.admit_targets(&decision.action, targets);
        if admitted.is_empty() {
            return;
        }
        self.dispatch(decision.action, admitted, Operation::Enact, key.clone());
    }

    /// Invoke the inverse action after a restore edge. The target set
    /// is recomputed; it is not persisted across the episode.
    fn restore(&self, key: &ObjectiveKey, bound: &BoundObjective) {
        let decision = match self.selector.select(bound) {
            Ok(decision) => decision,
            Err(SelectError::ActionNotFound(name)) => {
                self.metrics.inc_config_errors();
                self.logger
                    .log_action_unresolved(&key.policy, &key.objective, &name);
                return;
            }
        };

        let targets = TargetSet {
            throttle: decision.throttle_targets.clone(),
            evict: decision.eviction_targets.clone(),
        };
        if targets.is_empty() {
            return;
        }

        if decision.preview {
            self.record_preview(key, &decision, Operation::Restore, &targets);
            return;
        }

        let admitted = self.admit_targets(&decision.action, targets);
        if admitted.is_empty() {
            return;
        }
        self.dispatch(decision.action, admitted, Operation::Restore, key.clone());
    }

    /// Escalate a still-triggered objective to eviction once its
    /// action's throttle grace period has expired.
    fn maybe_escalate(&self, key: &ObjectiveKey, bound: &BoundObjective) {
        let Some(state) = self.tracker.get(key) else {
            return;
        };
        if !state.phase.is_triggered() || state.escalated {
            return;
        }
        let Some(action) = self
            .registry
            .resolve_action(&bound.objective.avoidance_action_name)
        else {
            return;
        };
        // Escalation only applies when both capabilities are bundled
        // with a grace period; otherwise everything went out on Enact.
        let Some(grace) = action.escalation_grace_ticks else {
            return;
        };
        if action.throttle.is_none() || action.eviction.is_none() {
            return;
        }
        if !self.tracker.escalation_due(key, grace) {
            return;
        }

        self.logger
            .log_escalation(&key.policy, &key.objective, &action.name, grace);
        self.enact(key, bound, EnactScope::EvictionOnly);
    }

    /// Record a Preview-strategy decision without touching the
    /// executor or consuming cooldown budget.
    fn record_preview(
        &self,
        key: &ObjectiveKey,
        decision: &Decision,
        operation: Operation,
        targets: &TargetSet,
    ) {
        let cool_down = Duration::from_secs(u64::from(decision.action.cool_down_seconds));
        let ids = targets.target_ids();
        let would_admit = ids
            .iter()
            .filter(|id| self.gate.would_admit(&decision.action.name, id, cool_down))
            .count();

        self.metrics.inc_preview_decisions();
        self.logger.log_preview_decision(
            &key.policy,
            &key.objective,
            &decision.action.name,
            operation.as_str(),
            &ids,
            would_admit,
        );
    }

    /// Filter targets through the cooldown gate, stamping admitted
    /// pairs. Throttle and eviction are gated independently so an
    /// escalation is not blocked by its own throttle enactment.
    fn admit_targets(&self, action: &AvoidanceAction, targets: TargetSet) -> TargetSet {
        let cool_down = Duration::from_secs(u64::from(action.cool_down_seconds));
        let mut denied = 0u64;

        let mut admit = |capability: &str, pods: Vec<crate::models::PodInfo>| {
            let gate_key = format!("{}/{}", action.name, capability);
            pods.into_iter()
                .filter(|pod| {
                    let admitted = self.gate.admit(&gate_key, &pod.target_id(), cool_down);
                    if !admitted {
                        denied += 1;
                    }
                    admitted
                })
                .collect::<Vec<_>>()
        };

        let admitted = TargetSet {
            throttle: admit("throttle", targets.throttle),
            evict: admit("evict", targets.evict),
        };

        if denied > 0 {
            self.metrics.inc_cooldown_denials(denied);
            debug!(
                action = %action.name,
                denied = denied,
                "Cooldown gate denied targets this tick"
            );
        }
        admitted
    }

    /// Hand the mutation to the executor without blocking the tick.
    /// Results are reported asynchronously; failed targets have their
    /// cooldown stamp rescinded so they retry immediately.
    fn dispatch(
        &self,
        action: AvoidanceAction,
        targets: TargetSet,
        operation: Operation,
        key: ObjectiveKey,
    ) {
        self.metrics.inc_enactments();

        let executor = Arc::clone(&self.executor);
        let gate = Arc::clone(&self.gate);
        let tracker = Arc::clone(&self.tracker);
        let metrics = self.metrics.clone();
        let logger = self.logger.clone();

        tokio::spawn(async move {
            let outcome = match operation {
                Operation::Enact => executor.enact(&action, &targets).await,
                Operation::Restore => executor.restore(&action, &targets).await,
            };

            for failure in &outcome.failed {
                warn!(
                    action = %action.name,
                    target = %failure.target,
                    reason = %failure.reason,
                    "Executor failed for target"
                );
                for capability in ["throttle", "evict"] {
                    gate.rescind(&format!("{}/{capability}", action.name), &failure.target);
                }
            }
            if !outcome.failed.is_empty() {
                metrics.inc_executor_failures(outcome.failed.len() as u64);
            }
            if operation == Operation::Enact && !outcome.applied.is_empty() {
                tracker.note_enactment(&key, chrono::Utc::now().timestamp());
            }

            logger.log_execution_outcome(
                &action.name,
                operation.as_str(),
                outcome.applied.len(),
                outcome.failed.len(),
            );
        });
    }
}

/// Capabilities covered by an enactment scope. With both capabilities
/// bundled and a grace period configured, eviction is withheld from the
/// initial enactment.
fn scoped_targets(decision: &Decision, scope: EnactScope) -> TargetSet {
    match scope {
        EnactScope::Initial => {
            let withhold_eviction = decision.action.throttle.is_some()
                && decision.action.eviction.is_some()
                && decision.action.escalation_grace_ticks.is_some();
            TargetSet {
                throttle: decision.throttle_targets.clone(),
                evict: if withhold_eviction {
                    Vec::new()
                } else {
                    decision.eviction_targets.clone()
                },
            }
        }
        EnactScope::EvictionOnly => TargetSet {
            throttle: Vec::new(),
            evict: decision.eviction_targets.clone(),
        },
    }
}

/// Generate a random jitter value between 0 and max_ms
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    now % max_ms
}

/// Builder for wiring and starting the evaluation loop
pub struct EnsuranceLoopBuilder {
    registry: Option<Arc<PolicyRegistry>>,
    probe: Option<Arc<dyn MetricProbe>>,
    executor: Option<Arc<dyn ActionExecutor>>,
    node_name: String,
    config: EngineConfig,
}

impl EnsuranceLoopBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            probe: None,
            executor: None,
            node_name: "unknown".to_string(),
            config: EngineConfig::default(),
        }
    }

    pub fn registry(mut self, registry: Arc<PolicyRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn MetricProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn safety_timeout(mut self, safety_timeout: Duration) -> Self {
        self.config.safety_timeout = safety_timeout;
        self
    }

    pub fn build(self) -> Result<EnsuranceLoop> {
        let registry = self
            .registry
            .ok_or_else(|| anyhow::anyhow!("Registry is required"))?;
        let probe = self
            .probe
            .ok_or_else(|| anyhow::anyhow!("Probe is required"))?;
        let executor = self
            .executor
            .ok_or_else(|| anyhow::anyhow!("Executor is required"))?;

        Ok(EnsuranceLoop::new(
            registry,
            probe,
            executor,
            self.node_name,
            self.config,
        ))
    }
}

impl Default for EnsuranceLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
