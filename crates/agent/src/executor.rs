//! Logging executor adapter
//!
//! Records every intended mutation as a structured event and reports
//! full success. The kernel-level mechanism (cgroup writes, eviction
//! API calls) lives outside this process; this adapter is the node's
//! audit trail of what the engine decided.

use ensurance::executor::{async_trait, ActionExecutor, ExecutionOutcome, TargetSet};
use ensurance::{AvoidanceAction, PodInfo};
use tracing::info;

pub struct LoggingExecutor {
    node_name: String,
}

impl LoggingExecutor {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    fn log_capability(&self, action: &AvoidanceAction, operation: &str, targets: &TargetSet) {
        if !targets.throttle.is_empty() {
            let pods: Vec<String> = targets.throttle.iter().map(PodInfo::target_id).collect();
            info!(
                event = "throttle_decision",
                node = %self.node_name,
                action = %action.name,
                operation = %operation,
                min_cpu_ratio = action.throttle.map(|t| t.cpu_throttle.min_cpu_ratio),
                step_cpu_ratio = action.throttle.map(|t| t.cpu_throttle.step_cpu_ratio),
                targets = ?pods,
                "Throttle decision recorded"
            );
        }
        if !targets.evict.is_empty() {
            let pods: Vec<String> = targets.evict.iter().map(PodInfo::target_id).collect();
            info!(
                event = "eviction_decision",
                node = %self.node_name,
                action = %action.name,
                operation = %operation,
                grace_period = action
                    .eviction
                    .and_then(|e| e.termination_grace_period_seconds),
                targets = ?pods,
                "Eviction decision recorded"
            );
        }
    }
}

#[async_trait]
impl ActionExecutor for LoggingExecutor {
    async fn enact(&self, action: &AvoidanceAction, targets: &TargetSet) -> ExecutionOutcome {
        self.log_capability(action, "enact", targets);
        ExecutionOutcome::all_applied(targets)
    }

    async fn restore(&self, action: &AvoidanceAction, targets: &TargetSet) -> ExecutionOutcome {
        self.log_capability(action, "restore", targets);
        ExecutionOutcome::all_applied(targets)
    }
}
