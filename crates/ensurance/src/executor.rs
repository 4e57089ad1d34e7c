//! Action executor interface
//!
//! The executor performs the actual node mutation (cgroup throttling,
//! page-cache drop, pod eviction). It is an external collaborator:
//! the engine invokes it fire-and-forget and never blocks a tick on a
//! slow call.

use crate::models::{AvoidanceAction, PodInfo};

pub use async_trait::async_trait;

/// Resolved targets for one enactment, split per capability. Computed
/// fresh at decision time, never persisted.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    /// Pods to throttle, least protected first.
    pub throttle: Vec<PodInfo>,
    /// Pods eligible for eviction, least protected first.
    pub evict: Vec<PodInfo>,
}

impl TargetSet {
    pub fn is_empty(&self) -> bool {
        self.throttle.is_empty() && self.evict.is_empty()
    }

    /// Deduplicated target identifiers across both capabilities.
    pub fn target_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .throttle
            .iter()
            .chain(self.evict.iter())
            .map(PodInfo::target_id)
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// One target the executor could not mutate.
#[derive(Debug, Clone)]
pub struct TargetFailure {
    pub target: String,
    pub reason: String,
}

/// Per-target result of an enact or restore call.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub applied: Vec<String>,
    pub failed: Vec<TargetFailure>,
}

impl ExecutionOutcome {
    pub fn all_applied(targets: &TargetSet) -> Self {
        Self {
            applied: targets.target_ids(),
            failed: Vec::new(),
        }
    }
}

/// Performs avoidance mutations on the node.
///
/// Implementations must be idempotent: re-enacting on an already
/// throttled target is a no-op success, not an error.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Apply the action's capabilities to the given targets.
    async fn enact(&self, action: &AvoidanceAction, targets: &TargetSet) -> ExecutionOutcome;

    /// Undo the action: remove throttles, stop further eviction.
    async fn restore(&self, action: &AvoidanceAction, targets: &TargetSet) -> ExecutionOutcome;
}
