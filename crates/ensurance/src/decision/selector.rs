//! Action selection and target resolution
//!
//! Maps a triggered objective to its avoidance action and resolves the
//! affected pod set. Targets are ranked by resource priority tier,
//! least protected first, with a deterministic secondary key so
//! repeated runs over the same pod set produce the same ordered list.

use crate::models::{AvoidanceAction, AvoidanceActionStrategy, PodInfo};
use crate::policy::{BoundObjective, PolicyRegistry};
use std::sync::Arc;
use thiserror::Error;

/// The resource dimension under contention, selecting which priority
/// tier ranks the targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceDimension {
    Cpu,
    Memory,
}

/// Action resolution failures. An unresolved action reference is a
/// configuration error scoped to the one objective; it stays
/// Triggered-pending until the reference resolves.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("avoidance action {0} is not registered")]
    ActionNotFound(String),
}

/// A resolved avoidance decision: the action plus the ranked target
/// sets for each of its capabilities. Target sets are recomputed at
/// every enactment, never persisted.
#[derive(Debug, Clone)]
pub struct Decision {
    pub action: AvoidanceAction,
    /// The objective only records the decision; the executor is never
    /// invoked.
    pub preview: bool,
    /// Pods to throttle, ranked by CPU priority tier.
    pub throttle_targets: Vec<PodInfo>,
    /// Pods eligible for eviction, ranked by memory priority tier.
    pub eviction_targets: Vec<PodInfo>,
}

/// Resolves objectives to concrete decisions against the registry.
pub struct ActionSelector {
    registry: Arc<PolicyRegistry>,
}

impl ActionSelector {
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve the objective's action and compute its target sets.
    pub fn select(&self, bound: &BoundObjective) -> Result<Decision, SelectError> {
        let action = self
            .registry
            .resolve_action(&bound.objective.avoidance_action_name)
            .ok_or_else(|| {
                SelectError::ActionNotFound(bound.objective.avoidance_action_name.clone())
            })?;

        let pods = self.registry.pods_matching(bound.selector.as_ref());

        let throttle_targets = if action.throttle.is_some() {
            self.rank_targets(&pods, ResourceDimension::Cpu)
        } else {
            Vec::new()
        };
        let eviction_targets = if action.eviction.is_some() {
            self.rank_targets(&pods, ResourceDimension::Memory)
        } else {
            Vec::new()
        };

        Ok(Decision {
            preview: bound.objective.strategy == AvoidanceActionStrategy::Preview,
            action,
            throttle_targets,
            eviction_targets,
        })
    }

    /// Rank candidate pods for one contention dimension: highest tier
    /// number (least protected) first, youngest first within a tier so
    /// the oldest pods are acted on last, pod identity as the final
    /// key. Pods whose service policy forbids the capability are
    /// filtered out.
    fn rank_targets(&self, pods: &[PodInfo], dimension: ResourceDimension) -> Vec<PodInfo> {
        let mut ranked: Vec<(u8, PodInfo)> = pods
            .iter()
            .filter_map(|pod| {
                let policy = self.registry.service_policy_for(pod);
                let (allowed, tier) = match dimension {
                    ResourceDimension::Cpu => (
                        policy.avoidance_strategy.allow_throttle,
                        policy.resource_priority.cpu_priority,
                    ),
                    ResourceDimension::Memory => (
                        policy.avoidance_strategy.allow_evict,
                        policy.resource_priority.memory_priority,
                    ),
                };
                allowed.then(|| (tier, pod.clone()))
            })
            .collect();

        ranked.sort_by(|(tier_a, pod_a), (tier_b, pod_b)| {
            tier_b
                .cmp(tier_a)
                .then(pod_b.creation_timestamp.cmp(&pod_a.creation_timestamp))
                .then_with(|| pod_a.target_id().cmp(&pod_b.target_id()))
        });

        ranked.into_iter().map(|(_, pod)| pod).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AvoidanceStrategy, EvictionAction, MetricRule, ObjectiveEnsurance, ResourcePriority,
        ServicePolicy, ThrottleAction,
    };
    use crate::policy::PolicyEvent;
    use std::collections::BTreeMap;

    fn registry() -> Arc<PolicyRegistry> {
        Arc::new(PolicyRegistry::new())
    }

    fn action(name: &str, throttle: bool, evict: bool) -> AvoidanceAction {
        AvoidanceAction {
            name: name.to_string(),
            cool_down_seconds: 300,
            throttle: throttle.then(ThrottleAction::default),
            eviction: evict.then(EvictionAction::default),
            escalation_grace_ticks: None,
            description: String::new(),
        }
    }

    fn bound(action_name: &str, strategy: AvoidanceActionStrategy) -> BoundObjective {
        BoundObjective {
            policy: "node-cpu".to_string(),
            objective: ObjectiveEnsurance {
                name: "cpu-usage".to_string(),
                metric_rule: Some(MetricRule {
                    name: "cpu_total_usage".to_string(),
                    selector: None,
                    value: 80.0,
                }),
                avoidance_threshold: 1,
                restore_threshold: 1,
                avoidance_action_name: action_name.to_string(),
                strategy,
            },
            selector: None,
            timeout_seconds: 0,
        }
    }

    fn pod(name: &str, class: &str, created: i64) -> PodInfo {
        PodInfo {
            name: name.to_string(),
            namespace: "default".to_string(),
            uid: format!("uid-{name}"),
            labels: BTreeMap::new(),
            priority_class_name: Some(class.to_string()),
            creation_timestamp: created,
        }
    }

    fn service_policy(class: &str, cpu: u8, memory: u8) -> ServicePolicy {
        ServicePolicy {
            name: format!("sp-{class}"),
            priority_class_name: class.to_string(),
            resource_priority: ResourcePriority {
                cpu_priority: cpu,
                memory_priority: memory,
                network_io_priority: 0,
            },
            avoidance_strategy: AvoidanceStrategy {
                allow_throttle: true,
                allow_evict: true,
            },
        }
    }

    #[test]
    fn test_missing_action_is_config_error() {
        let registry = registry();
        let selector = ActionSelector::new(registry);

        let result = selector.select(&bound("absent", AvoidanceActionStrategy::None));
        assert_eq!(
            result.unwrap_err(),
            SelectError::ActionNotFound("absent".to_string())
        );
    }

    #[test]
    fn test_targets_ranked_least_protected_first() {
        let registry = registry();
        registry
            .apply(PolicyEvent::ActionApplied(action("throttle", true, false)))
            .unwrap();
        registry
            .apply(PolicyEvent::ServicePolicyApplied(service_policy(
                "high", 1, 1,
            )))
            .unwrap();
        registry
            .apply(PolicyEvent::ServicePolicyApplied(service_policy("low", 6, 6)))
            .unwrap();
        registry
            .apply(PolicyEvent::PodScheduled(pod("web", "high", 100)))
            .unwrap();
        registry
            .apply(PolicyEvent::PodScheduled(pod("batch", "low", 100)))
            .unwrap();

        let selector = ActionSelector::new(registry);
        let decision = selector
            .select(&bound("throttle", AvoidanceActionStrategy::None))
            .unwrap();

        let names: Vec<&str> = decision
            .throttle_targets
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["batch", "web"]);
        assert!(decision.eviction_targets.is_empty());
    }

    #[test]
    fn test_tie_break_youngest_first_then_identity() {
        let registry = registry();
        registry
            .apply(PolicyEvent::ActionApplied(action("throttle", true, false)))
            .unwrap();
        registry
            .apply(PolicyEvent::ServicePolicyApplied(service_policy("low", 6, 6)))
            .unwrap();
        registry
            .apply(PolicyEvent::PodScheduled(pod("old", "low", 100)))
            .unwrap();
        registry
            .apply(PolicyEvent::PodScheduled(pod("young", "low", 200)))
            .unwrap();
        registry
            .apply(PolicyEvent::PodScheduled(pod("twin-b", "low", 200)))
            .unwrap();

        let selector = ActionSelector::new(registry);
        let decision = selector
            .select(&bound("throttle", AvoidanceActionStrategy::None))
            .unwrap();

        let names: Vec<&str> = decision
            .throttle_targets
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        // Youngest first, equal timestamps ordered by identity, oldest last
        assert_eq!(names, vec!["twin-b", "young", "old"]);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let registry = registry();
        registry
            .apply(PolicyEvent::ActionApplied(action("both", true, true)))
            .unwrap();
        registry
            .apply(PolicyEvent::ServicePolicyApplied(service_policy("low", 5, 3)))
            .unwrap();
        for (name, created) in [("a", 10), ("b", 20), ("c", 20), ("d", 5)] {
            registry
                .apply(PolicyEvent::PodScheduled(pod(name, "low", created)))
                .unwrap();
        }

        let selector = ActionSelector::new(registry);
        let first = selector
            .select(&bound("both", AvoidanceActionStrategy::None))
            .unwrap();
        for _ in 0..5 {
            let again = selector
                .select(&bound("both", AvoidanceActionStrategy::None))
                .unwrap();
            assert_eq!(
                first
                    .throttle_targets
                    .iter()
                    .map(PodInfo::target_id)
                    .collect::<Vec<_>>(),
                again
                    .throttle_targets
                    .iter()
                    .map(PodInfo::target_id)
                    .collect::<Vec<_>>()
            );
            assert_eq!(
                first
                    .eviction_targets
                    .iter()
                    .map(PodInfo::target_id)
                    .collect::<Vec<_>>(),
                again
                    .eviction_targets
                    .iter()
                    .map(PodInfo::target_id)
                    .collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn test_avoidance_strategy_opt_out_filters_targets() {
        let registry = registry();
        registry
            .apply(PolicyEvent::ActionApplied(action("both", true, true)))
            .unwrap();

        let mut protected = service_policy("protected", 6, 6);
        protected.avoidance_strategy.allow_throttle = false;
        registry
            .apply(PolicyEvent::ServicePolicyApplied(protected))
            .unwrap();
        registry
            .apply(PolicyEvent::PodScheduled(pod("web", "protected", 100)))
            .unwrap();

        let selector = ActionSelector::new(registry);
        let decision = selector
            .select(&bound("both", AvoidanceActionStrategy::None))
            .unwrap();

        assert!(decision.throttle_targets.is_empty());
        // Eviction is still allowed for this class
        assert_eq!(decision.eviction_targets.len(), 1);
    }

    #[test]
    fn test_preview_flag_carried_through() {
        let registry = registry();
        registry
            .apply(PolicyEvent::ActionApplied(action("throttle", true, false)))
            .unwrap();

        let selector = ActionSelector::new(registry);
        let decision = selector
            .select(&bound("throttle", AvoidanceActionStrategy::Preview))
            .unwrap();
        assert!(decision.preview);
    }
}
