//! Policy registry and reconfiguration events
//!
//! Declarative objects arrive from the surrounding watch/list mechanism
//! as edge-triggered upsert/delete events; the registry never assumes an
//! atomic full-set replace. Objects are validated on apply and malformed
//! input is rejected without touching the previously applied version.

use crate::models::{
    AvoidanceAction, LabelSelector, NodeQosPolicy, ObjectiveEnsurance, PodInfo, PodQosPolicy,
    PolicyError, ServicePolicy,
};
use dashmap::DashMap;
use tracing::debug;

/// Reconfiguration events delivered to the registry.
#[derive(Debug, Clone)]
pub enum PolicyEvent {
    NodePolicyApplied(NodeQosPolicy),
    NodePolicyRemoved(String),
    PodPolicyApplied(PodQosPolicy),
    PodPolicyRemoved(String),
    ServicePolicyApplied(ServicePolicy),
    ServicePolicyRemoved(String),
    ActionApplied(AvoidanceAction),
    ActionRemoved(String),
    /// A pod was scheduled on (or updated for) this node.
    PodScheduled(PodInfo),
    /// A pod left the node; keyed by uid.
    PodRemoved(String),
}

/// An objective bound to its enclosing policy's scope.
///
/// Carries everything the tick loop needs to evaluate the objective
/// without holding a reference into the registry.
#[derive(Debug, Clone)]
pub struct BoundObjective {
    /// Name of the enclosing policy.
    pub policy: String,
    pub objective: ObjectiveEnsurance,
    /// Selector of the enclosing policy; `None` scopes to every pod.
    pub selector: Option<LabelSelector>,
    /// Probe timeout from the enclosing policy; 0 means unbounded.
    pub timeout_seconds: u32,
}

/// Registry of currently applied declarative objects plus the pod
/// snapshot for this node.
pub struct PolicyRegistry {
    node_policies: DashMap<String, NodeQosPolicy>,
    pod_policies: DashMap<String, PodQosPolicy>,
    /// Keyed by priority class name.
    service_policies: DashMap<String, ServicePolicy>,
    actions: DashMap<String, AvoidanceAction>,
    /// Keyed by pod uid.
    pods: DashMap<String, PodInfo>,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self {
            node_policies: DashMap::new(),
            pod_policies: DashMap::new(),
            service_policies: DashMap::new(),
            actions: DashMap::new(),
            pods: DashMap::new(),
        }
    }

    /// Apply one reconfiguration event. Validation failures reject the
    /// event and leave the registry unchanged.
    pub fn apply(&self, event: PolicyEvent) -> Result<(), PolicyError> {
        match event {
            PolicyEvent::NodePolicyApplied(policy) => {
                policy.validate()?;
                debug!(policy = %policy.name, "Applying node QoS policy");
                self.node_policies.insert(policy.name.clone(), policy);
            }
            PolicyEvent::NodePolicyRemoved(name) => {
                debug!(policy = %name, "Removing node QoS policy");
                self.node_policies.remove(&name);
            }
            PolicyEvent::PodPolicyApplied(policy) => {
                policy.validate()?;
                debug!(policy = %policy.name, "Applying pod QoS policy");
                self.pod_policies.insert(policy.name.clone(), policy);
            }
            PolicyEvent::PodPolicyRemoved(name) => {
                debug!(policy = %name, "Removing pod QoS policy");
                self.pod_policies.remove(&name);
            }
            PolicyEvent::ServicePolicyApplied(policy) => {
                policy.validate()?;
                debug!(
                    policy = %policy.name,
                    priority_class = %policy.priority_class_name,
                    "Applying service policy"
                );
                self.service_policies
                    .insert(policy.priority_class_name.clone(), policy);
            }
            PolicyEvent::ServicePolicyRemoved(priority_class) => {
                debug!(priority_class = %priority_class, "Removing service policy");
                self.service_policies.remove(&priority_class);
            }
            PolicyEvent::ActionApplied(action) => {
                action.validate()?;
                debug!(action = %action.name, "Applying avoidance action");
                self.actions.insert(action.name.clone(), action);
            }
            PolicyEvent::ActionRemoved(name) => {
                debug!(action = %name, "Removing avoidance action");
                self.actions.remove(&name);
            }
            PolicyEvent::PodScheduled(pod) => {
                debug!(pod = %pod.target_id(), "Registering pod");
                self.pods.insert(pod.uid.clone(), pod);
            }
            PolicyEvent::PodRemoved(uid) => {
                debug!(uid = %uid, "Unregistering pod");
                self.pods.remove(&uid);
            }
        }
        Ok(())
    }

    /// Enumerate every objective across node and pod QoS policies,
    /// bound to its enclosing policy's scope.
    pub fn objectives(&self) -> Vec<BoundObjective> {
        let mut bound = Vec::new();

        for entry in self.node_policies.iter() {
            let policy = entry.value();
            for objective in &policy.objectives {
                bound.push(BoundObjective {
                    policy: policy.name.clone(),
                    objective: objective.clone(),
                    selector: policy.selector.clone(),
                    timeout_seconds: policy.node_quality_probe.timeout_seconds,
                });
            }
        }

        for entry in self.pod_policies.iter() {
            let policy = entry.value();
            for objective in &policy.objectives {
                bound.push(BoundObjective {
                    policy: policy.name.clone(),
                    objective: objective.clone(),
                    selector: Some(policy.selector.clone()),
                    timeout_seconds: policy.quality_probe.timeout_seconds,
                });
            }
        }

        bound
    }

    /// Resolve an avoidance action by name.
    pub fn resolve_action(&self, name: &str) -> Option<AvoidanceAction> {
        self.actions.get(name).map(|a| a.clone())
    }

    /// List configured avoidance actions.
    pub fn actions(&self) -> Vec<AvoidanceAction> {
        self.actions.iter().map(|a| a.value().clone()).collect()
    }

    /// Pods on the node matching the given selector; `None` matches all.
    pub fn pods_matching(&self, selector: Option<&LabelSelector>) -> Vec<PodInfo> {
        self.pods
            .iter()
            .filter(|entry| {
                selector
                    .map(|s| s.matches(&entry.value().labels))
                    .unwrap_or(true)
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Effective service policy for a pod's priority class. Pods with
    /// no declared policy fall back to the unmanaged defaults (least
    /// protected, both capabilities allowed).
    pub fn service_policy_for(&self, pod: &PodInfo) -> ServicePolicy {
        pod.priority_class_name
            .as_deref()
            .and_then(|class| self.service_policies.get(class).map(|p| p.clone()))
            .unwrap_or_else(ServicePolicy::unmanaged)
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvoidanceActionStrategy, MetricRule, NodeQualityProbe};
    use std::collections::BTreeMap;

    fn node_policy(name: &str, objectives: Vec<ObjectiveEnsurance>) -> NodeQosPolicy {
        NodeQosPolicy {
            name: name.to_string(),
            selector: None,
            node_quality_probe: NodeQualityProbe {
                timeout_seconds: 5,
                ..Default::default()
            },
            objectives,
        }
    }

    fn objective(name: &str) -> ObjectiveEnsurance {
        ObjectiveEnsurance {
            name: name.to_string(),
            metric_rule: Some(MetricRule {
                name: "cpu_total_usage".to_string(),
                selector: None,
                value: 80.0,
            }),
            avoidance_threshold: 2,
            restore_threshold: 1,
            avoidance_action_name: "throttle".to_string(),
            strategy: AvoidanceActionStrategy::None,
        }
    }

    fn pod(name: &str, class: Option<&str>) -> PodInfo {
        PodInfo {
            name: name.to_string(),
            namespace: "default".to_string(),
            uid: format!("uid-{name}"),
            labels: BTreeMap::new(),
            priority_class_name: class.map(String::from),
            creation_timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_apply_and_enumerate_objectives() {
        let registry = PolicyRegistry::new();
        registry
            .apply(PolicyEvent::NodePolicyApplied(node_policy(
                "node-cpu",
                vec![objective("cpu-usage"), objective("cpu-load")],
            )))
            .unwrap();

        let objectives = registry.objectives();
        assert_eq!(objectives.len(), 2);
        assert!(objectives.iter().all(|o| o.policy == "node-cpu"));
        assert!(objectives.iter().all(|o| o.timeout_seconds == 5));
    }

    #[test]
    fn test_invalid_policy_rejected_previous_kept() {
        let registry = PolicyRegistry::new();
        registry
            .apply(PolicyEvent::NodePolicyApplied(node_policy(
                "node-cpu",
                vec![objective("cpu-usage")],
            )))
            .unwrap();

        let mut bad = objective("cpu-usage");
        bad.avoidance_threshold = 0;
        let result = registry.apply(PolicyEvent::NodePolicyApplied(node_policy(
            "node-cpu",
            vec![bad],
        )));
        assert!(result.is_err());

        // The earlier valid version is still in effect
        let objectives = registry.objectives();
        assert_eq!(objectives.len(), 1);
        assert_eq!(objectives[0].objective.avoidance_threshold, 2);
    }

    #[test]
    fn test_policy_removal_drops_objectives() {
        let registry = PolicyRegistry::new();
        registry
            .apply(PolicyEvent::NodePolicyApplied(node_policy(
                "node-cpu",
                vec![objective("cpu-usage")],
            )))
            .unwrap();
        registry
            .apply(PolicyEvent::NodePolicyRemoved("node-cpu".to_string()))
            .unwrap();

        assert!(registry.objectives().is_empty());
    }

    #[test]
    fn test_service_policy_lookup_and_unmanaged_fallback() {
        let registry = PolicyRegistry::new();
        registry
            .apply(PolicyEvent::ServicePolicyApplied(ServicePolicy {
                name: "critical".to_string(),
                priority_class_name: "prod-high".to_string(),
                resource_priority: crate::models::ResourcePriority {
                    cpu_priority: 0,
                    memory_priority: 1,
                    network_io_priority: 0,
                },
                avoidance_strategy: Default::default(),
            }))
            .unwrap();

        let managed = registry.service_policy_for(&pod("web", Some("prod-high")));
        assert_eq!(managed.resource_priority.cpu_priority, 0);
        // Declared policy without avoidanceStrategy protects its class
        assert!(!managed.avoidance_strategy.allow_throttle);

        let unmanaged = registry.service_policy_for(&pod("batch", None));
        assert_eq!(unmanaged.resource_priority.cpu_priority, 7);
        assert!(unmanaged.avoidance_strategy.allow_throttle);
        assert!(unmanaged.avoidance_strategy.allow_evict);
    }

    #[test]
    fn test_pods_matching_selector() {
        let registry = PolicyRegistry::new();
        let mut web = pod("web", None);
        web.labels.insert("app".to_string(), "web".to_string());
        registry.apply(PolicyEvent::PodScheduled(web)).unwrap();
        registry
            .apply(PolicyEvent::PodScheduled(pod("batch", None)))
            .unwrap();

        let selector = LabelSelector {
            match_labels: [("app".to_string(), "web".to_string())].into(),
        };
        assert_eq!(registry.pods_matching(Some(&selector)).len(), 1);
        assert_eq!(registry.pods_matching(None).len(), 2);

        registry
            .apply(PolicyEvent::PodRemoved("uid-web".to_string()))
            .unwrap();
        assert_eq!(registry.pods_matching(None).len(), 1);
    }
}
