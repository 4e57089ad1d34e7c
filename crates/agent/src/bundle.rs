//! Policy bundle loading
//!
//! The agent bootstraps its registry from a JSON bundle on disk; live
//! reconfiguration arrives later through the same `PolicyEvent` path.
//! Rejected objects are skipped individually so one malformed action
//! never blocks the rest of the bundle.

use anyhow::{Context, Result};
use ensurance::{
    AvoidanceAction, NodeQosPolicy, PodInfo, PodQosPolicy, PolicyEvent, PolicyRegistry,
    ServicePolicy,
};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// On-disk policy bundle shape.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyBundle {
    #[serde(default)]
    pub node_qos_policies: Vec<NodeQosPolicy>,
    #[serde(default)]
    pub pod_qos_policies: Vec<PodQosPolicy>,
    #[serde(default)]
    pub service_policies: Vec<ServicePolicy>,
    #[serde(default)]
    pub actions: Vec<AvoidanceAction>,
    /// Initial pod snapshot; normally supplied at runtime by the
    /// surrounding system.
    #[serde(default)]
    pub pods: Vec<PodInfo>,
}

impl PolicyBundle {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy bundle {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Policy bundle {} is not valid JSON", path.display()))
    }

    fn into_events(self) -> Vec<PolicyEvent> {
        let mut events = Vec::new();
        events.extend(self.actions.into_iter().map(PolicyEvent::ActionApplied));
        events.extend(
            self.service_policies
                .into_iter()
                .map(PolicyEvent::ServicePolicyApplied),
        );
        events.extend(
            self.node_qos_policies
                .into_iter()
                .map(PolicyEvent::NodePolicyApplied),
        );
        events.extend(
            self.pod_qos_policies
                .into_iter()
                .map(PolicyEvent::PodPolicyApplied),
        );
        events.extend(self.pods.into_iter().map(PolicyEvent::PodScheduled));
        events
    }

    /// Apply the bundle to the registry. Returns (applied, rejected).
    pub fn apply(self, registry: &PolicyRegistry) -> (usize, usize) {
        let mut applied = 0;
        let mut rejected = 0;
        for event in self.into_events() {
            match registry.apply(event) {
                Ok(()) => applied += 1,
                Err(e) => {
                    rejected += 1;
                    warn!(error = %e, "Rejected policy bundle object");
                }
            }
        }
        info!(applied, rejected, "Policy bundle applied");
        (applied, rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BUNDLE: &str = r#"{
        "actions": [
            { "name": "throttle-low-prio", "coolDownSeconds": 120,
              "throttle": { "cpuThrottle": { "minCPURatio": 10, "stepCPURatio": 15 } } },
            { "name": "bad-action", "coolDownSeconds": 0 }
        ],
        "servicePolicies": [
            { "name": "critical", "priorityClassName": "prod-high",
              "resourcePriority": { "cpuPriority": 0, "memoryPriority": 0 } }
        ],
        "nodeQosPolicies": [
            { "name": "node-cpu",
              "nodeQualityProbe": { "timeoutSeconds": 5 },
              "objectiveEnsurances": [
                  { "name": "cpu-usage",
                    "metricRule": { "name": "cpu_total_usage", "value": 80 },
                    "avoidanceThreshold": 3,
                    "restoreThreshold": 2,
                    "actionName": "throttle-low-prio" }
              ] }
        ],
        "pods": [
            { "name": "batch", "namespace": "default", "uid": "uid-batch",
              "creationTimestamp": 1700000000 }
        ]
    }"#;

    #[test]
    fn test_bundle_applies_valid_objects_and_skips_rejects() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BUNDLE.as_bytes()).unwrap();

        let bundle = PolicyBundle::load(file.path()).unwrap();
        let registry = PolicyRegistry::new();
        let (applied, rejected) = bundle.apply(&registry);

        // The zero-cooldown action is the only reject
        assert_eq!(applied, 4);
        assert_eq!(rejected, 1);
        assert_eq!(registry.objectives().len(), 1);
        assert!(registry.resolve_action("throttle-low-prio").is_some());
        assert!(registry.resolve_action("bad-action").is_none());
        assert_eq!(registry.pod_count(), 1);
    }

    #[test]
    fn test_missing_bundle_is_an_error() {
        assert!(PolicyBundle::load("/nonexistent/bundle.json").is_err());
    }

    #[test]
    fn test_empty_bundle_is_valid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{}").unwrap();

        let bundle = PolicyBundle::load(file.path()).unwrap();
        let registry = PolicyRegistry::new();
        assert_eq!(bundle.apply(&registry), (0, 0));
    }
}
