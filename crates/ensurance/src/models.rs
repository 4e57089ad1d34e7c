//! Declarative QoS ensurance schema
//!
//! Value records describing service policies, QoS ensurance policies,
//! objectives and avoidance actions. These objects are owned by the
//! configuration layer and are read-only to the engine; every record is
//! validated when it is applied to the registry so malformed input never
//! reaches the evaluation loop.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Highest (most protected) priority tier.
pub const PRIORITY_TIER_MIN: u8 = 0;
/// Lowest (least protected) priority tier.
pub const PRIORITY_TIER_MAX: u8 = 7;

/// Maximum length for action descriptions.
const MAX_DESCRIPTION_LEN: usize = 1024;

/// Validation failures for declarative objects.
///
/// Raised at registry apply time; a rejected object is dropped and the
/// previously applied version (if any) stays in effect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("{kind} has an empty name")]
    EmptyName { kind: &'static str },

    #[error("objective {objective}: {field} must be at least 1")]
    ZeroThreshold {
        objective: String,
        field: &'static str,
    },

    #[error("objective {objective}: actionName must not be empty")]
    MissingActionName { objective: String },

    #[error("objective {objective}: metricRule is required")]
    MissingMetricRule { objective: String },

    #[error("action {action}: coolDownSeconds must be at least 1")]
    ZeroCooldown { action: String },

    #[error("action {action}: {field} must be within [0,100]")]
    RatioOutOfRange {
        action: String,
        field: &'static str,
    },

    #[error("action {action}: description exceeds {MAX_DESCRIPTION_LEN} characters")]
    DescriptionTooLong { action: String },

    #[error("service policy {policy}: {field} must be within [0,7]")]
    PriorityOutOfRange {
        policy: String,
        field: &'static str,
    },
}

/// How a triggered objective's action is carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvoidanceActionStrategy {
    /// Do the action when the rules trigger.
    #[default]
    None,
    /// Record the decision only; the executor is never invoked.
    Preview,
}

/// Label query over pods.
///
/// Full selector matching belongs to the surrounding system; equality
/// matching over labels is the interface boundary here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Whether the given label set satisfies every selector entry.
    /// An empty selector matches everything.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// Per-resource priority tiers for one priority class.
///
/// Each tier is in [0,7]; 0 is the most protected. When a resource is
/// under contention, higher-tier pods are throttled or evicted first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePriority {
    #[serde(default)]
    pub cpu_priority: u8,
    #[serde(default)]
    pub memory_priority: u8,
    #[serde(default, rename = "networkIOPriority")]
    pub network_io_priority: u8,
}

/// Which remedial capabilities are allowed for a priority class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvoidanceStrategy {
    #[serde(default)]
    pub allow_throttle: bool,
    #[serde(default)]
    pub allow_evict: bool,
}

/// Behaviour for all pods sharing one priority class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePolicy {
    pub name: String,
    pub priority_class_name: String,
    #[serde(default)]
    pub resource_priority: ResourcePriority,
    #[serde(default)]
    pub avoidance_strategy: AvoidanceStrategy,
}

impl ServicePolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.is_empty() {
            return Err(PolicyError::EmptyName {
                kind: "service policy",
            });
        }
        let p = &self.resource_priority;
        for (field, tier) in [
            ("cpuPriority", p.cpu_priority),
            ("memoryPriority", p.memory_priority),
            ("networkIOPriority", p.network_io_priority),
        ] {
            if tier > PRIORITY_TIER_MAX {
                return Err(PolicyError::PriorityOutOfRange {
                    policy: self.name.clone(),
                    field,
                });
            }
        }
        Ok(())
    }

    /// Effective policy for pods whose priority class carries no
    /// declared ServicePolicy: least protected, both capabilities
    /// allowed.
    pub fn unmanaged() -> Self {
        Self {
            name: String::new(),
            priority_class_name: String::new(),
            resource_priority: ResourcePriority {
                cpu_priority: PRIORITY_TIER_MAX,
                memory_priority: PRIORITY_TIER_MAX,
                network_io_priority: PRIORITY_TIER_MAX,
            },
            avoidance_strategy: AvoidanceStrategy {
                allow_throttle: true,
                allow_evict: true,
            },
        }
    }
}

/// Metric identifier and target for one objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    /// Target value; an observed value strictly above it is a violation.
    pub value: f64,
}

/// A single metric-vs-threshold rule with a named remedial action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveEnsurance {
    pub name: String,

    pub metric_rule: Option<MetricRule>,

    /// Consecutive violated ticks required to trigger avoidance.
    #[serde(default = "default_threshold")]
    pub avoidance_threshold: u32,

    /// Consecutive satisfied ticks required to restore.
    #[serde(default = "default_threshold")]
    pub restore_threshold: u32,

    /// Avoidance action executed when the rule triggers.
    #[serde(rename = "actionName")]
    pub avoidance_action_name: String,

    #[serde(default)]
    pub strategy: AvoidanceActionStrategy,
}

fn default_threshold() -> u32 {
    1
}

impl ObjectiveEnsurance {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.is_empty() {
            return Err(PolicyError::EmptyName { kind: "objective" });
        }
        if self.avoidance_threshold == 0 {
            return Err(PolicyError::ZeroThreshold {
                objective: self.name.clone(),
                field: "avoidanceThreshold",
            });
        }
        if self.restore_threshold == 0 {
            return Err(PolicyError::ZeroThreshold {
                objective: self.name.clone(),
                field: "restoreThreshold",
            });
        }
        if self.avoidance_action_name.is_empty() {
            return Err(PolicyError::MissingActionName {
                objective: self.name.clone(),
            });
        }
        if self.metric_rule.is_none() {
            return Err(PolicyError::MissingMetricRule {
                objective: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// HTTP endpoint to probe for quality metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpGetProbe {
    #[serde(default)]
    pub path: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_scheme() -> String {
    "http".to_string()
}

/// How to probe a pod's quality metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityProbe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_get: Option<HttpGetProbe>,
    /// Probe timeout in seconds; 0 means no request timeout (the engine
    /// still applies its own safety timeout per tick).
    #[serde(default)]
    pub timeout_seconds: u32,
}

/// Node-local metric source with a bounded-staleness cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLocalProbe {
    #[serde(default = "default_local_cache_ttl")]
    pub local_cache_ttl_seconds: u32,
}

fn default_local_cache_ttl() -> u32 {
    60
}

/// How to probe node quality metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeQualityProbe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_get: Option<HttpGetProbe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_local_get: Option<NodeLocalProbe>,
    #[serde(default)]
    pub timeout_seconds: u32,
}

/// QoS ensurance policy scoped to pods matching a selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodQosPolicy {
    pub name: String,
    #[serde(default)]
    pub selector: LabelSelector,
    #[serde(default)]
    pub quality_probe: QualityProbe,
    #[serde(default, rename = "objectiveEnsurance")]
    pub objectives: Vec<ObjectiveEnsurance>,
}

impl PodQosPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.is_empty() {
            return Err(PolicyError::EmptyName {
                kind: "pod QoS policy",
            });
        }
        for objective in &self.objectives {
            objective.validate()?;
        }
        Ok(())
    }
}

/// QoS ensurance policy evaluated against node-level metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeQosPolicy {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    #[serde(default)]
    pub node_quality_probe: NodeQualityProbe,
    #[serde(default, rename = "objectiveEnsurances")]
    pub objectives: Vec<ObjectiveEnsurance>,
}

impl NodeQosPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.is_empty() {
            return Err(PolicyError::EmptyName {
                kind: "node QoS policy",
            });
        }
        for objective in &self.objectives {
            objective.validate()?;
        }
        Ok(())
    }
}

/// CPU share and quota throttling parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuThrottle {
    /// Floor for the throttled CPU allotment as a percentage of the
    /// pod's limit; a pod is never throttled below this ratio.
    #[serde(default, rename = "minCPURatio")]
    pub min_cpu_ratio: u8,
    /// Percentage removed from CPU share and limit per down-size step.
    #[serde(default, rename = "stepCPURatio")]
    pub step_cpu_ratio: u8,
}

/// Memory pressure relief parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryThrottle {
    /// Force page-cache reclaim for low priority pods.
    #[serde(default, rename = "forceGC")]
    pub force_gc: bool,
}

/// Throttling capability of an avoidance action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleAction {
    #[serde(default)]
    pub cpu_throttle: CpuThrottle,
    #[serde(default)]
    pub memory_throttle: MemoryThrottle,
}

/// Eviction capability of an avoidance action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvictionAction {
    /// Overrides the pod's own grace period when set; 0 deletes
    /// immediately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<u32>,
}

/// A named bundle of remedial capabilities with a cooldown.
///
/// Throttle and eviction are independent; an action may define either,
/// both, or neither (a no-op).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvoidanceAction {
    pub name: String,

    /// Minimum seconds between two enactments or restorations of this
    /// action on the same target.
    #[serde(default = "default_cool_down")]
    pub cool_down_seconds: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<ThrottleAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eviction: Option<EvictionAction>,

    /// When both capabilities are present: `None` applies them together
    /// on the first enactment; `Some(n)` applies throttle first and
    /// escalates to eviction only after the objective stays triggered
    /// for `n` further ticks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_grace_ticks: Option<u32>,

    #[serde(default)]
    pub description: String,
}

fn default_cool_down() -> u32 {
    300
}

impl AvoidanceAction {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.is_empty() {
            return Err(PolicyError::EmptyName { kind: "action" });
        }
        if self.cool_down_seconds == 0 {
            return Err(PolicyError::ZeroCooldown {
                action: self.name.clone(),
            });
        }
        if let Some(throttle) = &self.throttle {
            for (field, ratio) in [
                ("minCPURatio", throttle.cpu_throttle.min_cpu_ratio),
                ("stepCPURatio", throttle.cpu_throttle.step_cpu_ratio),
            ] {
                if ratio > 100 {
                    return Err(PolicyError::RatioOutOfRange {
                        action: self.name.clone(),
                        field,
                    });
                }
            }
        }
        if self.description.len() > MAX_DESCRIPTION_LEN {
            return Err(PolicyError::DescriptionTooLong {
                action: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Read-only snapshot of a pod scheduled on this node.
///
/// Supplied by the surrounding system; the engine never mutates pods
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,
    /// Unix timestamp of pod creation; used as the deterministic
    /// secondary ordering key for target selection.
    pub creation_timestamp: i64,
}

impl PodInfo {
    /// Stable identifier used for cooldown bookkeeping and executor
    /// target lists.
    pub fn target_id(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objective(name: &str) -> ObjectiveEnsurance {
        ObjectiveEnsurance {
            name: name.to_string(),
            metric_rule: Some(MetricRule {
                name: "cpu_total_usage".to_string(),
                selector: None,
                value: 80.0,
            }),
            avoidance_threshold: 3,
            restore_threshold: 2,
            avoidance_action_name: "throttle-low-prio".to_string(),
            strategy: AvoidanceActionStrategy::None,
        }
    }

    #[test]
    fn test_objective_validation_rejects_zero_thresholds() {
        let mut obj = objective("cpu-usage");
        obj.avoidance_threshold = 0;
        assert_eq!(
            obj.validate(),
            Err(PolicyError::ZeroThreshold {
                objective: "cpu-usage".to_string(),
                field: "avoidanceThreshold",
            })
        );

        let mut obj = objective("cpu-usage");
        obj.restore_threshold = 0;
        assert!(matches!(
            obj.validate(),
            Err(PolicyError::ZeroThreshold { .. })
        ));
    }

    #[test]
    fn test_objective_requires_action_and_rule() {
        let mut obj = objective("cpu-usage");
        obj.avoidance_action_name = String::new();
        assert!(matches!(
            obj.validate(),
            Err(PolicyError::MissingActionName { .. })
        ));

        let mut obj = objective("cpu-usage");
        obj.metric_rule = None;
        assert!(matches!(
            obj.validate(),
            Err(PolicyError::MissingMetricRule { .. })
        ));
    }

    #[test]
    fn test_action_validation() {
        let mut action = AvoidanceAction {
            name: "throttle-low-prio".to_string(),
            cool_down_seconds: 300,
            throttle: Some(ThrottleAction {
                cpu_throttle: CpuThrottle {
                    min_cpu_ratio: 10,
                    step_cpu_ratio: 15,
                },
                memory_throttle: MemoryThrottle::default(),
            }),
            eviction: None,
            escalation_grace_ticks: None,
            description: String::new(),
        };
        assert!(action.validate().is_ok());

        action.cool_down_seconds = 0;
        assert!(matches!(
            action.validate(),
            Err(PolicyError::ZeroCooldown { .. })
        ));

        action.cool_down_seconds = 300;
        action.throttle.as_mut().unwrap().cpu_throttle.step_cpu_ratio = 101;
        assert!(matches!(
            action.validate(),
            Err(PolicyError::RatioOutOfRange { .. })
        ));
    }

    #[test]
    fn test_service_policy_tier_range() {
        let policy = ServicePolicy {
            name: "batch".to_string(),
            priority_class_name: "batch-low".to_string(),
            resource_priority: ResourcePriority {
                cpu_priority: 8,
                ..Default::default()
            },
            avoidance_strategy: AvoidanceStrategy::default(),
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::PriorityOutOfRange { .. })
        ));
    }

    #[test]
    fn test_selector_matching() {
        let selector = LabelSelector {
            match_labels: [("app".to_string(), "web".to_string())].into(),
        };

        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "web".to_string());
        labels.insert("tier".to_string(), "frontend".to_string());
        assert!(selector.matches(&labels));

        labels.insert("app".to_string(), "batch".to_string());
        assert!(!selector.matches(&labels));

        // Empty selector matches everything
        assert!(LabelSelector::default().matches(&labels));
    }

    #[test]
    fn test_objective_defaults_from_json() {
        let json = r#"{
            "name": "mem-usage",
            "metricRule": { "name": "memory_total_usage", "value": 0.9 },
            "actionName": "evict-low-prio"
        }"#;

        let obj: ObjectiveEnsurance = serde_json::from_str(json).unwrap();
        assert_eq!(obj.avoidance_threshold, 1);
        assert_eq!(obj.restore_threshold, 1);
        assert_eq!(obj.strategy, AvoidanceActionStrategy::None);
        assert!(obj.validate().is_ok());
    }

    #[test]
    fn test_capability_field_tags_from_json() {
        // The throttle ratio and priority tags carry upper-case
        // acronyms; they must not fall back to defaults when parsed.
        let json = r#"{
            "name": "throttle-low-prio",
            "throttle": {
                "cpuThrottle": { "minCPURatio": 10, "stepCPURatio": 15 },
                "memoryThrottle": { "forceGC": true }
            }
        }"#;

        let action: AvoidanceAction = serde_json::from_str(json).unwrap();
        let throttle = action.throttle.unwrap();
        assert_eq!(throttle.cpu_throttle.min_cpu_ratio, 10);
        assert_eq!(throttle.cpu_throttle.step_cpu_ratio, 15);
        assert!(throttle.memory_throttle.force_gc);

        let json = r#"{
            "name": "batch",
            "priorityClassName": "batch-low",
            "resourcePriority": { "networkIOPriority": 5 }
        }"#;

        let policy: ServicePolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.resource_priority.network_io_priority, 5);

        // Serialization emits the same tags
        let out = serde_json::to_string(&policy).unwrap();
        assert!(out.contains("networkIOPriority"));
        let out = serde_json::to_string(&action).unwrap();
        assert!(out.contains("minCPURatio"));
        assert!(out.contains("forceGC"));
    }

    #[test]
    fn test_action_defaults_from_json() {
        let json = r#"{ "name": "noop" }"#;
        let action: AvoidanceAction = serde_json::from_str(json).unwrap();
        assert_eq!(action.cool_down_seconds, 300);
        assert!(action.throttle.is_none());
        assert!(action.eviction.is_none());
        assert!(action.validate().is_ok());
    }
}
