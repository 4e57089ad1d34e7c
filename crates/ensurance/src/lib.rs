//! QoS ensurance decision engine for node agents
//!
//! This crate provides the core functionality for:
//! - Declarative QoS policy objects and their validation
//! - Hysteresis-gated trigger and restore decisions
//! - Priority-tier target selection and cooldown gating
//! - Metric probing and action execution seams
//! - Health checks and observability

pub mod decision;
pub mod engine;
pub mod executor;
pub mod health;
pub mod models;
pub mod observability;
pub mod policy;
pub mod probe;

pub use decision::{
    evaluate, ActionSelector, CooldownGate, Decision, HysteresisTracker, ObjectiveKey,
    ObjectivePhase, ObjectiveState, ObjectiveStatus, TransitionEdge, Verdict,
};
pub use engine::{EngineConfig, EnsuranceLoop, EnsuranceLoopBuilder};
pub use executor::{ActionExecutor, ExecutionOutcome, TargetFailure, TargetSet};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use policy::{BoundObjective, PolicyEvent, PolicyRegistry};
pub use probe::{CachedProbe, MetricProbe, SnapshotProbe};
