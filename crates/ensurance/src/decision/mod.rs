//! The avoidance decision core
//!
//! This module turns noisy per-tick metric samples into stable
//! trigger/restore decisions:
//! - rule evaluation against sampled values
//! - per-objective hysteresis with asymmetric thresholds
//! - action resolution and deterministic target ranking
//! - cooldown admission per (action, target) pair

mod cooldown;
mod evaluator;
mod hysteresis;
mod selector;

pub use cooldown::CooldownGate;
pub use evaluator::{evaluate, Verdict};
pub use hysteresis::{
    HysteresisTracker, ObjectiveKey, ObjectivePhase, ObjectiveState, ObjectiveStatus,
    TransitionEdge,
};
pub use selector::{ActionSelector, Decision, ResourceDimension, SelectError};
