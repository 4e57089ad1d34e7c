//! Hysteresis tracking for objective state
//!
//! Converts the evaluator's per-tick verdicts into stable trigger and
//! restore decisions. Each objective carries asymmetric thresholds so
//! operators can tune entering and leaving avoidance independently;
//! counters are monotonic within a phase, clamp at their threshold and
//! reset on phase exit.

use super::evaluator::Verdict;
use crate::models::ObjectiveEnsurance;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identity of one objective within one enclosing policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectiveKey {
    pub policy: String,
    pub objective: String,
}

impl ObjectiveKey {
    pub fn new(policy: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            objective: objective.into(),
        }
    }
}

impl std::fmt::Display for ObjectiveKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.policy, self.objective)
    }
}

/// Phase of one objective's avoidance state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectivePhase {
    /// Healthy; no violation streak in progress.
    #[default]
    Normal,
    /// Accumulating consecutive violations below the trigger threshold.
    RaisingAlert,
    /// Avoidance is in effect.
    Triggered,
    /// Still triggered, accumulating consecutive satisfied ticks.
    Lowering,
}

impl ObjectivePhase {
    /// Whether the objective is inside a triggered episode.
    pub fn is_triggered(&self) -> bool {
        matches!(self, ObjectivePhase::Triggered | ObjectivePhase::Lowering)
    }
}

/// Transition edge emitted by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEdge {
    /// The avoidance threshold was reached; enact the action.
    Enact,
    /// The restore threshold was reached; invoke the inverse action.
    Restore,
}

/// Engine-owned mutable state for one objective.
///
/// Created on first evaluation, destroyed when the objective leaves
/// policy. Held in memory only: a restart resets every objective to
/// `Normal`.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveState {
    pub phase: ObjectivePhase,
    /// Consecutive violated ticks since last Normal, clamped at the
    /// avoidance threshold.
    pub raising_count: u32,
    /// Consecutive satisfied ticks since Triggered, clamped at the
    /// restore threshold.
    pub lowering_count: u32,
    /// Violated ticks observed since the episode's enactment; drives
    /// throttle-to-eviction escalation.
    pub triggered_ticks: u32,
    /// Eviction has already been escalated this episode.
    pub escalated: bool,
    /// Enactment is owed but the action reference did not resolve.
    pub pending_action: bool,
    /// Unix timestamp of the last successful enactment.
    pub last_enactment: Option<i64>,
}

impl ObjectiveState {
    /// Advance the state machine by one tick.
    fn observe(
        &mut self,
        verdict: Verdict,
        avoidance_threshold: u32,
        restore_threshold: u32,
    ) -> Option<TransitionEdge> {
        match verdict {
            Verdict::Unknown => None,
            Verdict::Violated => {
                if self.phase.is_triggered() {
                    self.lowering_count = 0;
                    self.phase = ObjectivePhase::Triggered;
                    self.triggered_ticks = self.triggered_ticks.saturating_add(1);
                    return None;
                }
                self.raising_count = (self.raising_count + 1).min(avoidance_threshold);
                if self.raising_count >= avoidance_threshold {
                    self.phase = ObjectivePhase::Triggered;
                    self.raising_count = 0;
                    self.lowering_count = 0;
                    self.triggered_ticks = 0;
                    self.escalated = false;
                    Some(TransitionEdge::Enact)
                } else {
                    self.phase = ObjectivePhase::RaisingAlert;
                    None
                }
            }
            Verdict::Satisfied => {
                if !self.phase.is_triggered() {
                    self.raising_count = 0;
                    self.phase = ObjectivePhase::Normal;
                    return None;
                }
                self.lowering_count = (self.lowering_count + 1).min(restore_threshold);
                if self.lowering_count >= restore_threshold {
                    *self = ObjectiveState::default();
                    Some(TransitionEdge::Restore)
                } else {
                    self.phase = ObjectivePhase::Lowering;
                    None
                }
            }
        }
    }
}

/// Serializable status row for one objective, exposed via the agent's
/// `/status` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveStatus {
    pub policy: String,
    pub objective: String,
    pub phase: ObjectivePhase,
    pub raising_count: u32,
    pub lowering_count: u32,
    pub pending_action: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_enactment: Option<String>,
}

/// Owner of all per-objective state, partitioned by objective identity.
///
/// No other component writes `ObjectiveState`; ticks for one objective
/// must be delivered in order, ticks for different objectives may run
/// concurrently.
#[derive(Default)]
pub struct HysteresisTracker {
    states: DashMap<ObjectiveKey, ObjectiveState>,
}

impl HysteresisTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one verdict for an objective, creating its state on first
    /// sight. Returns the transition edge crossed this tick, if any.
    pub fn observe(
        &self,
        key: &ObjectiveKey,
        verdict: Verdict,
        objective: &ObjectiveEnsurance,
    ) -> Option<TransitionEdge> {
        self.states.entry(key.clone()).or_default().observe(
            verdict,
            objective.avoidance_threshold,
            objective.restore_threshold,
        )
    }

    /// Check whether a triggered objective is due for eviction
    /// escalation, marking it escalated when so. At most one escalation
    /// per triggered episode.
    pub fn escalation_due(&self, key: &ObjectiveKey, grace_ticks: u32) -> bool {
        let Some(mut state) = self.states.get_mut(key) else {
            return false;
        };
        if state.phase.is_triggered() && !state.escalated && state.triggered_ticks >= grace_ticks {
            state.escalated = true;
            true
        } else {
            false
        }
    }

    /// Record a successful enactment for status reporting.
    pub fn note_enactment(&self, key: &ObjectiveKey, timestamp: i64) {
        if let Some(mut state) = self.states.get_mut(key) {
            state.last_enactment = Some(timestamp);
        }
    }

    /// Flag or clear a Triggered-pending objective whose action
    /// reference has not resolved.
    pub fn set_pending(&self, key: &ObjectiveKey, pending: bool) {
        if let Some(mut state) = self.states.get_mut(key) {
            state.pending_action = pending;
        }
    }

    /// Whether the objective still owes an enactment.
    pub fn is_pending(&self, key: &ObjectiveKey) -> bool {
        self.states
            .get(key)
            .map(|s| s.pending_action)
            .unwrap_or(false)
    }

    pub fn get(&self, key: &ObjectiveKey) -> Option<ObjectiveState> {
        self.states.get(key).map(|s| s.clone())
    }

    /// Drop state for objectives no longer present in policy.
    pub fn retain(&self, live: &HashSet<ObjectiveKey>) {
        self.states.retain(|key, _| live.contains(key));
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Status rows for every tracked objective, sorted for stable
    /// output.
    pub fn snapshot(&self) -> Vec<ObjectiveStatus> {
        let mut rows: Vec<ObjectiveStatus> = self
            .states
            .iter()
            .map(|entry| {
                let key = entry.key();
                let state = entry.value();
                ObjectiveStatus {
                    policy: key.policy.clone(),
                    objective: key.objective.clone(),
                    phase: state.phase,
                    raising_count: state.raising_count,
                    lowering_count: state.lowering_count,
                    pending_action: state.pending_action,
                    last_enactment: state.last_enactment.and_then(|ts| {
                        chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.to_rfc3339())
                    }),
                }
            })
            .collect();
        rows.sort_by(|a, b| (&a.policy, &a.objective).cmp(&(&b.policy, &b.objective)));
        rows
    }
}
