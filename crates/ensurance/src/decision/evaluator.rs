//! Objective rule evaluation
//!
//! Pure comparison of a sampled metric value against an objective's
//! rule. An unavailable sample maps to [`Verdict::Unknown`], which must
//! never advance hysteresis counters.

use crate::models::MetricRule;
use serde::{Deserialize, Serialize};

/// Outcome of evaluating one rule for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The rule holds; the objective is healthy.
    Satisfied,
    /// The rule is breached this tick.
    Violated,
    /// The metric was unavailable; a no-op tick.
    Unknown,
}

/// Evaluate a metric rule against a sampled value.
///
/// An observed value strictly above the rule's target is a violation.
/// Missing or non-finite samples are unknown.
pub fn evaluate(rule: &MetricRule, sample: Option<f64>) -> Verdict {
    match sample {
        None => Verdict::Unknown,
        Some(value) if !value.is_finite() => Verdict::Unknown,
        Some(value) if value > rule.value => Verdict::Violated,
        Some(_) => Verdict::Satisfied,
    }
}
