//! Cooldown admission for avoidance enactments
//!
//! Tracks the last enactment per (action, target) pair and denies
//! enact/restore calls landing inside the action's cooldown window.
//! The timestamp map is the one piece of state shared across objectives
//! referencing the same action; the DashMap entry API gives the
//! per-key locking that makes admission single-writer per pair.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Gate enforcing a minimum interval between successive enactments or
/// restorations of one action on one target.
#[derive(Default)]
pub struct CooldownGate {
    stamps: DashMap<(String, String), Instant>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an enactment, stamping the pair atomically on admission so
    /// a concurrent objective sharing the action cannot double-enact.
    /// Denied callers must skip this tick's executor call; the
    /// hysteresis state still advances.
    pub fn admit(&self, action: &str, target: &str, cool_down: Duration) -> bool {
        match self.stamps.entry((action.to_string(), target.to_string())) {
            Entry::Vacant(entry) => {
                entry.insert(Instant::now());
                true
            }
            Entry::Occupied(mut entry) => {
                if entry.get().elapsed() >= cool_down {
                    entry.insert(Instant::now());
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Read-only admission check, used by preview decisions so a
    /// dry-run never consumes cooldown budget.
    pub fn would_admit(&self, action: &str, target: &str, cool_down: Duration) -> bool {
        self.stamps
            .get(&(action.to_string(), target.to_string()))
            .map(|stamp| stamp.elapsed() >= cool_down)
            .unwrap_or(true)
    }

    /// Remove the stamp for a target whose executor call failed,
    /// leaving it eligible for immediate retry.
    pub fn rescind(&self, action: &str, target: &str) {
        self.stamps
            .remove(&(action.to_string(), target.to_string()));
    }
}
