//! Metric probing interface
//!
//! The engine never gathers metrics itself; it probes a
//! [`MetricProbe`] implementation once per objective per tick. Probe
//! failures and timeouts surface as an unknown evaluation result and
//! never advance hysteresis counters.

use crate::models::MetricRule;
use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use async_trait::async_trait;

/// Source of sampled metric values, one lookup per rule identity.
#[async_trait]
pub trait MetricProbe: Send + Sync {
    /// Sample the current value for a metric rule. An `Err` means the
    /// metric is unavailable this tick.
    async fn probe(&self, rule: &MetricRule) -> Result<f64>;
}

/// Cache key for a rule: name plus its selector entries.
fn rule_key(rule: &MetricRule) -> String {
    match &rule.selector {
        None => rule.name.clone(),
        Some(selector) => {
            let mut key = rule.name.clone();
            for (k, v) in &selector.match_labels {
                key.push('|');
                key.push_str(k);
                key.push('=');
                key.push_str(v);
            }
            key
        }
    }
}

/// TTL cache in front of a node-local probe, bounding probe cost when
/// many objectives share a rule.
pub struct CachedProbe {
    inner: Arc<dyn MetricProbe>,
    ttl: Duration,
    entries: DashMap<String, (Instant, f64)>,
}

impl CachedProbe {
    pub fn new(inner: Arc<dyn MetricProbe>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl MetricProbe for CachedProbe {
    async fn probe(&self, rule: &MetricRule) -> Result<f64> {
        let key = rule_key(rule);

        if let Some(entry) = self.entries.get(&key) {
            let (sampled_at, value) = *entry;
            if sampled_at.elapsed() < self.ttl {
                return Ok(value);
            }
        }

        // Stale entries are not served on probe failure; the engine
        // treats the miss as an unknown tick instead.
        let value = self.inner.probe(rule).await?;
        self.entries.insert(key, (Instant::now(), value));
        Ok(value)
    }
}

/// In-memory snapshot probe keyed by rule name.
///
/// The seam for externally collected snapshots, and the test double for
/// the engine loop.
#[derive(Default)]
pub struct SnapshotProbe {
    values: DashMap<String, f64>,
}

impl SnapshotProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the latest sampled value for a metric.
    pub fn set(&self, metric: &str, value: f64) {
        self.values.insert(metric.to_string(), value);
    }

    /// Mark a metric as unavailable.
    pub fn clear(&self, metric: &str) {
        self.values.remove(metric);
    }
}

#[async_trait]
impl MetricProbe for SnapshotProbe {
    async fn probe(&self, rule: &MetricRule) -> Result<f64> {
        self.values
            .get(&rule.name)
            .map(|v| *v)
            .ok_or_else(|| anyhow::anyhow!("metric {} unavailable", rule.name))
    }
}
