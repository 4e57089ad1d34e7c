//! HTTP metric probe against the node-local snapshot endpoint
//!
//! The endpoint serves a flat JSON object mapping metric names to
//! their latest sampled values. One GET per probe; the engine applies
//! the per-policy timeout on top of the client's own.

use anyhow::{Context, Result};
use ensurance::probe::{async_trait, MetricProbe};
use ensurance::MetricRule;
use std::collections::HashMap;
use std::time::Duration;

pub struct HttpMetricProbe {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMetricProbe {
    pub fn new(endpoint: impl Into<String>, client_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(client_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl MetricProbe for HttpMetricProbe {
    async fn probe(&self, rule: &MetricRule) -> Result<f64> {
        let snapshot: HashMap<String, f64> = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .context("Metric endpoint unreachable")?
            .error_for_status()
            .context("Metric endpoint returned an error status")?
            .json()
            .await
            .context("Metric snapshot is not valid JSON")?;

        snapshot
            .get(&rule.name)
            .copied()
            .with_context(|| format!("metric {} not in snapshot", rule.name))
    }
}
