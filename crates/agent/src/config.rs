//! Agent configuration

use anyhow::Result;
use serde::Deserialize;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics/status
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Node-local metric snapshot endpoint
    #[serde(default = "default_metric_endpoint")]
    pub metric_endpoint: String,

    /// Evaluation tick interval in seconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Maximum per-tick jitter in milliseconds
    #[serde(default = "default_tick_jitter")]
    pub tick_jitter_ms: u64,

    /// Upper bound on any single metric probe in seconds
    #[serde(default = "default_probe_safety_timeout")]
    pub probe_safety_timeout_secs: u64,

    /// TTL for the local metric cache in seconds
    #[serde(default = "default_probe_cache_ttl")]
    pub probe_cache_ttl_secs: u64,

    /// Path to the JSON policy bundle applied at startup
    #[serde(default)]
    pub policy_bundle_path: Option<String>,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_metric_endpoint() -> String {
    "http://127.0.0.1:9101/snapshot".to_string()
}

fn default_tick_interval() -> u64 {
    10
}

fn default_tick_jitter() -> u64 {
    1000
}

fn default_probe_safety_timeout() -> u64 {
    10
}

fn default_probe_cache_ttl() -> u64 {
    60
}

impl AgentConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("QOS_AGENT"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| AgentConfig {
            node_name: default_node_name(),
            api_port: default_api_port(),
            metric_endpoint: default_metric_endpoint(),
            tick_interval_secs: default_tick_interval(),
            tick_jitter_ms: default_tick_jitter(),
            probe_safety_timeout_secs: default_probe_safety_timeout(),
            probe_cache_ttl_secs: default_probe_cache_ttl(),
            policy_bundle_path: None,
        }))
    }
}
