//! Node Configuration
//!
//! Layered configuration for the neural node: an optional file,
//! `config/default`, `config/local`, then `NEURAL__*` environment variables.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use neural_agent_kernel::RuntimeConfig;
use neural_agents::FleetSettings;
use neural_manager::ManagerConfig;
use neural_oracle::{HttpOracleConfig, OracleKind};
use neural_rules::fraud::DEFAULT_THRESHOLD;
use neural_types::AgentRole;
use serde::{Deserialize, Serialize};

/// Node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub agents: AgentSettings,

    #[serde(default)]
    pub oracle: OracleSettings,

    #[serde(default)]
    pub bus: BusSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Fleet identity, thresholds and runtime bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Fleet-wide seed (also `AGENT_SEED`)
    #[serde(default)]
    pub base_seed: Option<String>,

    /// Per-role seed overrides
    #[serde(default)]
    pub seeds: BTreeMap<AgentRole, String>,

    /// Fraud detection threshold (also `FRAUD_DETECTION_THRESHOLD`)
    #[serde(default = "default_fraud_threshold")]
    pub fraud_threshold: f64,

    #[serde(default = "default_query_timeout")]
    pub query_timeout_ms: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_grace_period")]
    pub grace_period_ms: u64,

    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    /// 0 disables kernel tracing
    #[serde(default = "default_trace_max_entries")]
    pub trace_max_entries: usize,

    #[serde(default = "default_enabled_roles")]
    pub enabled: Vec<AgentRole>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            base_seed: None,
            seeds: BTreeMap::new(),
            fraud_threshold: default_fraud_threshold(),
            query_timeout_ms: default_query_timeout(),
            request_timeout_ms: default_request_timeout(),
            grace_period_ms: default_grace_period(),
            inbox_capacity: default_inbox_capacity(),
            trace_max_entries: default_trace_max_entries(),
            enabled: default_enabled_roles(),
        }
    }
}

impl AgentSettings {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn fleet(&self) -> FleetSettings {
        FleetSettings {
            base_seed: self.base_seed.clone(),
            seeds: self.seeds.clone(),
            fraud_threshold: self.fraud_threshold,
            enabled: self.enabled.clone(),
        }
    }

    pub fn manager(&self) -> ManagerConfig {
        ManagerConfig {
            runtime: RuntimeConfig {
                inbox_capacity: self.inbox_capacity.max(1),
                trace_max_entries: (self.trace_max_entries > 0).then_some(self.trace_max_entries),
            },
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            grace_period: Duration::from_millis(self.grace_period_ms),
        }
    }
}

/// Knowledge oracle selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    /// `none`, `rules` or `http`
    #[serde(default = "default_oracle_provider")]
    pub provider: String,

    #[serde(default = "default_oracle_url")]
    pub url: String,

    #[serde(default = "default_oracle_timeout")]
    pub timeout_ms: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            provider: default_oracle_provider(),
            url: default_oracle_url(),
            timeout_ms: default_oracle_timeout(),
        }
    }
}

impl OracleSettings {
    /// Unknown provider names resolve to no oracle
    pub fn kind(&self) -> OracleKind {
        OracleKind::from_str(&self.provider).unwrap_or_else(|| {
            tracing::warn!(
                provider = %self.provider,
                "Unknown oracle provider, using fallback engines"
            );
            OracleKind::Unavailable
        })
    }

    pub fn http(&self) -> HttpOracleConfig {
        HttpOracleConfig {
            base_url: self.url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSettings {
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// How often expired entries are swept; 0 disables the sweep
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            purge_interval_secs: default_purge_interval(),
        }
    }
}

/// Data store backing agent lookups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// JSON fixture file loaded into the in-memory store
    #[serde(default)]
    pub fixtures: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_fraud_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_query_timeout() -> u64 {
    3_000
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_grace_period() -> u64 {
    5_000
}

fn default_inbox_capacity() -> usize {
    256
}

fn default_trace_max_entries() -> usize {
    512
}

fn default_enabled_roles() -> Vec<AgentRole> {
    AgentRole::ALL.to_vec()
}

fn default_oracle_provider() -> String {
    "none".to_string()
}

fn default_oracle_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_oracle_timeout() -> u64 {
    2_000
}

fn default_namespace() -> String {
    "neural".to_string()
}

fn default_purge_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_port() -> u16 {
    9100
}

// =============================================================================
// Loading
// =============================================================================

impl NodeConfig {
    /// Load configuration from files and the environment
    ///
    /// A configuration that fails to deserialize is logged and replaced by
    /// the defaults.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("NEURAL")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut node_config = match builder.build()?.try_deserialize::<NodeConfig>() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid configuration, using defaults");
                NodeConfig::default()
            }
        };
        node_config.apply_legacy_env(|key| std::env::var(key).ok());
        Ok(node_config)
    }

    /// Flat variables understood by earlier deployments
    ///
    /// They only fill values the layered sources left at their defaults.
    pub fn apply_legacy_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.agents.base_seed.is_none() {
            self.agents.base_seed = lookup("AGENT_SEED").filter(|s| !s.is_empty());
        }
        if self.agents.fraud_threshold == DEFAULT_THRESHOLD {
            let threshold = lookup("FRAUD_DETECTION_THRESHOLD").and_then(|v| v.parse::<f64>().ok());
            if let Some(threshold) = threshold {
                self.agents.fraud_threshold = threshold.clamp(0.0, 1.0);
            }
        }
        if self.oracle.provider == default_oracle_provider() {
            if let Some(provider) = lookup("NEURAL_ORACLE_PROVIDER") {
                self.oracle.provider = provider;
            }
        }
        if self.oracle.url == default_oracle_url() {
            if let Some(url) = lookup("NEURAL_ORACLE_URL") {
                self.oracle.url = url;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.agents.fraud_threshold, 0.75);
        assert_eq!(config.agents.enabled.len(), 5);
        assert_eq!(config.agents.query_timeout(), Duration::from_secs(3));
        assert_eq!(config.oracle.kind(), OracleKind::Unavailable);
        assert_eq!(config.bus.namespace, "neural");
        assert!(!config.metrics.enabled);

        let manager = config.agents.manager();
        assert_eq!(manager.request_timeout, Duration::from_secs(30));
        assert_eq!(manager.runtime.inbox_capacity, 256);
        assert_eq!(manager.runtime.trace_max_entries, Some(512));
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: NodeConfig = serde_json::from_value(serde_json::json!({
            "agents": {
                "fraud_threshold": 0.9,
                "enabled": ["compliance", "fraud"],
                "trace_max_entries": 0
            },
            "oracle": {"provider": "rules"}
        }))
        .unwrap();

        assert_eq!(config.agents.fraud_threshold, 0.9);
        assert_eq!(config.agents.enabled, vec![AgentRole::Compliance, AgentRole::Fraud]);
        assert_eq!(config.agents.grace_period_ms, 5_000);
        assert_eq!(config.agents.manager().runtime.trace_max_entries, None);
        assert_eq!(config.oracle.kind(), OracleKind::Rules);
        assert_eq!(config.oracle.timeout_ms, 2_000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_fleet_settings_carry_seeds() {
        let mut config = NodeConfig::default();
        config.agents.base_seed = Some("prod".to_string());
        config.agents.seeds.insert(AgentRole::Fraud, "fraud-custom".to_string());

        let fleet = config.agents.fleet();
        assert_eq!(fleet.seeds[&AgentRole::Fraud], "fraud-custom");
        assert_eq!(fleet.base_seed.as_deref(), Some("prod"));
    }

    #[test]
    fn test_legacy_env_fills_defaults_only() {
        let mut config = NodeConfig::default();
        config.apply_legacy_env(env(&[
            ("AGENT_SEED", "fleet"),
            ("FRAUD_DETECTION_THRESHOLD", "0.6"),
            ("NEURAL_ORACLE_PROVIDER", "http"),
        ]));
        assert_eq!(config.agents.base_seed.as_deref(), Some("fleet"));
        assert_eq!(config.agents.fraud_threshold, 0.6);
        assert_eq!(config.oracle.kind(), OracleKind::Http);

        let mut config = NodeConfig::default();
        config.agents.base_seed = Some("configured".to_string());
        config.agents.fraud_threshold = 0.8;
        config.apply_legacy_env(env(&[
            ("AGENT_SEED", "fleet"),
            ("FRAUD_DETECTION_THRESHOLD", "abc"),
        ]));
        assert_eq!(config.agents.base_seed.as_deref(), Some("configured"));
        assert_eq!(config.agents.fraud_threshold, 0.8);
    }

    #[test]
    fn test_unknown_provider_falls_back() {
        let settings = OracleSettings {
            provider: "quantum".to_string(),
            ..OracleSettings::default()
        };
        assert_eq!(settings.kind(), OracleKind::Unavailable);
    }
}
