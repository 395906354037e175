//! Knowledge oracle implementations

use async_trait::async_trait;
use neural_rules::compliance::{self, ComplianceAction, KycStatus};
use neural_rules::fraud::{self, FraudAction, FraudSignals, FraudType};
use neural_rules::{growth, treasury};
use serde::Deserialize;
use std::time::Duration;

use crate::types::*;

/// Capability interface to an external reasoning engine
#[async_trait]
pub trait KnowledgeOracle: Send + Sync {
    /// Get the oracle name
    fn name(&self) -> &'static str;

    /// Get the oracle kind
    fn kind(&self) -> OracleKind;

    /// Check if the oracle can currently answer
    async fn is_available(&self) -> bool;

    /// Evaluate one named judgment
    async fn evaluate(&self, query: &OracleQuery) -> Result<OracleAnswer>;
}

// ============================================================================
// Unavailable Oracle
// ============================================================================

/// Placeholder used when no oracle is configured. Every call fails fast.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableOracle;

#[async_trait]
impl KnowledgeOracle for UnavailableOracle {
    fn name(&self) -> &'static str {
        "Unavailable"
    }

    fn kind(&self) -> OracleKind {
        OracleKind::Unavailable
    }

    async fn is_available(&self) -> bool {
        false
    }

    async fn evaluate(&self, _query: &OracleQuery) -> Result<OracleAnswer> {
        Err(OracleError::Unavailable {
            oracle: "none configured".to_string(),
        })
    }
}

// ============================================================================
// HTTP Oracle
// ============================================================================

/// Configuration for the HTTP oracle
#[derive(Debug, Clone)]
pub struct HttpOracleConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpOracleConfig {
    fn default() -> Self {
        let timeout_ms = std::env::var("NEURAL_ORACLE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2_000);
        Self {
            base_url: std::env::var("NEURAL_ORACLE_URL")
                .unwrap_or_else(|_| "http://localhost:8090".to_string()),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

/// Remote reasoning engine reached over HTTP
///
/// Queries are POSTed as JSON to `{base_url}/query` and answered with
/// `{"answer": <bool | number | string>}`.
pub struct HttpOracle {
    config: HttpOracleConfig,
    client: reqwest::Client,
}

impl HttpOracle {
    pub fn new(config: HttpOracleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn from_env() -> Self {
        Self::new(HttpOracleConfig::default())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

#[derive(Deserialize)]
struct HttpOracleResponse {
    answer: OracleAnswer,
}

#[async_trait]
impl KnowledgeOracle for HttpOracle {
    fn name(&self) -> &'static str {
        "Http"
    }

    fn kind(&self) -> OracleKind {
        OracleKind::Http
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);
        matches!(self.client.get(&url).send().await, Ok(r) if r.status().is_success())
    }

    async fn evaluate(&self, query: &OracleQuery) -> Result<OracleAnswer> {
        let url = format!("{}/query", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .json(query)
            .send()
            .await
            .map_err(|e| OracleError::RequestFailed {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(OracleError::RequestFailed {
                message: format!("HTTP {}", response.status()),
            });
        }

        let body: HttpOracleResponse =
            response
                .json()
                .await
                .map_err(|e| OracleError::InvalidResponse {
                    message: e.to_string(),
                })?;

        Ok(body.answer)
    }
}

// ============================================================================
// Rule Oracle (Deterministic)
// ============================================================================

/// Local oracle answering every query with the deterministic rule engines
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleOracle;

impl RuleOracle {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl KnowledgeOracle for RuleOracle {
    fn name(&self) -> &'static str {
        "Rules"
    }

    fn kind(&self) -> OracleKind {
        OracleKind::Rules
    }

    async fn is_available(&self) -> bool {
        true // Always available
    }

    async fn evaluate(&self, query: &OracleQuery) -> Result<OracleAnswer> {
        let answer = match query {
            OracleQuery::ComplianceRisk {
                kyc_status,
                amount,
                tx_count_24h,
                country,
            } => OracleAnswer::Score(compliance::risk_score(
                KycStatus::parse(kyc_status),
                *amount,
                *tx_count_24h,
                country,
            )),
            OracleQuery::RequiredAction { risk_score } => {
                OracleAnswer::Label(ComplianceAction::from_score(*risk_score).as_str().to_string())
            }
            OracleQuery::KycCompliant { kyc_status, amount } => OracleAnswer::Flag(
                compliance::kyc_compliant(KycStatus::parse(kyc_status), *amount),
            ),
            OracleQuery::FraudProbability {
                amount,
                tx_count_24h,
                hour,
                new_device,
                avg_amount,
            } => OracleAnswer::Score(fraud::rule_score(&FraudSignals {
                amount: *amount,
                avg_amount: *avg_amount,
                tx_count_24h: *tx_count_24h,
                hour: *hour,
                new_device: *new_device,
                new_location: false,
                minutes_since_last_tx: fraud::DEFAULT_MINUTES_SINCE_LAST_TX,
            })),
            OracleQuery::ClassifyFraudType {
                tx_count_24h,
                minutes_since_last_tx,
                new_device,
                amount,
                avg_amount,
            } => {
                let signals = FraudSignals {
                    amount: *amount,
                    avg_amount: *avg_amount,
                    tx_count_24h: *tx_count_24h,
                    hour: 12,
                    new_device: *new_device,
                    new_location: false,
                    minutes_since_last_tx: *minutes_since_last_tx,
                };
                OracleAnswer::Label(FraudType::classify(&signals).as_str().to_string())
            }
            OracleQuery::FraudAction { probability } => {
                let action = FraudAction::from_probability(*probability);
                OracleAnswer::Label(action.as_str().to_string())
            }
            OracleQuery::RecommendRouting { .. } => {
                // Routing is goal-dependent; the caller's goal-aware fallback decides
                return Err(OracleError::Unsupported {
                    query: query.name(),
                    oracle: self.name().to_string(),
                });
            }
            OracleQuery::LiquidityHealthy {
                liquid_balance,
                total_balance,
                ..
            } => OracleAnswer::Flag(treasury::liquidity_healthy(*liquid_balance, *total_balance)),
            OracleQuery::HealthyGrowth {
                revenue,
                previous_revenue,
            } => OracleAnswer::Flag(growth::healthy_growth(*revenue, *previous_revenue)),
            OracleQuery::ChurnRisk {
                days_since_last_tx,
                avg_frequency_days,
            } => OracleAnswer::Score(growth::churn_risk(*days_since_last_tx, *avg_frequency_days)),
        };
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_oracle_fails_fast() {
        let oracle = UnavailableOracle;
        assert!(!oracle.is_available().await);
        let result = oracle
            .evaluate(&OracleQuery::FraudAction { probability: 0.9 })
            .await;
        assert!(matches!(result, Err(OracleError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_rule_oracle_answers() {
        let oracle = RuleOracle::new();
        let risk = oracle
            .evaluate(&OracleQuery::ComplianceRisk {
                kyc_status: "not_verified".into(),
                amount: 15_000.0,
                tx_count_24h: 60,
                country: "KP".into(),
            })
            .await
            .unwrap();
        assert!(matches!(risk, OracleAnswer::Score(s) if (s - 0.85).abs() < 1e-9));

        let action = oracle
            .evaluate(&OracleQuery::FraudAction { probability: 0.7 })
            .await
            .unwrap();
        assert_eq!(action, OracleAnswer::Label("challenge".into()));
    }

    #[tokio::test]
    async fn test_rule_oracle_defers_routing() {
        let result = RuleOracle
            .evaluate(&OracleQuery::RecommendRouting {
                amount: 10.0,
                urgency: 5,
            })
            .await;
        assert!(matches!(result, Err(OracleError::Unsupported { .. })));
    }
}
