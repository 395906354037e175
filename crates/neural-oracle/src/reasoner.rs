//! Reasoner - typed judgments with deterministic fallback

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use neural_rules::compliance::{self, ComplianceAction, KycStatus};
use neural_rules::fraud::{self, FraudAction, FraudSignals, FraudType};
use neural_rules::treasury::{self, Lane};
use neural_rules::growth;
use neural_types::{clamp_unit, RoutingGoal};

use crate::providers::*;
use crate::types::*;

/// Merchant type reported to the oracle for liquidity checks
const DEFAULT_MERCHANT_TYPE: &str = "merchant";

/// Wraps a [`KnowledgeOracle`] and falls back to the rule engines
///
/// Callers always go through the typed methods. A failed or malformed oracle
/// answer is logged, counted, and replaced by the deterministic fallback; it
/// never reaches the caller.
pub struct Reasoner {
    oracle: Arc<dyn KnowledgeOracle>,
    kind: OracleKind,
    fallbacks: AtomicU64,
}

impl Reasoner {
    /// Create a reasoner over a specific oracle
    pub fn new(oracle: Arc<dyn KnowledgeOracle>) -> Self {
        let kind = oracle.kind();
        Self {
            oracle,
            kind,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Create a reasoner from environment variables
    ///
    /// Reads `NEURAL_ORACLE_PROVIDER` to select the oracle:
    /// - `none` (default): no oracle, fallback engines only
    /// - `rules`: local deterministic rule oracle
    /// - `http`: remote engine at `NEURAL_ORACLE_URL`
    pub fn from_env() -> Self {
        // Try to load .env file (ignore errors)
        let _ = dotenvy::dotenv();

        let provider_name =
            std::env::var("NEURAL_ORACLE_PROVIDER").unwrap_or_else(|_| "none".to_string());

        let kind = OracleKind::from_str(&provider_name).unwrap_or_else(|| {
            tracing::warn!(
                provider = %provider_name,
                "Unknown oracle provider, using fallback engines"
            );
            OracleKind::Unavailable
        });

        Self::from_kind(kind)
    }

    /// Create a reasoner for a specific oracle kind
    pub fn from_kind(kind: OracleKind) -> Self {
        let oracle: Arc<dyn KnowledgeOracle> = match kind {
            OracleKind::Unavailable => Arc::new(UnavailableOracle),
            OracleKind::Rules => Arc::new(RuleOracle::new()),
            OracleKind::Http => Arc::new(HttpOracle::from_env()),
        };
        Self::new(oracle)
    }

    /// Reasoner with no oracle at all
    pub fn fallback_only() -> Self {
        Self::new(Arc::new(UnavailableOracle))
    }

    pub fn kind(&self) -> OracleKind {
        self.kind
    }

    pub fn oracle_name(&self) -> &'static str {
        self.oracle.name()
    }

    pub async fn is_available(&self) -> bool {
        self.oracle.is_available().await
    }

    /// Number of judgments answered by the fallback engines
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Ask the oracle; `None` means the caller must use its fallback
    async fn consult<T>(
        &self,
        query: OracleQuery,
        extract: impl FnOnce(OracleAnswer) -> Result<T>,
    ) -> Option<T> {
        let name = query.name();
        match self.oracle.evaluate(&query).await.and_then(extract) {
            Ok(value) => Some(value),
            Err(e) => {
                match &e {
                    OracleError::Unavailable { .. } | OracleError::Unsupported { .. } => {
                        tracing::debug!(query = name, oracle = %self.kind, "{}, using fallback", e);
                    }
                    _ => {
                        tracing::warn!(
                            query = name,
                            oracle = %self.kind,
                            "Oracle query failed: {}, using fallback",
                            e
                        );
                    }
                }
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("neural_oracle_fallbacks_total", "query" => name).increment(1);
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Compliance
    // ------------------------------------------------------------------------

    pub async fn compliance_risk(
        &self,
        kyc: KycStatus,
        amount: f64,
        tx_count_24h: u32,
        country: &str,
    ) -> f64 {
        let query = OracleQuery::ComplianceRisk {
            kyc_status: kyc.as_str().to_string(),
            amount,
            tx_count_24h,
            country: country.to_string(),
        };
        let score = self
            .consult(query, |a| a.into_score("compliance_risk"))
            .await
            .unwrap_or_else(|| compliance::risk_score(kyc, amount, tx_count_24h, country));
        clamp_unit(score)
    }

    pub async fn required_action(&self, risk_score: f64) -> ComplianceAction {
        self.consult(OracleQuery::RequiredAction { risk_score }, |a| {
            let label = a.into_label("required_action")?;
            label.parse::<ComplianceAction>().map_err(|_| OracleError::InvalidResponse {
                message: format!("unknown compliance action: {}", label),
            })
        })
        .await
        .unwrap_or_else(|| ComplianceAction::from_score(risk_score))
    }

    pub async fn kyc_compliant(&self, kyc: KycStatus, amount: f64) -> bool {
        let query = OracleQuery::KycCompliant {
            kyc_status: kyc.as_str().to_string(),
            amount,
        };
        self.consult(query, |a| a.into_flag("kyc_compliant"))
            .await
            .unwrap_or_else(|| compliance::kyc_compliant(kyc, amount))
    }

    // ------------------------------------------------------------------------
    // Fraud
    // ------------------------------------------------------------------------

    /// Rule-side fraud probability, before the model ensemble
    pub async fn fraud_rule_score(&self, signals: &FraudSignals) -> f64 {
        let query = OracleQuery::FraudProbability {
            amount: signals.amount,
            tx_count_24h: signals.tx_count_24h,
            hour: signals.hour,
            new_device: signals.new_device,
            avg_amount: signals.avg_amount,
        };
        let score = self
            .consult(query, |a| a.into_score("fraud_probability"))
            .await
            .unwrap_or_else(|| fraud::rule_score(signals));
        clamp_unit(score)
    }

    /// Fraud type label; `None` below probability 0.5
    pub async fn classify_fraud(&self, signals: &FraudSignals, probability: f64) -> Option<String> {
        if probability < 0.5 {
            return None;
        }
        let query = OracleQuery::ClassifyFraudType {
            tx_count_24h: signals.tx_count_24h,
            minutes_since_last_tx: signals.minutes_since_last_tx,
            new_device: signals.new_device,
            amount: signals.amount,
            avg_amount: signals.avg_amount,
        };
        let label = self
            .consult(query, |a| a.into_label("classify_fraud_type"))
            .await
            .unwrap_or_else(|| FraudType::classify(signals).as_str().to_string());
        Some(label)
    }

    pub async fn fraud_action(&self, probability: f64) -> FraudAction {
        self.consult(OracleQuery::FraudAction { probability }, |a| {
            let label = a.into_label("fraud_action")?;
            label.parse::<FraudAction>().map_err(|_| OracleError::InvalidResponse {
                message: format!("unknown fraud action: {}", label),
            })
        })
        .await
        .unwrap_or_else(|| FraudAction::from_probability(probability))
    }

    // ------------------------------------------------------------------------
    // Treasury
    // ------------------------------------------------------------------------

    /// Lane for one payment. The oracle answer is goal-agnostic; an
    /// unrecognized label falls back to the goal-aware rule.
    pub async fn recommend_lane(&self, amount: f64, urgency: u8, goal: RoutingGoal) -> Lane {
        self.consult(OracleQuery::RecommendRouting { amount, urgency }, |a| {
            let label = a.into_label("recommend_routing")?;
            Lane::from_label(&label).ok_or(OracleError::InvalidResponse {
                message: format!("unknown routing label: {}", label),
            })
        })
        .await
        .unwrap_or_else(|| treasury::fallback_lane(amount, urgency, goal))
    }

    /// Oracle liquidity verdict; only consulted for a positive total balance
    pub async fn liquidity_healthy(&self, liquid_balance: f64, total_balance: f64) -> bool {
        if total_balance <= 0.0 {
            return false;
        }
        let query = OracleQuery::LiquidityHealthy {
            merchant_type: DEFAULT_MERCHANT_TYPE.to_string(),
            liquid_balance,
            total_balance,
        };
        self.consult(query, |a| a.into_flag("liquidity_healthy"))
            .await
            .unwrap_or_else(|| treasury::liquidity_healthy(liquid_balance, total_balance))
    }

    // ------------------------------------------------------------------------
    // Growth
    // ------------------------------------------------------------------------

    /// Only consulted when there is a previous period to compare with
    pub async fn healthy_growth(&self, revenue: f64, previous_revenue: f64) -> bool {
        if previous_revenue <= 0.0 {
            return false;
        }
        let query = OracleQuery::HealthyGrowth {
            revenue,
            previous_revenue,
        };
        self.consult(query, |a| a.into_flag("healthy_growth"))
            .await
            .unwrap_or_else(|| growth::healthy_growth(revenue, previous_revenue))
    }

    pub async fn churn_risk(&self, days_since_last_tx: f64, avg_frequency_days: f64) -> f64 {
        let query = OracleQuery::ChurnRisk {
            days_since_last_tx,
            avg_frequency_days,
        };
        let risk = self
            .consult(query, |a| a.into_score("churn_risk"))
            .await
            .unwrap_or_else(|| growth::churn_risk(days_since_last_tx, avg_frequency_days));
        clamp_unit(risk)
    }
}

impl Default for Reasoner {
    fn default() -> Self {
        Self::from_env()
    }
}

impl std::fmt::Debug for Reasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reasoner")
            .field("oracle", &self.oracle.name())
            .field("kind", &self.kind)
            .field("fallbacks", &self.fallback_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fallback_only_counts_every_judgment() {
        let reasoner = Reasoner::fallback_only();

        let risk = reasoner
            .compliance_risk(KycStatus::Verified, 100.0, 1, "US")
            .await;
        assert_eq!(risk, compliance::risk_score(KycStatus::Verified, 100.0, 1, "US"));
        assert_eq!(reasoner.required_action(risk).await, ComplianceAction::Approve);
        assert_eq!(reasoner.fallback_count(), 2);
    }

    #[tokio::test]
    async fn test_guarded_judgments_skip_the_oracle() {
        let reasoner = Reasoner::fallback_only();
        assert!(!reasoner.liquidity_healthy(0.0, 0.0).await);
        assert!(!reasoner.healthy_growth(100.0, 0.0).await);
        let signals = FraudSignals {
            amount: 10.0,
            avg_amount: 10.0,
            tx_count_24h: 0,
            hour: 12,
            new_device: false,
            new_location: false,
            minutes_since_last_tx: 60.0,
        };
        assert_eq!(reasoner.classify_fraud(&signals, 0.2).await, None);
        assert_eq!(reasoner.fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_rules_kind_needs_no_fallback() {
        let reasoner = Reasoner::from_kind(OracleKind::Rules);
        assert_eq!(reasoner.kind(), OracleKind::Rules);
        assert!(reasoner.kyc_compliant(KycStatus::Verified, 100.0).await);
        assert_eq!(reasoner.fraud_action(0.9).await, FraudAction::Block);
        assert_eq!(reasoner.fallback_count(), 0);
    }
}
