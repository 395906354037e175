//! Common types for knowledge oracle interactions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while consulting an oracle
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Oracle not available: {oracle}")]
    Unavailable { oracle: String },

    #[error("Request failed: {message}")]
    RequestFailed { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Query {query} expected a {expected} answer")]
    UnexpectedAnswer {
        query: &'static str,
        expected: &'static str,
    },

    #[error("Query {query} not supported by {oracle}")]
    Unsupported { query: &'static str, oracle: String },
}

pub type Result<T> = std::result::Result<T, OracleError>;

/// The fixed set of named judgments an oracle can be asked for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum OracleQuery {
    /// Score in `[0, 1]`
    ComplianceRisk {
        kyc_status: String,
        amount: f64,
        tx_count_24h: u32,
        country: String,
    },
    /// Label: approve, enhanced_monitoring, manual_review or block
    RequiredAction { risk_score: f64 },
    /// Flag
    KycCompliant { kyc_status: String, amount: f64 },
    /// Score in `[0, 1]`, before the model ensemble
    FraudProbability {
        amount: f64,
        tx_count_24h: u32,
        hour: u32,
        new_device: bool,
        avg_amount: f64,
    },
    /// Label naming the fraud type
    ClassifyFraudType {
        tx_count_24h: u32,
        minutes_since_last_tx: f64,
        new_device: bool,
        amount: f64,
        avg_amount: f64,
    },
    /// Label: approve, monitor, challenge or block
    FraudAction { probability: f64 },
    /// Label: `L1`/`standard` or `L2`/`fast`
    RecommendRouting { amount: f64, urgency: u8 },
    /// Flag
    LiquidityHealthy {
        merchant_type: String,
        liquid_balance: f64,
        total_balance: f64,
    },
    /// Flag
    HealthyGrowth { revenue: f64, previous_revenue: f64 },
    /// Score in `[0, 1]`
    ChurnRisk {
        days_since_last_tx: f64,
        avg_frequency_days: f64,
    },
}

impl OracleQuery {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ComplianceRisk { .. } => "compliance_risk",
            Self::RequiredAction { .. } => "required_action",
            Self::KycCompliant { .. } => "kyc_compliant",
            Self::FraudProbability { .. } => "fraud_probability",
            Self::ClassifyFraudType { .. } => "classify_fraud_type",
            Self::FraudAction { .. } => "fraud_action",
            Self::RecommendRouting { .. } => "recommend_routing",
            Self::LiquidityHealthy { .. } => "liquidity_healthy",
            Self::HealthyGrowth { .. } => "healthy_growth",
            Self::ChurnRisk { .. } => "churn_risk",
        }
    }
}

/// A scalar or categorical judgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OracleAnswer {
    Flag(bool),
    Score(f64),
    Label(String),
}

impl OracleAnswer {
    pub fn into_flag(self, query: &'static str) -> Result<bool> {
        match self {
            Self::Flag(flag) => Ok(flag),
            _ => Err(OracleError::UnexpectedAnswer {
                query,
                expected: "flag",
            }),
        }
    }

    /// Scores must be finite; they are clamped by the caller
    pub fn into_score(self, query: &'static str) -> Result<f64> {
        match self {
            Self::Score(score) if score.is_finite() => Ok(score),
            _ => Err(OracleError::UnexpectedAnswer {
                query,
                expected: "score",
            }),
        }
    }

    pub fn into_label(self, query: &'static str) -> Result<String> {
        match self {
            Self::Label(label) => Ok(label),
            _ => Err(OracleError::UnexpectedAnswer {
                query,
                expected: "label",
            }),
        }
    }
}

/// Oracle kind for routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleKind {
    /// No oracle configured; every judgment uses the fallback engines
    Unavailable,
    /// Local deterministic rule oracle
    Rules,
    /// Remote reasoning engine over HTTP
    Http,
}

impl OracleKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "unavailable" | "fallback" | "off" => Some(Self::Unavailable),
            "rules" | "deterministic" | "local" => Some(Self::Rules),
            "http" | "remote" => Some(Self::Http),
            _ => None,
        }
    }
}

impl std::fmt::Display for OracleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "none"),
            Self::Rules => write!(f, "rules"),
            Self::Http => write!(f, "http"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_wire_format() {
        let query = OracleQuery::RecommendRouting {
            amount: 10.0,
            urgency: 5,
        };
        let encoded = serde_json::to_value(&query).unwrap();
        assert_eq!(encoded["query"], "recommend_routing");
        assert_eq!(encoded["urgency"], 5);
        assert_eq!(query.name(), "recommend_routing");
    }

    #[test]
    fn test_untagged_answers() {
        assert_eq!(
            serde_json::from_value::<OracleAnswer>(json!(true)).unwrap(),
            OracleAnswer::Flag(true)
        );
        assert_eq!(
            serde_json::from_value::<OracleAnswer>(json!(0.3)).unwrap(),
            OracleAnswer::Score(0.3)
        );
        assert_eq!(
            serde_json::from_value::<OracleAnswer>(json!("L2")).unwrap(),
            OracleAnswer::Label("L2".into())
        );
    }

    #[test]
    fn test_answer_shape_mismatch() {
        let err = OracleAnswer::Label("block".into()).into_score("compliance_risk").unwrap_err();
        assert!(matches!(err, OracleError::UnexpectedAnswer { expected: "score", .. }));
        assert!(OracleAnswer::Score(f64::NAN).into_score("churn_risk").is_err());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(OracleKind::from_str("HTTP"), Some(OracleKind::Http));
        assert_eq!(OracleKind::from_str("none"), Some(OracleKind::Unavailable));
        assert_eq!(OracleKind::from_str("metta"), None);
        assert_eq!(OracleKind::Rules.to_string(), "rules");
    }
}
