//! Inter-agent query protocol
//!
//! A requester sends a typed query to one agent and waits for the correlated
//! answer. Answers always exist: when the responder faults or the query times
//! out, a neutral, zero-confidence answer is substituted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::clamp_unit;

/// Neutral score used whenever an assessment could not be computed
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Ask an agent for the risk of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScoreQuery {
    pub query_id: String,
    /// `transaction` or `merchant`
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl RiskScoreQuery {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            query_id: Uuid::new_v4().to_string(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScoreResponse {
    pub query_id: String,
    pub entity_id: String,
    pub risk_score: f64,
    pub risk_level: String,
    #[serde(default)]
    pub factors: Vec<String>,
    pub confidence: f64,
    pub responding_agent: String,
    pub timestamp: DateTime<Utc>,
}

impl RiskScoreResponse {
    pub fn new(
        query: &RiskScoreQuery,
        responding_agent: impl Into<String>,
        risk_score: f64,
        risk_level: impl Into<String>,
        factors: Vec<String>,
        confidence: f64,
    ) -> Self {
        Self {
            query_id: query.query_id.clone(),
            entity_id: query.entity_id.clone(),
            risk_score: clamp_unit(risk_score),
            risk_level: risk_level.into(),
            factors,
            confidence: clamp_unit(confidence),
            responding_agent: responding_agent.into(),
            timestamp: Utc::now(),
        }
    }

    /// Neutral answer used for faults, timeouts and unknown entities
    pub fn neutral(
        query: &RiskScoreQuery,
        responding_agent: impl Into<String>,
        risk_level: impl Into<String>,
        factor: impl Into<String>,
    ) -> Self {
        Self::new(
            query,
            responding_agent,
            NEUTRAL_SCORE,
            risk_level,
            vec![factor.into()],
            0.0,
        )
    }

    pub fn is_degraded(&self) -> bool {
        self.confidence == 0.0
    }
}

/// Ask the fraud agent for a transaction's fraud probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudScoreQuery {
    pub query_id: String,
    pub transaction_id: String,
    pub user_id: String,
    #[serde(default = "default_true")]
    pub include_factors: bool,
    #[serde(default)]
    pub context: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl FraudScoreQuery {
    pub fn new(transaction_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            query_id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            include_factors: true,
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// One contribution to a fraud score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudFactor {
    pub factor: String,
    pub weight: f64,
    pub description: String,
}

impl FraudFactor {
    pub fn new(factor: impl Into<String>, weight: f64, description: impl Into<String>) -> Self {
        Self {
            factor: factor.into(),
            weight,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudScoreResponse {
    pub query_id: String,
    pub transaction_id: String,
    pub fraud_probability: f64,
    #[serde(default)]
    pub fraud_type: Option<String>,
    #[serde(default)]
    pub factors: Vec<FraudFactor>,
    pub recommendation: String,
    pub confidence: f64,
    pub responding_agent: String,
    pub timestamp: DateTime<Utc>,
}

impl FraudScoreResponse {
    /// Neutral answer used for faults and timeouts
    pub fn neutral(
        query: &FraudScoreQuery,
        responding_agent: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let factors = if query.include_factors {
            vec![FraudFactor::new("error", 0.0, reason)]
        } else {
            Vec::new()
        };
        Self {
            query_id: query.query_id.clone(),
            transaction_id: query.transaction_id.clone(),
            fraud_probability: NEUTRAL_SCORE,
            fraud_type: Some("unknown".to_string()),
            factors,
            recommendation: "review".to_string(),
            confidence: 0.0,
            responding_agent: responding_agent.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.confidence == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_risk_response_clamps_scores() {
        let query = RiskScoreQuery::new("transaction", "tx-1");
        let response =
            RiskScoreResponse::new(&query, "ComplianceAgent", 1.7, "critical", vec![], 2.0);
        assert_eq!(response.risk_score, 1.0);
        assert_eq!(response.confidence, 1.0);
        assert_eq!(response.query_id, query.query_id);
    }

    #[test]
    fn test_neutral_risk_response() {
        let query = RiskScoreQuery::new("merchant", "m-1").with_context("merchant_data", json!({}));
        let response =
            RiskScoreResponse::neutral(&query, "ComplianceAgent", "error", "Error: boom");
        assert_eq!(response.risk_score, NEUTRAL_SCORE);
        assert_eq!(response.risk_level, "error");
        assert_eq!(response.factors, vec!["Error: boom".to_string()]);
        assert!(response.is_degraded());
    }

    #[test]
    fn test_neutral_fraud_response_respects_include_factors() {
        let mut query = FraudScoreQuery::new("tx-9", "user-1");
        let with = FraudScoreResponse::neutral(&query, "FraudAgent", "timeout");
        assert_eq!(with.factors.len(), 1);
        assert_eq!(with.recommendation, "review");

        query.include_factors = false;
        let without = FraudScoreResponse::neutral(&query, "FraudAgent", "timeout");
        assert!(without.factors.is_empty());
        assert_eq!(without.fraud_type.as_deref(), Some("unknown"));
    }
}
