//! Per-agent request payloads
//!
//! At the protocol boundary every message type has a typed payload. Free-form
//! maps remain only where the content is genuinely open-ended (entity data for
//! compliance checks, consultation context, support context).

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{ProtocolError, Result};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_priority() -> u8 {
    crate::message::DEFAULT_PRIORITY
}

// ============================================================================
// Compliance
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheckRequest {
    /// `transaction` or `merchant`
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: String,
    /// e.g. `aml`, `kyc`, `sanctions`
    #[serde(default)]
    pub check_types: Vec<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

/// Facts about a transaction under compliance review.
///
/// Fields absent from the payload are looked up through the data store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionFacts {
    pub transaction_id: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount_commitment: Option<String>,
    pub estimated_amount: Option<f64>,
    pub country: Option<String>,
    pub kyc_status: Option<String>,
    pub tx_count_24h: Option<u32>,
    /// Most recent first
    pub recent_amounts: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MerchantFacts {
    pub merchant_id: Option<String>,
}

// ============================================================================
// Fraud
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionPattern {
    pub new_device: bool,
    pub new_location: bool,
    pub unusual_time: bool,
}

/// Caller-supplied history, overriding store lookups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudHistory {
    pub avg_amount: Option<f64>,
    pub tx_count_24h: Option<u32>,
    pub minutes_since_last_tx: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAnalysisRequest {
    pub transaction_id: String,
    pub user_id: String,
    #[serde(default)]
    pub amount_commitment: Option<String>,
    #[serde(default)]
    pub estimated_amount: Option<f64>,
    #[serde(default)]
    pub transaction_pattern: TransactionPattern,
    #[serde(default)]
    pub historical_data: Option<FraudHistory>,
    /// UTC hour of the transaction; defaults to the current hour
    #[serde(default)]
    pub hour: Option<u32>,
    #[serde(default = "default_true")]
    pub real_time: bool,
}

fn default_true() -> bool {
    true
}

impl FraudAnalysisRequest {
    pub fn new(transaction_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            amount_commitment: None,
            estimated_amount: None,
            transaction_pattern: TransactionPattern::default(),
            historical_data: None,
            hour: None,
            real_time: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FalsePositiveReport {
    pub transaction_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

// ============================================================================
// Treasury
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingGoal {
    Speed,
    Cost,
    #[default]
    #[serde(other)]
    Balance,
}

impl RoutingGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Cost => "cost",
            Self::Balance => "balance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPayment {
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default = "default_urgency")]
    pub urgency: u8,
}

fn default_urgency() -> u8 {
    5
}

impl PendingPayment {
    pub fn new(amount: f64, urgency: u8) -> Self {
        Self {
            payment_id: None,
            amount,
            urgency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasuryOptimizationRequest {
    pub merchant_id: String,
    /// Balances by bucket; the `available` bucket is the liquid balance
    #[serde(default)]
    pub current_liquidity: BTreeMap<String, f64>,
    #[serde(default)]
    pub upcoming_payments: Vec<PendingPayment>,
    #[serde(default = "default_time_horizon")]
    pub time_horizon: String,
    #[serde(default)]
    pub optimization_goal: RoutingGoal,
}

fn default_time_horizon() -> String {
    "7d".to_string()
}

/// Size a liquidity allocation after consulting compliance and fraud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityAllocationRequest {
    pub merchant_id: String,
    pub transaction_id: String,
    pub user_id: String,
    pub amount: f64,
    /// Defaults to `amount`
    #[serde(default)]
    pub base_allocation: Option<f64>,
    /// Forwarded to the compliance agent as `transaction_data`
    #[serde(default)]
    pub transaction_data: Map<String, Value>,
}

// ============================================================================
// Growth
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MerchantMetrics {
    pub transactions: u64,
    pub revenue: f64,
    pub customers: u64,
    pub previous_revenue: f64,
    pub days_since_last_transaction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthGoal {
    IncreaseRevenue,
    ReduceChurn,
    ImproveConversion,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthSuggestionRequest {
    pub merchant_id: String,
    #[serde(default)]
    pub metrics: MerchantMetrics,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_goals")]
    pub goals: Vec<GrowthGoal>,
}

fn default_timeframe() -> String {
    "30d".to_string()
}

fn default_goals() -> Vec<GrowthGoal> {
    vec![GrowthGoal::IncreaseRevenue]
}

// ============================================================================
// Support
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportQueryRequest {
    #[serde(default = "new_id")]
    pub query_id: String,
    pub user_id: String,
    pub query_text: String,
    #[serde(default)]
    pub query_type: Option<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub urgency: Urgency,
}

/// Chat message from a conversational client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message: String,
    pub user_id: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Reply to a [`ChatMessage`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAcknowledgement {
    pub message: String,
    pub confidence: f64,
    #[serde(default)]
    pub sources: Vec<String>,
}

// ============================================================================
// Tagged union
// ============================================================================

/// Every request the fleet understands, tagged by its message type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", content = "payload", rename_all = "snake_case")]
pub enum AgentRequest {
    ComplianceCheck(ComplianceCheckRequest),
    FraudAnalysis(FraudAnalysisRequest),
    ReportFalsePositive(FalsePositiveReport),
    TreasuryOptimization(TreasuryOptimizationRequest),
    LiquidityAllocation(LiquidityAllocationRequest),
    GrowthSuggestion(GrowthSuggestionRequest),
    SupportQuery(SupportQueryRequest),
    ChatMessage(ChatMessage),
}

impl AgentRequest {
    pub const MESSAGE_TYPES: [&'static str; 8] = [
        "compliance_check",
        "fraud_analysis",
        "report_false_positive",
        "treasury_optimization",
        "liquidity_allocation",
        "growth_suggestion",
        "support_query",
        "chat_message",
    ];

    /// Decode a `(message_type, payload)` pair
    pub fn parse(message_type: &str, payload: Value) -> Result<Self> {
        if !Self::MESSAGE_TYPES.contains(&message_type) {
            return Err(ProtocolError::UnknownMessageType {
                message_type: message_type.to_string(),
            });
        }
        serde_json::from_value(json!({
            "message_type": message_type,
            "payload": payload,
        }))
        .map_err(|e| ProtocolError::InvalidPayload {
            message_type: message_type.to_string(),
            message: e.to_string(),
        })
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            Self::ComplianceCheck(_) => "compliance_check",
            Self::FraudAnalysis(_) => "fraud_analysis",
            Self::ReportFalsePositive(_) => "report_false_positive",
            Self::TreasuryOptimization(_) => "treasury_optimization",
            Self::LiquidityAllocation(_) => "liquidity_allocation",
            Self::GrowthSuggestion(_) => "growth_suggestion",
            Self::SupportQuery(_) => "support_query",
            Self::ChatMessage(_) => "chat_message",
        }
    }

    /// Split back into the untagged payload
    pub fn into_payload(self) -> Result<Value> {
        let value = match self {
            Self::ComplianceCheck(r) => serde_json::to_value(r)?,
            Self::FraudAnalysis(r) => serde_json::to_value(r)?,
            Self::ReportFalsePositive(r) => serde_json::to_value(r)?,
            Self::TreasuryOptimization(r) => serde_json::to_value(r)?,
            Self::LiquidityAllocation(r) => serde_json::to_value(r)?,
            Self::GrowthSuggestion(r) => serde_json::to_value(r)?,
            Self::SupportQuery(r) => serde_json::to_value(r)?,
            Self::ChatMessage(r) => serde_json::to_value(r)?,
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_message_type() {
        let request = AgentRequest::parse(
            "treasury_optimization",
            json!({
                "merchant_id": "m-1",
                "current_liquidity": {"available": 100.0, "reserved": 900.0},
                "upcoming_payments": [{"amount": 10.0, "urgency": 5}],
                "optimization_goal": "cost"
            }),
        )
        .unwrap();

        match request {
            AgentRequest::TreasuryOptimization(r) => {
                assert_eq!(r.optimization_goal, RoutingGoal::Cost);
                assert_eq!(r.time_horizon, "7d");
                assert_eq!(r.upcoming_payments.len(), 1);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_message_type() {
        let err = AgentRequest::parse("teleport", json!({})).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageType { .. }));
    }

    #[test]
    fn test_parse_invalid_payload() {
        let err = AgentRequest::parse("fraud_analysis", json!({"user_id": "u"})).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));
    }

    #[test]
    fn test_unknown_goal_falls_back_to_balance() {
        let goal: RoutingGoal = serde_json::from_value(json!("cheapest")).unwrap();
        assert_eq!(goal, RoutingGoal::Balance);
    }

    #[test]
    fn test_growth_defaults() {
        let request: GrowthSuggestionRequest =
            serde_json::from_value(json!({"merchant_id": "m-1"})).unwrap();
        assert_eq!(request.goals, vec![GrowthGoal::IncreaseRevenue]);
        assert_eq!(request.timeframe, "30d");
        assert_eq!(request.metrics.revenue, 0.0);
    }

    #[test]
    fn test_message_type_matches_tag() {
        let request = AgentRequest::ReportFalsePositive(FalsePositiveReport {
            transaction_id: "tx-1".into(),
            reason: None,
        });
        assert_eq!(request.message_type(), "report_false_positive");
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["message_type"], "report_false_positive");
        assert_eq!(encoded["payload"]["transaction_id"], "tx-1");
    }
}
