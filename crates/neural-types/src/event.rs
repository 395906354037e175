//! Event bus records
//!
//! Events are published on topics named `"<namespace>:<event_type>"`.
//! Delivery is fire-and-forget: no acknowledgment, no replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "neural";

/// Well-known event types
pub mod event_types {
    pub const TRANSACTION_CREATED: &str = "transaction.created";
    pub const TRANSACTION_COMPLETED: &str = "transaction.completed";
    pub const MERCHANT_SIGNUP: &str = "merchant.signup";
    pub const MERCHANT_MILESTONE: &str = "merchant.milestone";
    pub const PAYMENT_SCHEDULED: &str = "payment.scheduled";
    pub const LIQUIDITY_LOW: &str = "liquidity.low";
    pub const COMPLIANCE_HIGH_RISK: &str = "compliance.high_risk";
    pub const FRAUD_DETECTED: &str = "fraud.detected";
    pub const TREASURY_OPTIMIZATION_NEEDED: &str = "treasury.optimization_needed";
}

/// Build the topic for an event type
pub fn topic(namespace: &str, event_type: &str) -> String {
    format!("{}:{}", namespace, event_type)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Name of the publishing agent
    pub agent: String,
    pub event_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(agent: impl Into<String>, event_type: impl Into<String>, data: Value) -> Self {
        Self {
            agent: agent.into(),
            event_type: event_type.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn topic(&self, namespace: &str) -> String {
        topic(namespace, &self.event_type)
    }
}
