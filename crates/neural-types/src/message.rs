//! Point-to-point message envelope

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ProtocolError, Result};

/// Default message priority (1 = lowest, 10 = highest)
pub const DEFAULT_PRIORITY: u8 = 5;

/// A message addressed to a single agent. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub message_id: String,
    pub sender: String,
    pub recipient: String,
    pub message_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_priority", deserialize_with = "deserialize_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

fn deserialize_priority<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    u8::deserialize(deserializer).map(clamp_priority)
}

fn clamp_priority(priority: u8) -> u8 {
    priority.clamp(1, 10)
}

impl AgentMessage {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        message_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            recipient: recipient.into(),
            message_type: message_type.into(),
            payload,
            timestamp: Utc::now(),
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Set the priority, clamped into 1..=10
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = clamp_priority(priority);
        self
    }

    /// Decode the payload into the typed request of this message type
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| ProtocolError::InvalidPayload {
            message_type: self.message_type.clone(),
            message: e.to_string(),
        })
    }
}

/// Exactly one response is produced for every handled message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
}

impl AgentResponse {
    pub fn success(
        request_id: impl Into<String>,
        agent_id: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            data: Some(data),
            error: None,
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        request_id: impl Into<String>,
        agent_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_ids_are_unique() {
        let a = AgentMessage::new("gateway", "compliance", "compliance_check", json!({}));
        let b = AgentMessage::new("gateway", "compliance", "compliance_check", json!({}));
        assert_ne!(a.message_id, b.message_id);
        assert_eq!(a.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_priority_is_clamped() {
        let msg = AgentMessage::new("a", "b", "t", json!({})).with_priority(42);
        assert_eq!(msg.priority, 10);
        let msg = AgentMessage::new("a", "b", "t", json!({})).with_priority(0);
        assert_eq!(msg.priority, 1);
    }

    #[test]
    fn test_decoded_priority_is_clamped() {
        let mut raw = serde_json::to_value(AgentMessage::new("a", "b", "t", json!({}))).unwrap();
        raw["priority"] = json!(200);
        let msg: AgentMessage = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(msg.priority, 10);

        raw["priority"] = json!(0);
        let msg: AgentMessage = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(msg.priority, 1);

        raw.as_object_mut().unwrap().remove("priority");
        let msg: AgentMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_payload_as_reports_message_type() {
        #[derive(Debug, Deserialize)]
        struct Needs {
            #[allow(dead_code)]
            field: u32,
        }

        let msg = AgentMessage::new("a", "b", "needs_field", json!({"other": 1}));
        let err = msg.payload_as::<Needs>().unwrap_err();
        assert!(err.to_string().contains("needs_field"));
    }

    #[test]
    fn test_failure_response_shape() {
        let response = AgentResponse::failure("req-1", "FraudAgent", "boom");
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("boom"));
        assert!(response.data.is_none());

        let encoded = serde_json::to_value(&response).unwrap();
        assert!(encoded.get("data").is_none());
    }
}
