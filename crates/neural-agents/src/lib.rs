//! Neural Agents - the specialized agents of the fleet
//!
//! - **ComplianceAgent**: AML/KYC checks for transactions and merchants
//! - **FraudAgent**: rule + anomaly-model ensemble fraud scoring
//! - **TreasuryAgent**: liquidity health, payment routing, liquidity allocation
//! - **GrowthAgent**: merchant performance analysis and growth suggestions
//! - **SupportAgent**: query classification and answers
//!
//! # Key Principle
//!
//! **Every decision carries a recommended action, even with no oracle.**
//!
//! Judgments go through the [`Reasoner`](neural_oracle::Reasoner), which falls
//! back to the deterministic engines in `neural-rules` whenever the oracle is
//! absent or misbehaves.

pub mod compliance;
pub mod factory;
pub mod fraud;
pub mod growth;
pub mod support;
pub mod treasury;

pub use compliance::{ComplianceAgent, ComplianceCounters, TransactionCheck};
pub use factory::{FleetSettings, NeuralAgentFactory};
pub use fraud::{FraudAgent, FraudAnalysis, FraudCounters};
pub use growth::{GrowthAgent, GrowthCounters, GrowthReport};
pub use support::{SupportAgent, SupportCounters, SupportReply};
pub use treasury::{AllocationReport, TreasuryAgent, TreasuryCounters, TreasuryReport};

use std::sync::Arc;

use async_trait::async_trait;
use neural_agent_kernel::{AgentKernel, HandlerError};
use neural_types::AgentMessage;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Shared request entry point for the message and API paths of an agent
#[async_trait]
pub(crate) trait RequestDispatch: Send + Sync {
    async fn dispatch(&self, message_type: &str, payload: Value) -> Result<Value, HandlerError>;
}

/// Route each listed message type to the agent's `dispatch`
pub(crate) fn register_dispatch<A>(agent: Arc<A>, kernel: &mut AgentKernel, message_types: &[&str])
where
    A: RequestDispatch + 'static,
{
    for message_type in message_types {
        let agent = agent.clone();
        kernel.register_handler(*message_type, move |message: AgentMessage| {
            let agent = agent.clone();
            async move { agent.dispatch(&message.message_type, message.payload).await }
        });
    }
}

/// Decode an open-ended map into typed facts
pub(crate) fn decode_map<T: DeserializeOwned>(
    message_type: &str,
    map: Map<String, Value>,
) -> Result<T, HandlerError> {
    serde_json::from_value(Value::Object(map)).map_err(|e| HandlerError::InvalidPayload {
        message_type: message_type.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn unsupported(message_type: &str) -> HandlerError {
    HandlerError::UnsupportedMessageType {
        message_type: message_type.to_string(),
    }
}
