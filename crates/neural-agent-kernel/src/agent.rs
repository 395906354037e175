//! The agent contract

use std::sync::Arc;

use async_trait::async_trait;
use neural_types::{
    AgentAddress, AgentRole, Event, FraudScoreQuery, FraudScoreResponse, RiskScoreQuery,
    RiskScoreResponse,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::HandlerError;
use crate::kernel::AgentKernel;

/// Static identity of an agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentProfile {
    /// Routing name, e.g. `compliance`
    pub name: String,
    /// Name reported in responses, e.g. `ComplianceAgent`
    pub display_name: String,
    pub address: AgentAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<AgentRole>,
    pub description: String,
    pub capabilities: Vec<String>,
}

impl AgentProfile {
    pub fn for_role(role: AgentRole, address: AgentAddress) -> Self {
        Self {
            name: role.name().to_string(),
            display_name: role.display_name().to_string(),
            address,
            role: Some(role),
            description: role.description().to_string(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.capabilities = capabilities.iter().map(|c| c.to_string()).collect();
        self
    }
}

/// A specialized agent driven by the runtime's serial loop
///
/// Every method is invoked from the agent's own task, one envelope at a time.
/// Errors and panics from these methods are contained by the runtime.
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    fn profile(&self) -> &AgentProfile;

    /// Install message handlers on the agent's kernel
    fn register_handlers(self: Arc<Self>, kernel: &mut AgentKernel);

    /// Event types forwarded to [`Agent::on_event`]
    fn subscriptions(&self) -> Vec<&'static str> {
        Vec::new()
    }

    async fn on_start(&self) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn on_stop(&self) {}

    /// Gateway-facing request adapter, separate from the message handlers
    async fn handle_api_request(
        &self,
        message_type: &str,
        data: Value,
    ) -> Result<Value, HandlerError>;

    async fn assess_risk(
        &self,
        _query: &RiskScoreQuery,
    ) -> Result<RiskScoreResponse, HandlerError> {
        Err(HandlerError::Unsupported {
            operation: "risk_score_query",
        })
    }

    async fn assess_fraud(
        &self,
        _query: &FraudScoreQuery,
    ) -> Result<FraudScoreResponse, HandlerError> {
        Err(HandlerError::Unsupported {
            operation: "fraud_score_query",
        })
    }

    async fn on_event(&self, _event: Event) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Agent-specific counters for status reports
    fn metrics(&self) -> Value {
        Value::Null
    }
}
