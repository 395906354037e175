//! Handles to running agents and name/address resolution

use dashmap::DashMap;
use neural_types::{
    AgentAddress, AgentMessage, AgentResponse, AgentRole, Event, FraudScoreQuery,
    FraudScoreResponse, RiskScoreQuery, RiskScoreResponse,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::KernelError;
use crate::io::Envelope;
use crate::kernel::HandleOutcome;
use crate::runtime::StatusSnapshot;

/// Cloneable sender side of a running agent
#[derive(Debug, Clone)]
pub struct AgentHandle {
    name: String,
    display_name: String,
    address: AgentAddress,
    role: Option<AgentRole>,
    sender: mpsc::Sender<Envelope>,
}

impl AgentHandle {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        address: AgentAddress,
        role: Option<AgentRole>,
        sender: mpsc::Sender<Envelope>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            address,
            role,
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn address(&self) -> &AgentAddress {
        &self.address
    }

    pub fn role(&self) -> Option<AgentRole> {
        self.role
    }

    /// True once the agent loop has exited
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn enqueue(&self, envelope: Envelope) -> Result<(), KernelError> {
        self.sender
            .send(envelope)
            .await
            .map_err(|_| KernelError::AgentUnavailable {
                agent: self.name.clone(),
            })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Envelope,
    ) -> Result<T, KernelError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(build(tx)).await?;
        rx.await.map_err(|_| KernelError::NoReply {
            agent: self.name.clone(),
        })
    }

    /// Deliver a message and wait for its dispatch outcome
    pub async fn send(&self, message: AgentMessage) -> Result<HandleOutcome, KernelError> {
        self.request(|reply| Envelope::Message {
            message,
            reply,
        })
        .await
    }

    pub async fn api_request(
        &self,
        message_type: impl Into<String>,
        data: Value,
    ) -> Result<AgentResponse, KernelError> {
        let message_type = message_type.into();
        self.request(|reply| Envelope::Api {
            message_type,
            data,
            reply,
        })
        .await
    }

    pub async fn risk_query(
        &self,
        query: RiskScoreQuery,
    ) -> Result<RiskScoreResponse, KernelError> {
        self.request(|reply| Envelope::RiskQuery { query, reply }).await
    }

    pub async fn fraud_query(
        &self,
        query: FraudScoreQuery,
    ) -> Result<FraudScoreResponse, KernelError> {
        self.request(|reply| Envelope::FraudQuery { query, reply }).await
    }

    pub async fn notify(&self, event: Event) -> Result<(), KernelError> {
        self.enqueue(Envelope::Event(event)).await
    }

    pub async fn status(&self) -> Result<StatusSnapshot, KernelError> {
        self.request(|reply| Envelope::Status { reply }).await
    }
}

/// Registry of running agents, addressable by routing name, display name or address
#[derive(Debug, Default)]
pub struct AgentDirectory {
    agents: DashMap<String, AgentHandle>,
    aliases: DashMap<String, String>,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: AgentHandle) -> Result<(), KernelError> {
        let name = handle.name().to_string();
        if self.agents.contains_key(&name) {
            return Err(KernelError::DuplicateAgent { agent: name });
        }
        self.aliases
            .insert(handle.display_name().to_lowercase(), name.clone());
        self.aliases
            .insert(handle.address().as_str().to_string(), name.clone());
        self.agents.insert(name, handle);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<AgentHandle> {
        let (_, handle) = self.agents.remove(name)?;
        self.aliases.retain(|_, target| target != name);
        Some(handle)
    }

    /// Find an agent by routing name, display name (case-insensitive) or address
    pub fn resolve(&self, target: &str) -> Option<AgentHandle> {
        if let Some(handle) = self.agents.get(target) {
            return Some(handle.clone());
        }
        let name = self
            .aliases
            .get(target)
            .or_else(|| self.aliases.get(&target.to_lowercase()))
            .map(|entry| entry.value().clone())?;
        self.agents.get(&name).map(|handle| handle.clone())
    }

    /// Routing names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
