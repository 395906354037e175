//! Inbox envelopes exchanged with a running agent

use neural_types::{
    AgentMessage, AgentResponse, Event, FraudScoreQuery, FraudScoreResponse, RiskScoreQuery,
    RiskScoreResponse,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::kernel::HandleOutcome;
use crate::runtime::StatusSnapshot;

/// Everything an agent's serial loop can be asked to do
#[derive(Debug)]
pub enum Envelope {
    /// Protocol message; the reply carries the dispatch outcome
    Message {
        message: AgentMessage,
        reply: oneshot::Sender<HandleOutcome>,
    },
    /// Gateway-style request answered through the agent's API adapter
    Api {
        message_type: String,
        data: Value,
        reply: oneshot::Sender<AgentResponse>,
    },
    RiskQuery {
        query: RiskScoreQuery,
        reply: oneshot::Sender<RiskScoreResponse>,
    },
    FraudQuery {
        query: FraudScoreQuery,
        reply: oneshot::Sender<FraudScoreResponse>,
    },
    Event(Event),
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
}

impl Envelope {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Api { .. } => "api",
            Self::RiskQuery { .. } => "risk_query",
            Self::FraudQuery { .. } => "fraud_query",
            Self::Event(_) => "event",
            Self::Status { .. } => "status",
        }
    }
}

/// Bounded inbox of one agent
pub struct Inbox {
    sender: mpsc::Sender<Envelope>,
    receiver: mpsc::Receiver<Envelope>,
}

impl Inbox {
    pub fn new(buffer: usize) -> Self {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        Self { sender, receiver }
    }

    pub fn sender(&self) -> mpsc::Sender<Envelope> {
        self.sender.clone()
    }

    pub fn split(self) -> (mpsc::Sender<Envelope>, mpsc::Receiver<Envelope>) {
        (self.sender, self.receiver)
    }

    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }
}
