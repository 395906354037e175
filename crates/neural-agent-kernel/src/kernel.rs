//! AgentKernel core dispatch
//!
//! The kernel owns the handler registry of one agent and turns every dispatched
//! message into exactly one [`HandleOutcome`]. Handler errors and panics are
//! caught here and never cross the agent boundary.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use neural_types::{AgentMessage, AgentResponse};
use serde_json::{json, Value};

use crate::error::HandlerError;
use crate::trace::{KernelStage, KernelTrace};

/// A registered message handler. Returns result data; the kernel wraps it.
pub type Handler =
    Arc<dyn Fn(AgentMessage) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

pub struct KernelConfig {
    /// Reported as `agent_id` in responses
    pub agent_id: String,
    pub role: String,
    pub trace_max_entries: Option<usize>,
}

/// Result of dispatching one message
#[derive(Debug, Clone)]
pub enum HandleOutcome {
    Succeeded(AgentResponse),
    Failed(AgentResponse),
    /// No handler registered for the message type; no response is produced
    NotFound {
        message_id: String,
        message_type: String,
    },
}

impl HandleOutcome {
    pub fn response(&self) -> Option<&AgentResponse> {
        match self {
            Self::Succeeded(r) | Self::Failed(r) => Some(r),
            Self::NotFound { .. } => None,
        }
    }

    pub fn into_response(self) -> Option<AgentResponse> {
        match self {
            Self::Succeeded(r) | Self::Failed(r) => Some(r),
            Self::NotFound { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
            Self::NotFound { .. } => "not_found",
        }
    }
}

pub struct AgentKernel {
    agent_id: String,
    role: String,
    handlers: HashMap<String, Handler>,
    trace: KernelTrace,
}

impl AgentKernel {
    pub fn new(config: KernelConfig) -> Self {
        let trace = KernelTrace::new(&config.agent_id, &config.role, config.trace_max_entries);
        Self {
            agent_id: config.agent_id,
            role: config.role,
            handlers: HashMap::new(),
            trace,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn trace(&self) -> &KernelTrace {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut KernelTrace {
        &mut self.trace
    }

    /// Register a handler, replacing any existing one for the same type
    pub fn register_handler<F, Fut>(&mut self, message_type: impl Into<String>, handler: F)
    where
        F: Fn(AgentMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        let message_type = message_type.into();
        let handler: Handler = Arc::new(move |message| handler(message).boxed());
        let replaced = self.handlers.insert(message_type.clone(), handler).is_some();

        tracing::debug!(
            agent = %self.agent_id,
            message_type = %message_type,
            replaced,
            "Registered message handler"
        );
        self.trace.record(
            KernelStage::Register,
            "handler registered",
            Some(json!({"message_type": message_type, "replaced": replaced})),
        );
    }

    pub fn has_handler(&self, message_type: &str) -> bool {
        self.handlers.contains_key(message_type)
    }

    /// Registered message types, sorted
    pub fn message_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Dispatch a message to its handler
    pub async fn handle(&mut self, message: AgentMessage) -> HandleOutcome {
        let message_id = message.message_id.clone();
        let message_type = message.message_type.clone();

        let handler = match self.handlers.get(&message_type) {
            Some(handler) => handler.clone(),
            None => {
                tracing::warn!(
                    agent = %self.agent_id,
                    message_type = %message_type,
                    message_id = %message_id,
                    "No handler registered for message type"
                );
                self.trace.record(
                    KernelStage::Unhandled,
                    "no handler",
                    Some(json!({"message_type": message_type})),
                );
                return HandleOutcome::NotFound {
                    message_id,
                    message_type,
                };
            }
        };

        let result = AssertUnwindSafe(handler(message)).catch_unwind().await;

        match result {
            Ok(Ok(data)) => {
                self.trace.record(
                    KernelStage::Dispatch,
                    "message handled",
                    Some(json!({"message_type": message_type, "success": true})),
                );
                HandleOutcome::Succeeded(AgentResponse::success(message_id, &self.agent_id, data))
            }
            Ok(Err(err)) => self.fail(message_id, message_type, err.to_string()),
            Err(panic) => {
                let description = format!("Handler panicked: {}", panic_message(&panic));
                self.fail(message_id, message_type, description)
            }
        }
    }

    fn fail(&mut self, message_id: String, message_type: String, error: String) -> HandleOutcome {
        tracing::error!(
            agent = %self.agent_id,
            message_type = %message_type,
            message_id = %message_id,
            error = %error,
            "Handler failed"
        );
        self.trace.record(
            KernelStage::Failure,
            "handler failed",
            Some(json!({"message_type": message_type, "error": error})),
        );
        HandleOutcome::Failed(AgentResponse::failure(message_id, &self.agent_id, error))
    }
}

/// Best-effort description of a panic payload
pub fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
