//! Kernel error types

use neural_types::ProtocolError;
use thiserror::Error;

/// Errors at the runtime/transport level
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Agent {agent} is not running")]
    AgentUnavailable { agent: String },

    #[error("Agent {agent} dropped the request without replying")]
    NoReply { agent: String },

    #[error("Agent {agent} failed to start: {message}")]
    StartFailed { agent: String, message: String },

    #[error("Agent {agent} is already registered")]
    DuplicateAgent { agent: String },
}

/// Errors raised inside a handler; converted into failure responses at the agent boundary
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Invalid payload for {message_type}: {message}")]
    InvalidPayload {
        message_type: String,
        message: String,
    },

    #[error("Unknown message type: {message_type}")]
    UnsupportedMessageType { message_type: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: &'static str },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{message}")]
    Failed { message: String },
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

impl From<ProtocolError> for HandlerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownMessageType { message_type } => {
                Self::UnsupportedMessageType { message_type }
            }
            ProtocolError::InvalidPayload {
                message_type,
                message,
            } => Self::InvalidPayload {
                message_type,
                message,
            },
            ProtocolError::Serialization(e) => Self::Serialization(e),
            other => Self::failed(other.to_string()),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("Cache unavailable: {message}")]
    Unavailable { message: String },

    #[error("Cache serialization failed: {message}")]
    Serialization { message: String },
}
