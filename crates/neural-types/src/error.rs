//! Protocol error types

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while decoding or encoding protocol payloads
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The message type is not part of the protocol
    #[error("Unknown message type: {message_type}")]
    UnknownMessageType { message_type: String },

    /// The payload does not match the schema of its message type
    #[error("Invalid payload for {message_type}: {message}")]
    InvalidPayload {
        message_type: String,
        message: String,
    },

    /// Unknown agent role name
    #[error("Unknown agent role: {0}")]
    UnknownRole(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
