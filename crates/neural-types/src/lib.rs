//! Neural Types - Protocol vocabulary for the neural agent fleet
//!
//! This crate has zero dependencies on other neural crates. It defines:
//!
//! - Agent identity (`AgentRole`, `AgentAddress`)
//! - The point-to-point envelope (`AgentMessage`, `AgentResponse`)
//! - Typed inter-agent queries (`RiskScoreQuery`, `FraudScoreQuery`) and their answers
//! - Per-agent request payloads and the `AgentRequest` tagged union
//! - Event bus records and topic naming
//!
//! # Protocol Invariants
//!
//! 1. Every `AgentMessage` carries a globally unique `message_id`
//! 2. Scores crossing the protocol are clamped to `[0, 1]`
//! 3. Every query answer carries the identity of the responding agent

pub mod address;
pub mod error;
pub mod event;
pub mod message;
pub mod query;
pub mod requests;

pub use address::*;
pub use error::*;
pub use event::*;
pub use message::*;
pub use query::*;
pub use requests::*;

/// Version of the wire protocol
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Clamp a score into the closed unit interval, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.4), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.93333, 3), 0.933);
        assert_eq!(round_to(12.345, 1), 12.3);
    }
}
