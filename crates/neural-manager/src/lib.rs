//! Neural Manager - Fleet Orchestration for the Neural Agents
//!
//! Supervises the agent fleet and is the single entry point for the gateway.
//!
//! # Capabilities
//!
//! - **Lifecycle**: start every configured agent on its own task, stop them
//!   with a bounded grace period
//! - **Routing**: `send_to_agent` and `broadcast_to_agents` for gateway
//!   requests, `deliver` for protocol messages
//! - **Status**: per-agent runtime counters and agent metrics

pub mod error;
pub mod manager;
pub mod status;

pub use error::{ManagerError, Result};
pub use manager::{AgentManager, ManagerConfig, ManagerState, MANAGER_ID};
pub use status::{AgentStatus, FleetStatusSummary, StartReport, StopReport};
