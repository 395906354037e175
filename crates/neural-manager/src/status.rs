//! Status aggregation for dashboards and the CLI

use chrono::{DateTime, Utc};
use neural_agent_kernel::RuntimeStats;
use neural_types::{AgentAddress, AgentRole};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::manager::ManagerState;

/// Status of one managed agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub name: String,
    pub display_name: String,
    pub address: AgentAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<AgentRole>,
    pub running: bool,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub stats: RuntimeStats,
    pub handlers: Vec<String>,
    pub subscriptions: Vec<String>,
    /// The agent's own counters
    pub metrics: Value,
}

/// Summary of fleet status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetStatusSummary {
    pub state: ManagerState,
    pub total_agents: usize,
    pub running_agents: usize,
    pub agents: Vec<AgentStatus>,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of [`AgentManager::start`](crate::AgentManager::start)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartReport {
    pub started: Vec<String>,
    /// Agent name to start failure
    pub failed: Vec<(String, String)>,
}

impl StartReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of [`AgentManager::stop`](crate::AgentManager::stop)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopReport {
    pub graceful: Vec<String>,
    /// Agents cancelled after the grace period
    pub aborted: Vec<String>,
}
