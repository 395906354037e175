//! The agent manager state machine
//!
//! `stopped -> starting -> running -> stopping -> stopped`. Only a running
//! manager routes requests; every routing problem comes back as a failed
//! `AgentResponse` so callers see one shape.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use neural_agent_kernel::{
    AgentContext, AgentFactory, AgentHandle, AgentRuntime, RunningAgent, RuntimeConfig,
    RuntimeStats, SharedServices, StopOutcome,
};
use neural_types::{AgentMessage, AgentResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{ManagerError, Result};
use crate::status::{AgentStatus, FleetStatusSummary, StartReport, StopReport};

/// Sender name used on manager-originated messages
pub const MANAGER_ID: &str = "agent_manager";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Configuration for the agent manager
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub runtime: RuntimeConfig,
    /// Bound on a single `send_to_agent` round trip
    pub request_timeout: Duration,
    /// Time each agent gets to stop before it is cancelled
    pub grace_period: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            request_timeout: Duration::from_secs(30),
            grace_period: Duration::from_secs(5),
        }
    }
}

pub struct AgentManager {
    services: SharedServices,
    factory: Arc<dyn AgentFactory>,
    config: ManagerConfig,
    state: RwLock<ManagerState>,
    agents: RwLock<BTreeMap<String, RunningAgent>>,
}

impl AgentManager {
    pub fn new(
        services: SharedServices,
        factory: Arc<dyn AgentFactory>,
        config: ManagerConfig,
    ) -> Self {
        info!(
            namespace = services.bus.namespace(),
            request_timeout_ms = config.request_timeout.as_millis() as u64,
            "AgentManager initialized"
        );
        Self {
            services,
            factory,
            config,
            state: RwLock::new(ManagerState::Stopped),
            agents: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn services(&self) -> &SharedServices {
        &self.services
    }

    pub async fn state(&self) -> ManagerState {
        *self.state.read().await
    }

    async fn transition(&self, expected: ManagerState, next: ManagerState) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != expected {
            return Err(ManagerError::InvalidState {
                expected,
                actual: *state,
            });
        }
        info!(from = %*state, to = %next, "Manager state transition");
        *state = next;
        Ok(())
    }

    async fn set_state(&self, next: ManagerState) {
        let mut state = self.state.write().await;
        info!(from = %*state, to = %next, "Manager state transition");
        *state = next;
    }

    /// Start every agent on the roster
    ///
    /// One agent failing to start does not stop the others; failures are in
    /// the report. Errors only when nothing started.
    pub async fn start(&self) -> Result<StartReport> {
        self.transition(ManagerState::Stopped, ManagerState::Starting).await?;

        let mut report = StartReport::default();
        let mut started = BTreeMap::new();

        for spec in self.factory.roster() {
            let ctx = AgentContext::new(&spec.name, spec.address(), self.services.clone());
            let spawned = match self.factory.create(&spec, ctx.clone()) {
                Ok(agent) => AgentRuntime::spawn(agent, ctx, &self.config.runtime).await,
                Err(e) => Err(e),
            };
            match spawned {
                Ok(running) => {
                    info!(
                        agent = %spec.name,
                        address = %running.profile().address,
                        "Agent started"
                    );
                    report.started.push(spec.name.clone());
                    started.insert(spec.name, running);
                }
                Err(e) => {
                    warn!(agent = %spec.name, error = %e, "Agent failed to start");
                    report.failed.push((spec.name, e.to_string()));
                }
            }
        }

        if started.is_empty() && !report.failed.is_empty() {
            self.set_state(ManagerState::Stopped).await;
            return Err(ManagerError::NoAgentsStarted {
                failures: report.failed.len(),
            });
        }

        metrics::gauge!("neural_manager_running_agents").set(started.len() as f64);
        *self.agents.write().await = started;
        self.set_state(ManagerState::Running).await;
        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            "Agent fleet running"
        );
        Ok(report)
    }

    /// Signal every agent, then wait out the grace period for each
    pub async fn stop(&self) -> Result<StopReport> {
        self.transition(ManagerState::Running, ManagerState::Stopping).await?;

        let agents = std::mem::take(&mut *self.agents.write().await);
        for running in agents.values() {
            running.signal_stop();
        }

        let grace = self.config.grace_period;
        let outcomes = join_all(
            agents
                .into_iter()
                .map(|(name, running)| async move { (name, running.stop(grace).await) }),
        )
        .await;

        let mut report = StopReport::default();
        for (name, outcome) in outcomes {
            match outcome {
                StopOutcome::Graceful => report.graceful.push(name),
                StopOutcome::Aborted => report.aborted.push(name),
            }
        }

        metrics::gauge!("neural_manager_running_agents").set(0.0);
        self.set_state(ManagerState::Stopped).await;
        info!(
            graceful = report.graceful.len(),
            aborted = report.aborted.len(),
            "Agent fleet stopped"
        );
        Ok(report)
    }

    async fn routable(&self, name: &str) -> std::result::Result<AgentHandle, String> {
        let state = self.state().await;
        if state != ManagerState::Running {
            return Err(format!("Agent manager is {}", state));
        }
        self.services
            .directory
            .resolve(name)
            .ok_or_else(|| format!("Agent not found: {}", name))
    }

    fn record(agent: &str, outcome: &'static str) {
        metrics::counter!(
            "neural_manager_requests_total",
            "agent" => agent.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }

    /// Synchronous request to one agent; always yields a response
    pub async fn send_to_agent(
        &self,
        name: &str,
        message_type: &str,
        data: Value,
    ) -> AgentResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        let handle = match self.routable(name).await {
            Ok(handle) => handle,
            Err(error) => {
                warn!(agent = name, message_type, %error, "Request not routed");
                Self::record(name, "unroutable");
                return AgentResponse::failure(request_id, MANAGER_ID, error);
            }
        };

        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, handle.api_request(message_type, data)).await {
            Ok(Ok(response)) => {
                Self::record(handle.name(), if response.success { "success" } else { "failure" });
                response
            }
            Ok(Err(e)) => {
                Self::record(handle.name(), "unavailable");
                AgentResponse::failure(request_id, handle.display_name(), e.to_string())
            }
            Err(_) => {
                warn!(
                    agent = name,
                    message_type,
                    timeout_ms = timeout.as_millis() as u64,
                    "Request timed out"
                );
                Self::record(handle.name(), "timeout");
                AgentResponse::failure(
                    request_id,
                    handle.display_name(),
                    format!("Request to {} timed out after {}ms", name, timeout.as_millis()),
                )
            }
        }
    }

    /// Concurrent fan-out to `targets`, or to every running agent
    ///
    /// Every target gets an entry; unknown names are failures.
    pub async fn broadcast_to_agents(
        &self,
        message_type: &str,
        data: Value,
        targets: Option<&[String]>,
    ) -> BTreeMap<String, AgentResponse> {
        let names: Vec<String> = match targets {
            Some(targets) => targets.to_vec(),
            None => self.agents.read().await.keys().cloned().collect(),
        };
        info!(message_type, targets = names.len(), "Broadcasting to agents");

        let replies = join_all(names.into_iter().map(|name| {
            let data = data.clone();
            async move {
                let response = self.send_to_agent(&name, message_type, data).await;
                (name, response)
            }
        }))
        .await;
        replies.into_iter().collect()
    }

    /// Route a protocol message by recipient name or address
    ///
    /// `None` means the recipient has no handler for the message type.
    pub async fn deliver(&self, message: AgentMessage) -> Option<AgentResponse> {
        let handle = match self.routable(&message.recipient).await {
            Ok(handle) => handle,
            Err(error) => {
                return Some(AgentResponse::failure(&message.message_id, MANAGER_ID, error))
            }
        };

        let message_id = message.message_id.clone();
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, handle.send(message)).await {
            Ok(Ok(outcome)) => outcome.into_response(),
            Ok(Err(e)) => Some(AgentResponse::failure(
                message_id,
                handle.display_name(),
                e.to_string(),
            )),
            Err(_) => Some(AgentResponse::failure(
                message_id,
                handle.display_name(),
                format!("Delivery timed out after {}ms", timeout.as_millis()),
            )),
        }
    }

    /// Status of one managed agent, by name
    pub async fn get_agent_status(&self, name: &str) -> Option<AgentStatus> {
        let agents = self.agents.read().await;
        let running = agents.get(name)?;
        Some(self.status_of(running).await)
    }

    async fn status_of(&self, running: &RunningAgent) -> AgentStatus {
        let profile = running.profile();
        let snapshot = if running.is_finished() {
            None
        } else {
            tokio::time::timeout(self.config.request_timeout, running.handle().status())
                .await
                .ok()
                .and_then(|r| r.ok())
        };
        let started_at = running.started_at();

        let (alive, stats, handlers, subscriptions, metrics) = match snapshot {
            Some(s) => (true, s.stats, s.handlers, s.subscriptions, s.metrics),
            None => (false, RuntimeStats::default(), Vec::new(), Vec::new(), Value::Null),
        };

        AgentStatus {
            name: profile.name.clone(),
            display_name: profile.display_name.clone(),
            address: profile.address.clone(),
            role: profile.role,
            running: alive,
            started_at,
            uptime_secs: (Utc::now() - started_at).num_seconds(),
            stats,
            handlers,
            subscriptions,
            metrics,
        }
    }

    pub async fn all_status(&self) -> FleetStatusSummary {
        let agents = self.agents.read().await;
        let statuses = join_all(agents.values().map(|running| self.status_of(running))).await;
        FleetStatusSummary {
            state: self.state().await,
            total_agents: statuses.len(),
            running_agents: statuses.iter().filter(|s| s.running).count(),
            agents: statuses,
            timestamp: Utc::now(),
        }
    }

    pub async fn agent_names(&self) -> Vec<String> {
        self.agents.read().await.keys().cloned().collect()
    }
}

impl fmt::Debug for AgentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ManagerState::Starting.to_string(), "starting");
        assert_eq!(
            serde_json::to_value(ManagerState::Running).unwrap(),
            serde_json::json!("running")
        );
    }

    #[test]
    fn test_invalid_state_message() {
        let err = ManagerError::InvalidState {
            expected: ManagerState::Running,
            actual: ManagerState::Stopped,
        };
        assert_eq!(err.to_string(), "Manager is stopped, expected running");
    }
}
