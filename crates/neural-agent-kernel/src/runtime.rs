//! Agent runtime: one task per agent, one envelope at a time
//!
//! The loop owns the agent's kernel, so handler state is single-writer. A
//! shutdown signal lets the in-flight envelope finish before the loop exits.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use neural_types::{AgentResponse, FraudScoreResponse, RiskScoreResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::agent::{Agent, AgentProfile};
use crate::bus::Subscription;
use crate::context::AgentContext;
use crate::directory::{AgentDirectory, AgentHandle};
use crate::error::KernelError;
use crate::io::{Envelope, Inbox};
use crate::kernel::{panic_message, AgentKernel, HandleOutcome, KernelConfig};
use crate::trace::KernelStage;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub inbox_capacity: usize,
    pub trace_max_entries: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 64,
            trace_max_entries: Some(1024),
        }
    }
}

/// Counters kept by the agent loop
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeStats {
    pub messages_processed: u64,
    pub messages_failed: u64,
    pub unhandled_messages: u64,
    pub api_requests: u64,
    pub api_failures: u64,
    pub queries_answered: u64,
    pub query_failures: u64,
    pub events_handled: u64,
    pub event_failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub stats: RuntimeStats,
    pub handlers: Vec<String>,
    pub subscriptions: Vec<String>,
    pub metrics: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Graceful,
    Aborted,
}

/// A spawned agent loop
pub struct RunningAgent {
    handle: AgentHandle,
    profile: AgentProfile,
    directory: Arc<AgentDirectory>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

impl RunningAgent {
    pub fn handle(&self) -> &AgentHandle {
        &self.handle
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn signal_stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal shutdown and wait up to `grace`; abort the loop after that
    pub async fn stop(mut self, grace: Duration) -> StopOutcome {
        self.signal_stop();
        match tokio::time::timeout(grace, &mut self.join).await {
            Ok(Ok(())) => StopOutcome::Graceful,
            Ok(Err(e)) => {
                tracing::error!(agent = %self.profile.name, "Agent task ended abnormally: {}", e);
                self.directory.remove(&self.profile.name);
                StopOutcome::Graceful
            }
            Err(_) => {
                tracing::warn!(
                    agent = %self.profile.name,
                    grace_ms = grace.as_millis() as u64,
                    "Agent did not stop within grace period, aborting"
                );
                self.join.abort();
                self.directory.remove(&self.profile.name);
                StopOutcome::Aborted
            }
        }
    }
}

impl std::fmt::Debug for RunningAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningAgent")
            .field("name", &self.profile.name)
            .field("address", &self.profile.address)
            .field("started_at", &self.started_at)
            .finish()
    }
}

pub struct AgentRuntime;

impl AgentRuntime {
    /// Start an agent: run `on_start`, register it, and spawn its loop
    pub async fn spawn(
        agent: Arc<dyn Agent>,
        ctx: AgentContext,
        config: &RuntimeConfig,
    ) -> Result<RunningAgent, KernelError> {
        let profile = agent.profile().clone();

        let started = AssertUnwindSafe(agent.on_start()).catch_unwind().await;
        let start_error = match started {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("panicked: {}", panic_message(&panic))),
        };
        if let Some(message) = start_error {
            return Err(KernelError::StartFailed {
                agent: profile.name.clone(),
                message,
            });
        }

        let (sender, receiver) = Inbox::new(config.inbox_capacity).split();
        let handle = AgentHandle::new(
            profile.name.clone(),
            profile.display_name.clone(),
            profile.address.clone(),
            profile.role,
            sender,
        );
        let directory = ctx.services().directory.clone();
        directory.register(handle.clone())?;

        let mut kernel = AgentKernel::new(KernelConfig {
            agent_id: profile.display_name.clone(),
            role: profile.role.map_or("custom", |r| r.name()).to_string(),
            trace_max_entries: config.trace_max_entries,
        });
        agent.clone().register_handlers(&mut kernel);

        let event_types = agent.subscriptions();
        let subscription = if event_types.is_empty() {
            None
        } else {
            let inbox = handle.clone();
            Some(ctx.subscribe(&event_types, move |event| {
                let inbox = inbox.clone();
                async move {
                    if let Err(e) = inbox.notify(event).await {
                        tracing::debug!("Dropping event for stopped agent: {}", e);
                    }
                }
            }))
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = Worker {
            agent,
            kernel,
            display_name: profile.display_name.clone(),
            name: profile.name.clone(),
            subscriptions: event_types.iter().map(|t| t.to_string()).collect(),
            stats: RuntimeStats::default(),
        };
        let join = tokio::spawn(worker.run(receiver, shutdown_rx, subscription, directory.clone()));

        tracing::info!(
            agent = %profile.name,
            address = %profile.address,
            "Agent started"
        );

        Ok(RunningAgent {
            handle,
            profile,
            directory,
            shutdown,
            join,
            started_at: Utc::now(),
        })
    }
}

struct Worker {
    agent: Arc<dyn Agent>,
    kernel: AgentKernel,
    name: String,
    display_name: String,
    subscriptions: Vec<String>,
    stats: RuntimeStats,
}

impl Worker {
    async fn run(
        mut self,
        mut inbox: mpsc::Receiver<Envelope>,
        mut shutdown: watch::Receiver<bool>,
        subscription: Option<Subscription>,
        directory: Arc<AgentDirectory>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                envelope = inbox.recv() => match envelope {
                    Some(envelope) => self.process(envelope).await,
                    None => break,
                },
            }
        }

        // Pending envelopes are dropped; their callers observe NoReply
        drop(inbox);
        if let Some(subscription) = subscription {
            subscription.cancel().await;
        }
        if let Err(panic) = AssertUnwindSafe(self.agent.on_stop()).catch_unwind().await {
            tracing::warn!(agent = %self.name, "on_stop panicked: {}", panic_message(&panic));
        }
        directory.remove(&self.name);
        tracing::info!(agent = %self.name, stats = ?self.stats, "Agent stopped");
    }

    fn count(&self, counter: &'static str, outcome: &'static str) {
        metrics::counter!(counter, "agent" => self.name.clone(), "outcome" => outcome).increment(1);
    }

    fn count_answer(&self, kind: &'static str, degraded: bool) {
        let outcome = if degraded { "degraded" } else { "answered" };
        metrics::counter!(
            "neural_agent_queries_total",
            "agent" => self.name.clone(),
            "side" => "responder",
            "kind" => kind,
            "outcome" => outcome
        )
        .increment(1);
    }

    async fn process(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Message { message, reply } => {
                let outcome = self.kernel.handle(message).await;
                match &outcome {
                    HandleOutcome::Succeeded(_) => self.stats.messages_processed += 1,
                    HandleOutcome::Failed(response) => {
                        self.stats.messages_failed += 1;
                        self.stats.last_error = response.error.clone();
                    }
                    HandleOutcome::NotFound { .. } => self.stats.unhandled_messages += 1,
                }
                self.count("neural_agent_messages_total", outcome.label());
                let _ = reply.send(outcome);
            }
            Envelope::Api {
                message_type,
                data,
                reply,
            } => {
                self.stats.api_requests += 1;
                let request_id = uuid::Uuid::new_v4().to_string();
                let result = AssertUnwindSafe(self.agent.handle_api_request(&message_type, data))
                    .catch_unwind()
                    .await;
                let error = match result {
                    Ok(Ok(data)) => {
                        self.count("neural_agent_api_requests_total", "succeeded");
                        let response = AgentResponse::success(request_id, &self.display_name, data);
                        let _ = reply.send(response);
                        return;
                    }
                    Ok(Err(e)) => e.to_string(),
                    Err(panic) => format!("Handler panicked: {}", panic_message(&panic)),
                };
                tracing::error!(
                    agent = %self.name,
                    message_type = %message_type,
                    error = %error,
                    "API request failed"
                );
                self.stats.api_failures += 1;
                self.stats.last_error = Some(error.clone());
                self.count("neural_agent_api_requests_total", "failed");
                let _ = reply.send(AgentResponse::failure(request_id, &self.display_name, error));
            }
            Envelope::RiskQuery { query, reply } => {
                let agent_id = self.display_name.clone();
                let result = AssertUnwindSafe(self.agent.assess_risk(&query))
                    .catch_unwind()
                    .await;
                let response = match result {
                    Ok(Ok(response)) => response,
                    Ok(Err(e)) => self.query_fault(format!("Error: {}", e), |f| {
                        RiskScoreResponse::neutral(&query, &agent_id, "error", f)
                    }),
                    Err(panic) => {
                        self.query_fault(format!("Error: {}", panic_message(&panic)), |f| {
                            RiskScoreResponse::neutral(&query, &agent_id, "error", f)
                        })
                    }
                };
                self.stats.queries_answered += 1;
                self.kernel.trace_mut().record(
                    KernelStage::Query,
                    "risk query answered",
                    Some(json!({
                        "entity_type": query.entity_type,
                        "degraded": response.is_degraded()
                    })),
                );
                self.count_answer("risk", response.is_degraded());
                let _ = reply.send(response);
            }
            Envelope::FraudQuery { query, reply } => {
                let agent_id = self.display_name.clone();
                let result = AssertUnwindSafe(self.agent.assess_fraud(&query))
                    .catch_unwind()
                    .await;
                let response = match result {
                    Ok(Ok(response)) => response,
                    Ok(Err(e)) => self.query_fault(format!("Error: {}", e), |f| {
                        FraudScoreResponse::neutral(&query, &agent_id, f)
                    }),
                    Err(panic) => {
                        self.query_fault(format!("Error: {}", panic_message(&panic)), |f| {
                            FraudScoreResponse::neutral(&query, &agent_id, f)
                        })
                    }
                };
                self.stats.queries_answered += 1;
                self.kernel.trace_mut().record(
                    KernelStage::Query,
                    "fraud query answered",
                    Some(json!({"degraded": response.is_degraded()})),
                );
                self.count_answer("fraud", response.is_degraded());
                let _ = reply.send(response);
            }
            Envelope::Event(event) => {
                let event_type = event.event_type.clone();
                let result = AssertUnwindSafe(self.agent.on_event(event)).catch_unwind().await;
                let error = match result {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(panic) => Some(format!("Handler panicked: {}", panic_message(&panic))),
                };
                match error {
                    None => {
                        self.stats.events_handled += 1;
                        self.count("neural_agent_events_total", "succeeded");
                    }
                    Some(error) => {
                        tracing::error!(
                            agent = %self.name,
                            event_type = %event_type,
                            error = %error,
                            "Event handler failed"
                        );
                        self.stats.event_failures += 1;
                        self.stats.last_error = Some(error);
                        self.count("neural_agent_events_total", "failed");
                    }
                }
                self.kernel.trace_mut().record(
                    KernelStage::Event,
                    "event handled",
                    Some(json!({"event_type": event_type})),
                );
            }
            Envelope::Status { reply } => {
                let _ = reply.send(StatusSnapshot {
                    stats: self.stats.clone(),
                    handlers: self.kernel.message_types(),
                    subscriptions: self.subscriptions.clone(),
                    metrics: self.agent.metrics(),
                });
            }
        }
    }

    fn query_fault<T>(&mut self, factor: String, neutral: impl FnOnce(String) -> T) -> T {
        tracing::error!(agent = %self.name, error = %factor, "Query handler failed");
        self.stats.query_failures += 1;
        self.stats.last_error = Some(factor.clone());
        neutral(factor)
    }
}
