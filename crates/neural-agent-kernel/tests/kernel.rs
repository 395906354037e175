use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use neural_agent_kernel::{
    Agent, AgentContext, AgentKernel, AgentProfile, AgentRuntime, HandleOutcome, HandlerError,
    KernelConfig, RunningAgent, RuntimeConfig, SharedServices, StopOutcome,
};
use neural_types::{
    AgentAddress, AgentMessage, Event, FraudScoreQuery, RiskScoreQuery, RiskScoreResponse,
};

struct EchoAgent {
    profile: AgentProfile,
    echoes: AtomicUsize,
    events: AtomicUsize,
    query_delay: Duration,
}

impl EchoAgent {
    fn new(name: &str) -> Arc<Self> {
        Self::with_query_delay(name, Duration::ZERO)
    }

    fn with_query_delay(name: &str, query_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            profile: AgentProfile {
                name: name.to_string(),
                display_name: format!("{}Agent", name),
                address: AgentAddress::from_seed(name),
                role: None,
                description: "Test agent".to_string(),
                capabilities: vec!["echo".to_string()],
            },
            echoes: AtomicUsize::new(0),
            events: AtomicUsize::new(0),
            query_delay,
        })
    }
}

async fn explode(_message: AgentMessage) -> Result<Value, HandlerError> {
    panic!("handler exploded")
}

#[async_trait]
impl Agent for EchoAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn register_handlers(self: Arc<Self>, kernel: &mut AgentKernel) {
        let agent = self.clone();
        kernel.register_handler("echo", move |message| {
            let agent = agent.clone();
            async move {
                agent.echoes.fetch_add(1, Ordering::SeqCst);
                Ok(message.payload)
            }
        });
        kernel.register_handler("fail", |_message| async {
            Err(HandlerError::failed("refused"))
        });
        kernel.register_handler("explode", explode);
    }

    fn subscriptions(&self) -> Vec<&'static str> {
        vec!["transaction.created"]
    }

    async fn handle_api_request(
        &self,
        message_type: &str,
        data: Value,
    ) -> Result<Value, HandlerError> {
        match message_type {
            "echo" => Ok(data),
            "sleep" => {
                let ms = data.as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!({"slept_ms": ms}))
            }
            other => Err(HandlerError::UnsupportedMessageType {
                message_type: other.to_string(),
            }),
        }
    }

    async fn assess_risk(&self, query: &RiskScoreQuery) -> Result<RiskScoreResponse, HandlerError> {
        tokio::time::sleep(self.query_delay).await;
        if query.entity_id == "poison" {
            return Err(HandlerError::failed("poisoned entity"));
        }
        Ok(RiskScoreResponse::new(
            query,
            &self.profile.display_name,
            0.2,
            "low",
            vec!["looks fine".to_string()],
            0.9,
        ))
    }

    async fn on_event(&self, _event: Event) -> Result<(), HandlerError> {
        self.events.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn metrics(&self) -> Value {
        json!({"echoes": self.echoes.load(Ordering::SeqCst)})
    }
}

async fn spawn(services: &SharedServices, agent: Arc<EchoAgent>) -> RunningAgent {
    let profile = agent.profile().clone();
    let ctx = AgentContext::new(&profile.name, profile.address, services.clone());
    AgentRuntime::spawn(agent, ctx, &RuntimeConfig::default())
        .await
        .expect("agent should start")
}

fn build_kernel() -> AgentKernel {
    let mut kernel = AgentKernel::new(KernelConfig {
        agent_id: "EchoAgent".to_string(),
        role: "custom".to_string(),
        trace_max_entries: Some(256),
    });
    EchoAgent::new("echo").register_handlers(&mut kernel);
    kernel
}

#[tokio::test]
async fn test_dispatch_outcomes() {
    let mut kernel = build_kernel();

    let message = AgentMessage::new("tester", "echo", "echo", json!({"hello": "world"}));
    let id = message.message_id.clone();
    match kernel.handle(message).await {
        HandleOutcome::Succeeded(response) => {
            assert_eq!(response.request_id, id);
            assert_eq!(response.agent_id, "EchoAgent");
            assert_eq!(response.data, Some(json!({"hello": "world"})));
        }
        other => panic!("Expected success, got {:?}", other),
    }

    let failed = kernel
        .handle(AgentMessage::new("tester", "echo", "fail", json!({})))
        .await;
    let response = failed.response().expect("Expected a failure response");
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("refused"));

    let unknown = kernel
        .handle(AgentMessage::new("tester", "echo", "teleport", json!({})))
        .await;
    assert!(unknown.response().is_none(), "Expected no response for unknown type");
}

#[tokio::test]
async fn test_trace_replayable() {
    let mut first = build_kernel();
    let mut second = build_kernel();

    for kernel in [&mut first, &mut second] {
        for message_type in ["echo", "fail", "teleport", "explode"] {
            kernel
                .handle(AgentMessage::new("tester", "echo", message_type, json!({"n": 1})))
                .await;
        }
    }

    assert!(first.trace().is_replayable_with(second.trace()));
}

#[tokio::test]
async fn test_runtime_survives_handler_panic() {
    let services = SharedServices::in_memory();
    let running = spawn(&services, EchoAgent::new("echo")).await;
    let handle = running.handle().clone();

    let outcome = handle
        .send(AgentMessage::new("tester", "echo", "explode", json!({})))
        .await
        .unwrap();
    assert!(matches!(outcome, HandleOutcome::Failed(_)));

    let outcome = handle
        .send(AgentMessage::new("tester", "echo", "echo", json!(42)))
        .await
        .unwrap();
    assert_eq!(outcome.into_response().and_then(|r| r.data), Some(json!(42)));

    let status = handle.status().await.unwrap();
    assert_eq!(status.stats.messages_processed, 1);
    assert_eq!(status.stats.messages_failed, 1);
    assert_eq!(status.metrics, json!({"echoes": 1}));
    assert!(status.handlers.contains(&"explode".to_string()));

    assert_eq!(running.stop(Duration::from_secs(1)).await, StopOutcome::Graceful);
    assert!(services.directory.is_empty());
}

#[tokio::test]
async fn test_api_request_failures_are_responses() {
    let services = SharedServices::in_memory();
    let running = spawn(&services, EchoAgent::new("echo")).await;

    let response = running
        .handle()
        .api_request("teleport", json!({}))
        .await
        .unwrap();
    assert!(!response.success);
    assert!(response.error.unwrap().contains("teleport"));

    running.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_risk_query_paths() {
    let services = SharedServices::in_memory().with_query_timeout(Duration::from_millis(100));
    let fast = spawn(&services, EchoAgent::new("fast")).await;
    let slow = spawn(&services, EchoAgent::with_query_delay("slow", Duration::from_secs(2))).await;
    let ctx = AgentContext::new("asker", AgentAddress::from_seed("asker"), services.clone());

    let answered = ctx.query_risk("fast", RiskScoreQuery::new("user", "u1")).await;
    assert_eq!(answered.risk_level, "low");
    assert_eq!(answered.responding_agent, "fastAgent");

    let query = RiskScoreQuery::new("user", "u2");
    let timed_out = ctx.query_risk("slow", query.clone()).await;
    assert_eq!(timed_out.query_id, query.query_id);
    assert_eq!(timed_out.risk_level, "timeout");
    assert_eq!(timed_out.risk_score, 0.5);
    assert!(timed_out.is_degraded());

    let faulted = ctx.query_risk("fast", RiskScoreQuery::new("user", "poison")).await;
    assert_eq!(faulted.risk_level, "error");
    assert!(faulted.factors[0].starts_with("Error:"));

    let missing = ctx.query_risk("nobody", RiskScoreQuery::new("user", "u3")).await;
    assert_eq!(missing.risk_level, "unreachable");

    let unsupported = ctx
        .query_fraud("fast", FraudScoreQuery::new("tx_1", "u1"))
        .await;
    assert_eq!(unsupported.recommendation, "review");
    assert!(unsupported.is_degraded());

    fast.stop(Duration::from_secs(1)).await;
    slow.stop(Duration::from_millis(10)).await;
}

#[tokio::test]
async fn test_subscribed_events_reach_the_agent() {
    let services = SharedServices::in_memory();
    let agent = EchoAgent::new("listener");
    let running = spawn(&services, agent.clone()).await;
    let publisher =
        AgentContext::new("gateway", AgentAddress::from_seed("gateway"), services.clone());

    assert_eq!(publisher.publish("transaction.created", json!({"id": "tx_1"})), 1);
    assert_eq!(publisher.publish("merchant.signup", json!({})), 0);

    tokio::time::timeout(Duration::from_secs(2), async {
        while agent.events.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("event should be delivered");

    running.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_stop_aborts_after_grace() {
    let services = SharedServices::in_memory();
    let running = spawn(&services, EchoAgent::new("sleepy")).await;
    let handle = running.handle().clone();

    let pending = tokio::spawn(async move { handle.api_request("sleep", json!(5_000)).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(running.stop(Duration::from_millis(50)).await, StopOutcome::Aborted);
    assert!(services.directory.resolve("sleepy").is_none());
    assert!(pending.await.unwrap().is_err(), "Expected the in-flight request to be dropped");
}
