use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use neural_agent_kernel::{
    Agent, AgentContext, AgentFactory, AgentKernel, AgentProfile, AgentSpec, HandlerError,
    KernelError, RuntimeConfig, SharedServices,
};
use neural_agents::{FleetSettings, NeuralAgentFactory};
use neural_manager::{AgentManager, ManagerConfig, ManagerError, ManagerState};
use neural_oracle::Reasoner;
use neural_types::{AgentMessage, AgentRole};

#[derive(Clone, Copy)]
enum Behaviour {
    Echo,
    Faulty,
    Sleepy,
    RefusesToStart,
}

struct TestAgent {
    profile: AgentProfile,
    behaviour: Behaviour,
}

#[async_trait]
impl Agent for TestAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn register_handlers(self: Arc<Self>, kernel: &mut AgentKernel) {
        kernel.register_handler("ping", |message: AgentMessage| async move {
            Ok(json!({"pong": message.payload}))
        });
    }

    async fn on_start(&self) -> Result<(), HandlerError> {
        match self.behaviour {
            Behaviour::RefusesToStart => Err(HandlerError::failed("missing credentials")),
            _ => Ok(()),
        }
    }

    async fn handle_api_request(
        &self,
        message_type: &str,
        data: Value,
    ) -> Result<Value, HandlerError> {
        match self.behaviour {
            Behaviour::Faulty => Err(HandlerError::failed("ledger offline")),
            Behaviour::Sleepy => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(data)
            }
            _ => Ok(json!({
                "agent": self.profile.name,
                "message_type": message_type,
                "data": data
            })),
        }
    }

    fn metrics(&self) -> Value {
        json!({"kind": "test"})
    }
}

struct TestFactory {
    roster: Vec<(&'static str, Behaviour)>,
}

impl TestFactory {
    fn behaviour(&self, name: &str) -> Option<Behaviour> {
        self.roster.iter().find(|(n, _)| *n == name).map(|(_, b)| *b)
    }
}

impl AgentFactory for TestFactory {
    fn roster(&self) -> Vec<AgentSpec> {
        self.roster
            .iter()
            .map(|(name, _)| AgentSpec {
                name: name.to_string(),
                role: None,
                seed: format!("{}-seed", name),
            })
            .collect()
    }

    fn create(&self, spec: &AgentSpec, ctx: AgentContext) -> Result<Arc<dyn Agent>, KernelError> {
        let behaviour = self.behaviour(&spec.name).ok_or_else(|| KernelError::StartFailed {
            agent: spec.name.clone(),
            message: "not in roster".to_string(),
        })?;
        Ok(Arc::new(TestAgent {
            profile: AgentProfile {
                name: spec.name.clone(),
                display_name: format!("{}Agent", spec.name),
                address: ctx.address().clone(),
                role: None,
                description: "Test agent".to_string(),
                capabilities: Vec::new(),
            },
            behaviour,
        }))
    }
}

fn config() -> ManagerConfig {
    ManagerConfig {
        runtime: RuntimeConfig::default(),
        request_timeout: Duration::from_millis(200),
        grace_period: Duration::from_millis(100),
    }
}

fn manager(roster: Vec<(&'static str, Behaviour)>) -> AgentManager {
    AgentManager::new(SharedServices::in_memory(), Arc::new(TestFactory { roster }), config())
}

#[tokio::test]
async fn test_start_isolates_failures() {
    let manager = manager(vec![
        ("alpha", Behaviour::Echo),
        ("broken", Behaviour::RefusesToStart),
        ("beta", Behaviour::Echo),
    ]);

    let report = manager.start().await.unwrap();
    assert_eq!(report.started, vec!["alpha", "beta"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "broken");
    assert!(!report.is_complete());
    assert_eq!(manager.state().await, ManagerState::Running);

    assert!(matches!(
        manager.start().await,
        Err(ManagerError::InvalidState { actual: ManagerState::Running, .. })
    ));

    let report = manager.stop().await.unwrap();
    assert_eq!(report.graceful.len(), 2);
    assert_eq!(manager.state().await, ManagerState::Stopped);
    assert!(manager.services().directory.is_empty());
}

#[tokio::test]
async fn test_nothing_started_is_an_error() {
    let manager = manager(vec![("broken", Behaviour::RefusesToStart)]);
    assert!(matches!(
        manager.start().await,
        Err(ManagerError::NoAgentsStarted { failures: 1 })
    ));
    assert_eq!(manager.state().await, ManagerState::Stopped);
}

#[tokio::test]
async fn test_send_to_agent_never_errors() {
    let manager = manager(vec![("alpha", Behaviour::Echo), ("gamma", Behaviour::Faulty)]);

    let before_start = manager.send_to_agent("alpha", "ping", json!({})).await;
    assert!(!before_start.success);
    assert_eq!(before_start.error.as_deref(), Some("Agent manager is stopped"));

    manager.start().await.unwrap();

    let ok = manager.send_to_agent("alpha", "ping", json!({"n": 1})).await;
    assert!(ok.success);
    assert_eq!(ok.agent_id, "alphaAgent");
    assert_eq!(ok.data.unwrap()["data"], json!({"n": 1}));

    let faulty = manager.send_to_agent("gamma", "ping", json!({})).await;
    assert!(!faulty.success);
    assert_eq!(faulty.error.as_deref(), Some("ledger offline"));

    let missing = manager.send_to_agent("nobody", "ping", json!({})).await;
    assert_eq!(missing.error.as_deref(), Some("Agent not found: nobody"));

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_broadcast_collects_every_target() {
    let manager = manager(vec![
        ("alpha", Behaviour::Echo),
        ("beta", Behaviour::Echo),
        ("gamma", Behaviour::Faulty),
    ]);
    manager.start().await.unwrap();

    let results = manager.broadcast_to_agents("ping", json!({"hello": true}), None).await;
    assert_eq!(results.len(), 3);
    assert!(results["alpha"].success);
    assert!(results["beta"].success);
    assert!(!results["gamma"].success);

    let targets = vec!["alpha".to_string(), "ghost".to_string()];
    let results = manager
        .broadcast_to_agents("ping", json!({}), Some(&targets))
        .await;
    assert_eq!(results.len(), 2);
    assert!(results["alpha"].success);
    assert_eq!(results["ghost"].error.as_deref(), Some("Agent not found: ghost"));

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_slow_agent_times_out_and_is_cancelled() {
    let manager = manager(vec![("sloth", Behaviour::Sleepy)]);
    manager.start().await.unwrap();

    let response = manager.send_to_agent("sloth", "ping", json!({})).await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("timed out"));

    // The loop is still inside the abandoned request
    let report = manager.stop().await.unwrap();
    assert_eq!(report.aborted, vec!["sloth"]);
    assert!(manager.services().directory.is_empty());
}

#[tokio::test]
async fn test_deliver_by_name_and_address() {
    let manager = manager(vec![("alpha", Behaviour::Echo)]);
    manager.start().await.unwrap();

    let by_name = manager
        .deliver(AgentMessage::new("gateway", "alpha", "ping", json!(1)))
        .await
        .unwrap();
    assert_eq!(by_name.data, Some(json!({"pong": 1})));

    let address = manager.get_agent_status("alpha").await.unwrap().address;
    let by_address = manager
        .deliver(AgentMessage::new("gateway", address.as_str(), "ping", json!(2)))
        .await
        .unwrap();
    assert!(by_address.success);

    let unhandled = manager
        .deliver(AgentMessage::new("gateway", "alpha", "teleport", json!({})))
        .await;
    assert!(unhandled.is_none());

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_status_reports_counters_and_metrics() {
    let manager = manager(vec![("alpha", Behaviour::Echo), ("gamma", Behaviour::Faulty)]);
    manager.start().await.unwrap();

    manager.send_to_agent("alpha", "ping", json!({})).await;
    manager.send_to_agent("gamma", "ping", json!({})).await;

    let alpha = manager.get_agent_status("alpha").await.unwrap();
    assert!(alpha.running);
    assert_eq!(alpha.stats.api_requests, 1);
    assert_eq!(alpha.metrics, json!({"kind": "test"}));
    assert_eq!(alpha.handlers, vec!["ping"]);

    let summary = manager.all_status().await;
    assert_eq!(summary.state, ManagerState::Running);
    assert_eq!(summary.running_agents, 2);
    let gamma = summary.agents.iter().find(|a| a.name == "gamma").unwrap();
    assert_eq!(gamma.stats.api_failures, 1);
    assert_eq!(gamma.stats.last_error.as_deref(), Some("ledger offline"));

    assert!(manager.get_agent_status("ghost").await.is_none());
    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_neural_fleet_end_to_end() {
    let factory =
        NeuralAgentFactory::new(FleetSettings::default(), Arc::new(Reasoner::fallback_only()));
    let manager = AgentManager::new(
        SharedServices::in_memory(),
        Arc::new(factory),
        ManagerConfig::default(),
    );

    let report = manager.start().await.unwrap();
    assert_eq!(report.started.len(), AgentRole::ALL.len());

    let response = manager
        .send_to_agent(
            "compliance",
            "compliance_check",
            json!({
                "entity_type": "transaction",
                "entity_id": "tx_1",
                "data": {
                    "transaction_id": "tx_1",
                    "kyc_status": "not_verified",
                    "estimated_amount": 15000.0,
                    "tx_count_24h": 60,
                    "country": "KP"
                }
            }),
        )
        .await;
    assert!(response.success, "{:?}", response.error);
    let data = response.data.unwrap();
    assert_eq!(data["action"], "block");
    assert_eq!(data["passed"], false);

    let unknown = manager.send_to_agent("growth", "compliance_check", json!({})).await;
    assert!(!unknown.success);

    let report = manager.stop().await.unwrap();
    assert!(report.aborted.is_empty());
}
