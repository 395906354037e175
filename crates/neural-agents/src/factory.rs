//! Fleet construction from configuration

use std::collections::BTreeMap;
use std::sync::Arc;

use neural_agent_kernel::{Agent, AgentContext, AgentFactory, AgentSpec, KernelError};
use neural_oracle::Reasoner;
use neural_rules::fraud::{AnomalyScorer, DEFAULT_THRESHOLD};
use neural_types::AgentRole;
use serde::{Deserialize, Serialize};

use crate::{ComplianceAgent, FraudAgent, GrowthAgent, SupportAgent, TreasuryAgent};

/// Which agents to build and how to identify them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSettings {
    /// Fleet-wide seed; role seeds default to `<base_seed>_<role>`
    pub base_seed: Option<String>,
    /// Per-role seed overrides
    pub seeds: BTreeMap<AgentRole, String>,
    pub fraud_threshold: f64,
    pub enabled: Vec<AgentRole>,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            base_seed: None,
            seeds: BTreeMap::new(),
            fraud_threshold: DEFAULT_THRESHOLD,
            enabled: AgentRole::ALL.to_vec(),
        }
    }
}

impl FleetSettings {
    /// Configured override, then the role's env var, then the base seed,
    /// then the role default
    pub fn seed_for(&self, role: AgentRole) -> String {
        if let Some(seed) = self.seeds.get(&role) {
            return seed.clone();
        }
        if let Ok(seed) = std::env::var(role.seed_env()) {
            if !seed.is_empty() {
                return seed;
            }
        }
        match &self.base_seed {
            Some(base) => role.seed_from_base(base),
            None => role.default_seed(),
        }
    }
}

pub struct NeuralAgentFactory {
    settings: FleetSettings,
    reasoner: Arc<Reasoner>,
    scorer: Option<Arc<dyn AnomalyScorer>>,
}

impl NeuralAgentFactory {
    pub fn new(settings: FleetSettings, reasoner: Arc<Reasoner>) -> Self {
        Self {
            settings,
            reasoner,
            scorer: None,
        }
    }

    /// Fitted anomaly model handed to the fraud agent
    pub fn with_scorer(mut self, scorer: Arc<dyn AnomalyScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn settings(&self) -> &FleetSettings {
        &self.settings
    }

    pub fn reasoner(&self) -> &Arc<Reasoner> {
        &self.reasoner
    }
}

impl AgentFactory for NeuralAgentFactory {
    fn roster(&self) -> Vec<AgentSpec> {
        let mut roles = self.settings.enabled.clone();
        roles.sort();
        roles.dedup();
        roles
            .into_iter()
            .map(|role| AgentSpec::for_role(role, self.settings.seed_for(role)))
            .collect()
    }

    fn create(&self, spec: &AgentSpec, ctx: AgentContext) -> Result<Arc<dyn Agent>, KernelError> {
        let Some(role) = spec.role else {
            return Err(KernelError::StartFailed {
                agent: spec.name.clone(),
                message: "No role configured".to_string(),
            });
        };
        let reasoner = self.reasoner.clone();

        let agent: Arc<dyn Agent> = match role {
            AgentRole::Compliance => Arc::new(ComplianceAgent::new(ctx, reasoner)),
            AgentRole::Fraud => {
                let mut agent =
                    FraudAgent::new(ctx, reasoner).with_threshold(self.settings.fraud_threshold);
                if let Some(scorer) = &self.scorer {
                    agent = agent.with_scorer(scorer.clone());
                }
                Arc::new(agent)
            }
            AgentRole::Treasury => Arc::new(TreasuryAgent::new(ctx, reasoner)),
            AgentRole::Growth => Arc::new(GrowthAgent::new(ctx, reasoner)),
            AgentRole::Support => Arc::new(SupportAgent::new(ctx)),
        };
        Ok(agent)
    }
}
