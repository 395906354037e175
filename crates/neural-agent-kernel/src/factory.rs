//! Agent construction seam used by the manager

use std::sync::Arc;

use neural_types::{AgentAddress, AgentRole};

use crate::agent::Agent;
use crate::context::AgentContext;
use crate::error::KernelError;

/// One entry of the roster
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub name: String,
    pub role: Option<AgentRole>,
    pub seed: String,
}

impl AgentSpec {
    pub fn for_role(role: AgentRole, seed: impl Into<String>) -> Self {
        Self {
            name: role.name().to_string(),
            role: Some(role),
            seed: seed.into(),
        }
    }

    pub fn address(&self) -> AgentAddress {
        AgentAddress::from_seed(&self.seed)
    }
}

pub trait AgentFactory: Send + Sync {
    /// Agents to start, in start order
    fn roster(&self) -> Vec<AgentSpec>;

    fn create(&self, spec: &AgentSpec, ctx: AgentContext) -> Result<Arc<dyn Agent>, KernelError>;
}
