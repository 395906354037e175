use thiserror::Error;

use crate::manager::ManagerState;

/// Errors from fleet lifecycle operations
///
/// Request routing never fails with these; routing problems come back as
/// failed `AgentResponse`s.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Manager is {actual}, expected {expected}")]
    InvalidState {
        expected: ManagerState,
        actual: ManagerState,
    },

    #[error("No agent could be started ({failures} failed)")]
    NoAgentsStarted { failures: usize },
}

pub type Result<T> = std::result::Result<T, ManagerError>;
