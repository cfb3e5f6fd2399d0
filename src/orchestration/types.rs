//! Shared types for the orchestration runtime: the pass outcome the worker
//! schedules on, and the trait user orchestrations implement to register
//! their step graph.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::builder::{DefinitionError, OrchestrationBuilder};
use crate::state_machine::OrchestrationStatus;

/// Result of one executor pass over an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPassOutcome {
    /// Pointers were advanced; more work may exist
    Advanced { pointers_executed: usize },
    /// Nothing was runnable; wait for the idle timer or an external wake
    Idle,
    /// The orchestration reached completion during this pass
    Completed,
    /// The orchestration was suspended during this pass
    Suspended,
    /// The orchestration was terminated (operator or fatal executor error)
    Terminated,
    /// The distributed lock was contended; pass aborted with no side effects
    LockUnavailable,
    /// Another pass for this instance is already in flight in this process
    AlreadyExecuting,
    /// The instance status does not permit execution
    NotRunnable(OrchestrationStatus),
}

impl ExecutionPassOutcome {
    /// Whether the instance worker should stop rescheduling passes
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Completed | Self::Terminated => true,
            Self::NotRunnable(status) => status.is_terminal(),
            _ => false,
        }
    }
}

/// A user-defined orchestration: payload type, identity, and step graph.
///
/// Implementations are registered through
/// [`crate::orchestration::OrchestrationController::register_orchestration`],
/// which builds and validates the definition once.
pub trait Orchestration: Send + Sync + 'static {
    type Data: Serialize + DeserializeOwned + Send + Sync + 'static;

    fn definition_id(&self) -> &str;

    fn version(&self) -> i32 {
        1
    }

    /// Populate the builder with the orchestration's step graph
    fn build(&self, builder: &mut OrchestrationBuilder<Self::Data>) -> Result<(), DefinitionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_outcomes() {
        assert!(ExecutionPassOutcome::Completed.is_terminal());
        assert!(ExecutionPassOutcome::Terminated.is_terminal());
        assert!(
            ExecutionPassOutcome::NotRunnable(OrchestrationStatus::Terminated).is_terminal()
        );
        assert!(
            !ExecutionPassOutcome::NotRunnable(OrchestrationStatus::Suspended).is_terminal()
        );
        assert!(!ExecutionPassOutcome::Idle.is_terminal());
        assert!(!ExecutionPassOutcome::LockUnavailable.is_terminal());
    }
}
