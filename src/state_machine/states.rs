use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestration instance state definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    /// Instance exists and has runnable or sleeping pointers
    Running,
    /// Instance is currently being advanced by an executor pass
    Executing,
    /// Instance was suspended by policy or operator and awaits resume
    Suspended,
    /// Instance reached an End step with all pointers completed
    Completed,
    /// Instance was terminated by an operator or a fatal executor error
    Terminated,
}

impl OrchestrationStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Terminated)
    }

    /// Check if an executor pass may advance an instance in this state
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Running | Self::Executing)
    }

    /// Check whether a transition into `target` is legal for the
    /// controller's lifecycle operations
    pub fn can_transition_to(&self, target: OrchestrationStatus) -> bool {
        match (self, target) {
            // Executor pass entry and exit
            (Self::Running, Self::Executing) => true,
            (Self::Executing, Self::Running) => true,
            // Suspend: only a runnable instance can be suspended
            (Self::Running | Self::Executing, Self::Suspended) => true,
            // Resume: only a suspended instance can be resumed
            (Self::Suspended, Self::Running) => true,
            // Completion happens from within a pass
            (Self::Running | Self::Executing, Self::Completed) => true,
            // Terminate: any non-terminated instance
            (from, Self::Terminated) => !matches!(from, Self::Terminated),
            _ => false,
        }
    }
}

impl fmt::Display for OrchestrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Executing => write!(f, "executing"),
            Self::Suspended => write!(f, "suspended"),
            Self::Completed => write!(f, "completed"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

impl std::str::FromStr for OrchestrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "executing" => Ok(Self::Executing),
            "suspended" => Ok(Self::Suspended),
            "completed" => Ok(Self::Completed),
            "terminated" => Ok(Self::Terminated),
            _ => Err(format!("Invalid orchestration status: {s}")),
        }
    }
}

impl Default for OrchestrationStatus {
    fn default() -> Self {
        Self::Running
    }
}

/// Execution pointer state definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerStatus {
    /// Pointer was created and has not been visited yet
    Pending,
    /// Pointer's step body is being executed
    InProcess,
    /// Pointer is sleeping until its retry delay elapses
    Retrying,
    /// Pointer is parked until a correlated external event arrives
    WaitingForEvent,
    /// Pointer exhausted its retry budget or hit a structural error
    Suspended,
    /// Pointer finished; completed pointers are immutable history
    Completed,
}

impl PointerStatus {
    /// Check if this is a terminal state for the pointer
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if the pointer still requires executor attention
    pub fn requires_attention(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::InProcess | Self::Retrying | Self::WaitingForEvent
        )
    }
}

impl fmt::Display for PointerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProcess => write!(f, "in_process"),
            Self::Retrying => write!(f, "retrying"),
            Self::WaitingForEvent => write!(f, "waiting_for_event"),
            Self::Suspended => write!(f, "suspended"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for PointerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_process" => Ok(Self::InProcess),
            "retrying" => Ok(Self::Retrying),
            "waiting_for_event" => Ok(Self::WaitingForEvent),
            "suspended" => Ok(Self::Suspended),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid pointer status: {s}")),
        }
    }
}

impl Default for PointerStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestration_status_terminal_check() {
        assert!(OrchestrationStatus::Completed.is_terminal());
        assert!(OrchestrationStatus::Terminated.is_terminal());
        assert!(!OrchestrationStatus::Running.is_terminal());
        assert!(!OrchestrationStatus::Executing.is_terminal());
        assert!(!OrchestrationStatus::Suspended.is_terminal());
    }

    #[test]
    fn test_suspend_resume_transitions() {
        assert!(OrchestrationStatus::Running.can_transition_to(OrchestrationStatus::Suspended));
        assert!(OrchestrationStatus::Executing.can_transition_to(OrchestrationStatus::Suspended));
        assert!(OrchestrationStatus::Suspended.can_transition_to(OrchestrationStatus::Running));
        assert!(!OrchestrationStatus::Completed.can_transition_to(OrchestrationStatus::Running));
        assert!(!OrchestrationStatus::Suspended.can_transition_to(OrchestrationStatus::Executing));
    }

    #[test]
    fn test_terminate_from_any_non_terminal_state() {
        assert!(OrchestrationStatus::Running.can_transition_to(OrchestrationStatus::Terminated));
        assert!(OrchestrationStatus::Suspended.can_transition_to(OrchestrationStatus::Terminated));
        assert!(OrchestrationStatus::Completed.can_transition_to(OrchestrationStatus::Terminated));
        assert!(!OrchestrationStatus::Terminated.can_transition_to(OrchestrationStatus::Terminated));
    }

    #[test]
    fn test_pointer_attention_check() {
        assert!(PointerStatus::Pending.requires_attention());
        assert!(PointerStatus::Retrying.requires_attention());
        assert!(PointerStatus::WaitingForEvent.requires_attention());
        assert!(!PointerStatus::Completed.requires_attention());
        assert!(!PointerStatus::Suspended.requires_attention());
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(OrchestrationStatus::Executing.to_string(), "executing");
        assert_eq!(
            "suspended".parse::<OrchestrationStatus>().unwrap(),
            OrchestrationStatus::Suspended
        );

        assert_eq!(PointerStatus::WaitingForEvent.to_string(), "waiting_for_event");
        assert_eq!(
            "in_process".parse::<PointerStatus>().unwrap(),
            PointerStatus::InProcess
        );
    }

    #[test]
    fn test_status_serde() {
        let status = OrchestrationStatus::Executing;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"executing\"");

        let parsed: PointerStatus = serde_json::from_str("\"waiting_for_event\"").unwrap();
        assert_eq!(parsed, PointerStatus::WaitingForEvent);
    }
}
