//! # System Constants
//!
//! Core constants and operational defaults that define the boundaries of the
//! orchestration engine: lifecycle event names, status groupings, and the
//! fallback values used when a definition does not override them.

use std::time::Duration;

// Re-export state types for convenience
pub use crate::state_machine::{OrchestrationStatus, PointerStatus};

/// Lifecycle event names published on every orchestration transition
pub mod events {
    // Orchestration lifecycle events
    pub const ORCHESTRATION_STARTED: &str = "orchestration.started";
    pub const ORCHESTRATION_SUSPENDED: &str = "orchestration.suspended";
    pub const ORCHESTRATION_RESUMED: &str = "orchestration.resumed";
    pub const ORCHESTRATION_COMPLETED: &str = "orchestration.completed";
    pub const ORCHESTRATION_TERMINATED: &str = "orchestration.terminated";
    pub const ORCHESTRATION_ERROR: &str = "orchestration.error";

    // Step lifecycle events
    pub const STEP_STARTED: &str = "step.started";
    pub const STEP_COMPLETED: &str = "step.completed";
    pub const STEP_SUSPENDED: &str = "step.suspended";
}

/// Status groupings used by executor selection and completion checks
pub mod status_groups {
    use crate::state_machine::{OrchestrationStatus, PointerStatus};

    /// Instance statuses in which an executor pass may run
    pub const RUNNABLE_INSTANCE_STATUSES: [OrchestrationStatus; 2] = [
        OrchestrationStatus::Running,
        OrchestrationStatus::Executing,
    ];

    /// Instance statuses from which no further transitions are allowed
    pub const TERMINAL_INSTANCE_STATUSES: [OrchestrationStatus; 2] = [
        OrchestrationStatus::Completed,
        OrchestrationStatus::Terminated,
    ];

    /// Pointer statuses that still require executor attention
    pub const ATTENTION_POINTER_STATUSES: [PointerStatus; 4] = [
        PointerStatus::Pending,
        PointerStatus::InProcess,
        PointerStatus::Retrying,
        PointerStatus::WaitingForEvent,
    ];
}

/// Engine-wide defaults applied when neither the definition nor the
/// configuration overrides them
pub mod system {
    use super::Duration;

    /// Idle interval between worker polls when no pointers are due
    pub const DEFAULT_WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Distributed-lock expiration applied to a pointer execution
    pub const DEFAULT_LOCK_EXPIRATION: Duration = Duration::from_secs(30);

    /// Retry attempts granted before a failing step suspends the orchestration
    pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

    /// Base delay for the exponential retry backoff schedule
    pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

    /// Upper bound for any computed retry delay
    pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

    /// Multiplier applied per retry attempt
    pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Capacity of the lifecycle broadcast channel
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;
}
