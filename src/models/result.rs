//! Step-body return value interpreted by the executor within one pass.

use std::time::Duration;

use super::step::StepId;

/// Target of a linear advance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStepRef {
    /// Follow the step's `next_step`, falling back to the branch
    /// controller's continuation when the step is a branch terminal
    Continue,
    /// Jump to an explicit step id
    Step(StepId),
}

/// What a step body asked the executor to do next.
///
/// `next_steps` and `nested_steps` are mutually exclusive; the builder-facing
/// constructors keep them that way. Ephemeral: produced and consumed within a
/// single executor pass, never persisted.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub next_steps: Vec<NextStepRef>,
    pub nested_steps: Vec<StepId>,
    pub is_error: bool,
    pub retry: bool,
    pub retry_interval: Option<Duration>,
    pub event_name: Option<String>,
    pub event_key: Option<String>,
    pub event_ttl: Option<Duration>,
    pub error_detail: Option<String>,
}

impl ExecutionResult {
    /// Advance to the step's continuation
    pub fn next() -> Self {
        Self {
            next_steps: vec![NextStepRef::Continue],
            ..Self::default()
        }
    }

    /// Jump to explicit step ids
    pub fn next_steps(ids: impl IntoIterator<Item = StepId>) -> Self {
        Self {
            next_steps: ids.into_iter().map(NextStepRef::Step).collect(),
            ..Self::default()
        }
    }

    /// Enter branch sub-graphs as nested pointers
    pub fn branch(entries: impl IntoIterator<Item = StepId>) -> Self {
        Self {
            nested_steps: entries.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Complete with no continuation (End steps)
    pub fn halt() -> Self {
        Self::default()
    }

    /// Request a time-based retry; `is_error` distinguishes a failure
    /// backoff from a deliberate delay
    pub fn retry_after(interval: Duration, is_error: bool) -> Self {
        Self {
            retry: true,
            retry_interval: Some(interval),
            is_error,
            ..Self::default()
        }
    }

    /// Report a failure and let the retry policy pick the interval
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            retry: true,
            is_error: true,
            error_detail: Some(detail.into()),
            ..Self::default()
        }
    }

    /// Park until a matching external event arrives
    pub fn wait_for_event(
        name: impl Into<String>,
        key: impl Into<String>,
        time_to_live: Option<Duration>,
    ) -> Self {
        Self {
            event_name: Some(name.into()),
            event_key: Some(key.into()),
            event_ttl: time_to_live,
            ..Self::default()
        }
    }

    pub fn requests_retry(&self) -> bool {
        self.retry
    }

    pub fn requests_event_wait(&self) -> bool {
        self.event_name.is_some()
    }

    /// A plain completion: the pointer finishes and the graph advances
    pub fn is_completion(&self) -> bool {
        !self.retry && self.event_name.is_none()
    }
}
