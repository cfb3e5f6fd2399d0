//! Immutable, validated orchestration definition. Built exactly once by the
//! builder, registered by `(id, version)`, and shared read-only across every
//! instance and thread.

use std::collections::HashMap;
use std::time::Duration;

use super::step::{OrchestrationStep, RetryPolicy, StepId};

#[derive(Debug, Clone)]
pub struct OrchestrationDefinition {
    pub id: String,
    pub version: i32,
    /// Type name of the payload the definition was built for; checked when
    /// an orchestration is started
    pub data_type: &'static str,
    steps: Vec<OrchestrationStep>,
    index: HashMap<StepId, usize>,
    first_step: Option<StepId>,
    pub default_retry_policy: RetryPolicy,
    pub default_lock_expiration: Duration,
    pub worker_idle_timeout: Duration,
    pub is_singleton: bool,
    /// Await lifecycle subscribers inline instead of detaching them
    pub await_lifecycle_events: bool,
}

impl OrchestrationDefinition {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: String,
        version: i32,
        data_type: &'static str,
        steps: Vec<OrchestrationStep>,
        first_step: Option<StepId>,
        default_retry_policy: RetryPolicy,
        default_lock_expiration: Duration,
        worker_idle_timeout: Duration,
        is_singleton: bool,
        await_lifecycle_events: bool,
    ) -> Self {
        let index = steps
            .iter()
            .enumerate()
            .map(|(position, step)| (step.id, position))
            .collect();

        Self {
            id,
            version,
            data_type,
            steps,
            index,
            first_step,
            default_retry_policy,
            default_lock_expiration,
            worker_idle_timeout,
            is_singleton,
            await_lifecycle_events,
        }
    }

    /// Resolve a step by id
    pub fn step(&self, id: StepId) -> Option<&OrchestrationStep> {
        self.index.get(&id).map(|position| &self.steps[*position])
    }

    pub fn steps(&self) -> &[OrchestrationStep] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Entry step of the graph; always present for a built definition
    pub fn first_step(&self) -> Option<StepId> {
        self.first_step
    }

    /// Lock expiration for a pointer at `step_id`: step override else the
    /// definition default
    pub fn lock_expiration_for(&self, step_id: StepId) -> Duration {
        self.step(step_id)
            .and_then(|step| step.lock_expiration)
            .unwrap_or(self.default_lock_expiration)
    }

    /// Retry policy for a pointer at `step_id`
    pub fn retry_policy_for(&self, step_id: StepId) -> &RetryPolicy {
        self.step(step_id)
            .and_then(|step| step.retry_policy.as_ref())
            .unwrap_or(&self.default_retry_policy)
    }
}
