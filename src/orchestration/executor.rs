//! # Orchestration Executor
//!
//! The runtime state machine that advances an instance's pointer forest:
//! selects runnable pointers (including elapsed retries and matched event
//! waits), serializes execution under the distributed lock, runs step
//! bodies, interprets their results into pointer transitions and new
//! pointers, applies the retry/suspend policy, and detects completion.
//!
//! ## State transitions
//!
//! - Instance: `Running -> Executing -> {Running, Suspended, Terminated,
//!   Completed}`; `Executing` reverts to `Running` on every exit path unless
//!   the pass suspended or terminated the instance.
//! - Pointer: `Pending -> InProcess -> {Completed, Retrying,
//!   WaitingForEvent, Suspended}`. Elapsed `Retrying` pointers are collapsed
//!   into a fresh pending pointer at the same step carrying the retry count,
//!   keeping history append-only.
//!
//! ## Failure containment
//!
//! Step-body failures route through the retry/suspend policy and never
//! escape the pass. Structural violations suspend the orchestration.
//! Anything else that escapes the pass force-terminates the instance,
//! best effort.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::events::{LifeCycleEvent, LifeCycleEventPublisher};
use crate::locking::DistributedLockProvider;
use crate::models::{
    BodyFactory, BranchKey, ExecutionPointer, ExecutionResult, HandlerSpec, NextStepRef,
    OrchestrationInstanceRecord, OrchestrationStep, StepKind,
};
use crate::persistence::OrchestrationRepository;
use crate::state_machine::{OrchestrationStatus, PointerStatus};
use crate::utils::Clock;

use super::backoff::BackoffCalculator;
use super::errors::{OrchestrationError, OrchestrationResult};
use super::instance::OrchestrationInstance;
use super::pointer_factory::ExecutionPointerFactory;
use super::types::ExecutionPassOutcome;

/// What a single step execution produced
enum StepOutcome {
    Completed(ExecutionResult),
    Failed(String),
}

pub struct OrchestrationExecutor {
    repository: Arc<dyn OrchestrationRepository>,
    lock_provider: Arc<dyn DistributedLockProvider>,
    lifecycle: LifeCycleEventPublisher,
    pointer_factory: ExecutionPointerFactory,
    backoff: BackoffCalculator,
    clock: Arc<dyn Clock>,
    lock_owner: String,
}

impl OrchestrationExecutor {
    pub fn new(
        repository: Arc<dyn OrchestrationRepository>,
        lock_provider: Arc<dyn DistributedLockProvider>,
        lifecycle: LifeCycleEventPublisher,
        clock: Arc<dyn Clock>,
        lock_owner: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            lock_provider,
            lifecycle,
            pointer_factory: ExecutionPointerFactory::new(),
            backoff: BackoffCalculator::new(),
            clock,
            lock_owner: lock_owner.into(),
        }
    }

    pub fn pointer_factory(&self) -> &ExecutionPointerFactory {
        &self.pointer_factory
    }

    pub fn lifecycle(&self) -> &LifeCycleEventPublisher {
        &self.lifecycle
    }

    /// Run one executor pass over the instance.
    ///
    /// Re-entrant calls in the same process observe `AlreadyExecuting`.
    /// Unhandled errors force-terminate the instance rather than escaping.
    pub async fn execute(&self, instance: &OrchestrationInstance) -> ExecutionPassOutcome {
        let Ok(_pass_guard) = instance.pass_lock.try_lock() else {
            return ExecutionPassOutcome::AlreadyExecuting;
        };

        match self.execute_internal(instance).await {
            Ok(outcome) => outcome,
            Err(error) => self.terminate_on_fatal(instance, error).await,
        }
    }

    async fn execute_internal(
        &self,
        instance: &OrchestrationInstance,
    ) -> OrchestrationResult<ExecutionPassOutcome> {
        let record = self.load_instance(instance.id()).await?;
        if !record.status.is_runnable() {
            instance.set_cached_status(record.status);
            return Ok(ExecutionPassOutcome::NotRunnable(record.status));
        }

        self.repository
            .update_orchestration_status(instance.id(), OrchestrationStatus::Executing, None)
            .await?;
        instance.set_cached_status(OrchestrationStatus::Executing);

        let mut lock_held = false;
        let advance = self.advance_pointers(instance, &mut lock_held).await;

        // Lock release and the Executing -> Running revert happen on every
        // exit path, including errors.
        if lock_held {
            if let Err(e) = self
                .lock_provider
                .release_lock(&instance.lock_key(), &self.lock_owner)
                .await
            {
                warn!(
                    instance_id = %instance.id(),
                    error = %e,
                    "distributed lock release failed"
                );
            }
        }

        let current = self.load_instance(instance.id()).await?;
        if current.status == OrchestrationStatus::Executing {
            self.repository
                .update_orchestration_status(instance.id(), OrchestrationStatus::Running, None)
                .await?;
            instance.set_cached_status(OrchestrationStatus::Running);
        } else {
            instance.set_cached_status(current.status);
        }

        advance
    }

    /// Core loop: re-fetch runnable pointers until none remain, then check
    /// for completion
    async fn advance_pointers(
        &self,
        instance: &OrchestrationInstance,
        lock_held: &mut bool,
    ) -> OrchestrationResult<ExecutionPassOutcome> {
        let mut pointers_executed = 0usize;

        loop {
            let record = self.load_instance(instance.id()).await?;
            if !record.status.is_runnable() {
                return Ok(Self::outcome_for_status(record.status, pointers_executed));
            }

            let runnable = self.collect_runnable_pointers(instance).await?;
            if runnable.is_empty() {
                break;
            }

            for pointer_id in runnable {
                let record = self.load_instance(instance.id()).await?;
                if !record.status.is_runnable() {
                    return Ok(Self::outcome_for_status(record.status, pointers_executed));
                }

                let Some(mut pointer) = self.find_pointer(instance.id(), pointer_id).await? else {
                    continue;
                };
                if !pointer.active {
                    continue;
                }

                if !*lock_held {
                    let expiration = instance.definition().lock_expiration_for(pointer.step_id);
                    let expires_at = self.now() + Self::chrono_duration(expiration)?;
                    let acquisition = self
                        .lock_provider
                        .acquire_lock(&instance.lock_key(), &self.lock_owner, expires_at)
                        .await?;
                    if !acquisition.succeeded {
                        debug!(
                            instance_id = %instance.id(),
                            lock_key = %instance.lock_key(),
                            "distributed lock contended; deferring pass to idle timer"
                        );
                        return Ok(ExecutionPassOutcome::LockUnavailable);
                    }
                    *lock_held = true;
                }

                self.execute_pointer(instance, &mut pointer).await?;
                pointers_executed += 1;
            }
        }

        // A pointer may have suspended or an operator may have intervened
        // while the loop was draining; report the final status faithfully.
        let record = self.load_instance(instance.id()).await?;
        if !record.status.is_runnable() {
            return Ok(Self::outcome_for_status(record.status, pointers_executed));
        }

        if self.determine_orchestration_completed(instance).await? {
            return Ok(ExecutionPassOutcome::Completed);
        }

        Ok(if pointers_executed > 0 {
            ExecutionPassOutcome::Advanced { pointers_executed }
        } else {
            ExecutionPassOutcome::Idle
        })
    }

    fn outcome_for_status(
        status: OrchestrationStatus,
        pointers_executed: usize,
    ) -> ExecutionPassOutcome {
        match status {
            OrchestrationStatus::Suspended => ExecutionPassOutcome::Suspended,
            OrchestrationStatus::Terminated => ExecutionPassOutcome::Terminated,
            OrchestrationStatus::Completed => ExecutionPassOutcome::Completed,
            _ if pointers_executed > 0 => ExecutionPassOutcome::Advanced { pointers_executed },
            _ => ExecutionPassOutcome::Idle,
        }
    }

    /// Select pointers for this iteration: active non-sleeping pointers,
    /// elapsed retries (collapsed into fresh pointers), and event waits
    /// whose correlated event arrived
    async fn collect_runnable_pointers(
        &self,
        instance: &OrchestrationInstance,
    ) -> OrchestrationResult<Vec<Uuid>> {
        let now = self.now();
        let pointers = self
            .repository
            .get_execution_pointers(instance.id())
            .await?;
        let mut runnable = Vec::new();

        for pointer in &pointers {
            match pointer.status {
                PointerStatus::Retrying => {
                    if pointer.active && !pointer.is_sleeping(now) {
                        let promoted = self.promote_retrying_pointer(instance, pointer).await?;
                        runnable.push(promoted);
                    }
                }
                PointerStatus::WaitingForEvent => {
                    if let Some(promoted) =
                        self.try_promote_event_pointer(instance, pointer, now).await?
                    {
                        runnable.push(promoted);
                    }
                }
                _ => {
                    if pointer.is_runnable(now) {
                        runnable.push(pointer.id);
                    }
                }
            }
        }

        Ok(runnable)
    }

    /// Collapse an elapsed retrying pointer: completed history entry plus a
    /// fresh pointer at the same step carrying the retry budget
    async fn promote_retrying_pointer(
        &self,
        instance: &OrchestrationInstance,
        pointer: &ExecutionPointer,
    ) -> OrchestrationResult<Uuid> {
        let mut history = pointer.clone();
        history.mark_completed(self.now());
        self.repository
            .update_execution_pointer(instance.id(), &history)
            .await?;

        let fresh = self
            .pointer_factory
            .build_retry_pointer(instance.definition(), pointer)
            .ok_or_else(|| self.unresolvable_step(instance, pointer.step_id))?;
        self.repository
            .add_execution_pointer(instance.id(), &fresh)
            .await?;

        debug!(
            instance_id = %instance.id(),
            step_id = %pointer.step_id,
            retry_count = fresh.retry_count,
            "retrying pointer promoted for re-execution"
        );
        Ok(fresh.id)
    }

    /// Try to match an unprocessed event to a waiting pointer. The event is
    /// claimed atomically before the pointer is woken, so a concurrent
    /// fetch of the same event can never activate two pointers. A wait
    /// whose TTL passed is suspended instead.
    async fn try_promote_event_pointer(
        &self,
        instance: &OrchestrationInstance,
        pointer: &ExecutionPointer,
        now: DateTime<Utc>,
    ) -> OrchestrationResult<Option<Uuid>> {
        let (Some(event_name), Some(event_key)) = (&pointer.event_name, &pointer.event_key) else {
            return Err(OrchestrationError::StructuralViolation {
                instance_id: instance.id(),
                detail: format!("pointer {} is waiting without an event correlation", pointer.id),
            });
        };

        if let Some(ttl) = pointer.event_ttl {
            if now > ttl {
                let mut expired = pointer.clone();
                let step = self.resolve_step(instance, pointer.step_id)?;
                warn!(
                    instance_id = %instance.id(),
                    event_name = %event_name,
                    event_key = %event_key,
                    "event wait expired without a matching event"
                );
                self.suspend_pointer(instance, &mut expired, &step).await?;
                return Ok(None);
            }
        }

        let events = self
            .repository
            .get_unprocessed_events(event_name, event_key)
            .await?;
        for event in events {
            if self.repository.try_mark_event_processed(event.id).await? {
                let mut woken = pointer.clone();
                woken.event_data = Some(event.payload);
                woken.status = PointerStatus::InProcess;
                woken.active = true;
                self.repository
                    .update_execution_pointer(instance.id(), &woken)
                    .await?;

                info!(
                    instance_id = %instance.id(),
                    event_name = %event.name,
                    event_key = %event.key,
                    "event matched; waiting pointer promoted"
                );
                return Ok(Some(woken.id));
            }
        }

        Ok(None)
    }

    async fn execute_pointer(
        &self,
        instance: &OrchestrationInstance,
        pointer: &mut ExecutionPointer,
    ) -> OrchestrationResult<()> {
        let step = self.resolve_step(instance, pointer.step_id)?;

        self.initialize_step(instance, pointer, &step).await?;

        let outcome = self.execute_step(instance, pointer, &step).await;
        match outcome {
            Ok(StepOutcome::Completed(result)) => {
                match self
                    .process_execution_result(instance, pointer, &step, result)
                    .await
                {
                    Ok(()) => Ok(()),
                    Err(OrchestrationError::StructuralViolation { detail, .. }) => {
                        error!(
                            instance_id = %instance.id(),
                            step = %step.name,
                            detail = %detail,
                            "structural violation; suspending orchestration"
                        );
                        self.suspend_pointer(instance, pointer, &step).await
                    }
                    Err(other) => Err(other),
                }
            }
            Ok(StepOutcome::Failed(detail)) => {
                self.retry_or_suspend(instance, pointer, &step, true, None, detail)
                    .await
            }
            Err(OrchestrationError::StructuralViolation { detail, .. }) => {
                error!(
                    instance_id = %instance.id(),
                    step = %step.name,
                    detail = %detail,
                    "structural violation; suspending orchestration"
                );
                self.suspend_pointer(instance, pointer, &step).await
            }
            Err(other) => Err(other),
        }
    }

    /// First visit marks the pointer in-process and announces the step
    async fn initialize_step(
        &self,
        instance: &OrchestrationInstance,
        pointer: &mut ExecutionPointer,
        step: &Arc<OrchestrationStep>,
    ) -> OrchestrationResult<()> {
        if pointer.status != PointerStatus::Pending {
            return Ok(());
        }

        pointer.status = PointerStatus::InProcess;
        pointer.start_time = Some(self.now());
        self.repository
            .update_execution_pointer(instance.id(), pointer)
            .await?;

        self.publish(
            instance,
            LifeCycleEvent::StepStarted {
                instance_id: instance.id(),
                step_id: step.id,
                pointer_id: pointer.id,
                step_name: step.name.clone(),
                at: self.now(),
            },
        )
        .await;
        Ok(())
    }

    /// Run the step body or interpret the control-step kind
    async fn execute_step(
        &self,
        instance: &OrchestrationInstance,
        pointer: &ExecutionPointer,
        step: &Arc<OrchestrationStep>,
    ) -> OrchestrationResult<StepOutcome> {
        match &step.kind {
            StepKind::Handler(spec) => self.run_handler(instance, pointer, step, spec).await,

            StepKind::If { condition } => {
                let data = instance.data_snapshot();
                let verdict = condition(&data).map_err(|e| self.structural(instance, step, e))?;
                if verdict {
                    let entry = step
                        .branch_entry(&BranchKey::Bool(true))
                        .ok_or_else(|| self.missing_branch(instance, step, "true"))?;
                    Ok(StepOutcome::Completed(ExecutionResult::branch([entry])))
                } else if let Some(entry) = step.branch_entry(&BranchKey::Bool(false)) {
                    Ok(StepOutcome::Completed(ExecutionResult::branch([entry])))
                } else {
                    Ok(StepOutcome::Completed(ExecutionResult::next()))
                }
            }

            StepKind::While { condition } => {
                let data = instance.data_snapshot();
                let verdict = condition(&data).map_err(|e| self.structural(instance, step, e))?;
                if verdict {
                    let entry = step
                        .branch_entry(&BranchKey::Index(0))
                        .ok_or_else(|| self.missing_branch(instance, step, "loop body"))?;
                    Ok(StepOutcome::Completed(ExecutionResult::branch([entry])))
                } else {
                    Ok(StepOutcome::Completed(ExecutionResult::next()))
                }
            }

            StepKind::Switch { selector } => {
                let data = instance.data_snapshot();
                let discriminator =
                    selector(&data).map_err(|e| self.structural(instance, step, e))?;
                match step.branch_entry(&BranchKey::Value(discriminator)) {
                    Some(entry) => Ok(StepOutcome::Completed(ExecutionResult::branch([entry]))),
                    // No matching case falls through to the continuation
                    None => Ok(StepOutcome::Completed(ExecutionResult::next())),
                }
            }

            StepKind::Parallel => {
                let entries: Vec<_> = step.branches.iter().map(|(_, entry)| *entry).collect();
                Ok(StepOutcome::Completed(ExecutionResult::branch(entries)))
            }

            StepKind::WaitForEvent {
                event_name,
                event_key,
                time_to_live,
            } => {
                // A promoted pointer carries the matched event's payload and
                // simply moves on; a first visit parks.
                if pointer.event_data.is_some() {
                    Ok(StepOutcome::Completed(ExecutionResult::next()))
                } else {
                    Ok(StepOutcome::Completed(ExecutionResult::wait_for_event(
                        event_name.clone(),
                        event_key.clone(),
                        *time_to_live,
                    )))
                }
            }

            StepKind::Delay { interval } => {
                // The delay is folded through the retry mechanism: the first
                // visit sleeps, the promoted re-execution advances.
                if pointer.retry_count > 0 {
                    Ok(StepOutcome::Completed(ExecutionResult::next()))
                } else {
                    Ok(StepOutcome::Completed(ExecutionResult::retry_after(
                        *interval, false,
                    )))
                }
            }

            StepKind::End => Ok(StepOutcome::Completed(ExecutionResult::halt())),
        }
    }

    /// Construct the body, bind inputs, run, and bind outputs on completion
    async fn run_handler(
        &self,
        instance: &OrchestrationInstance,
        pointer: &ExecutionPointer,
        step: &Arc<OrchestrationStep>,
        spec: &HandlerSpec,
    ) -> OrchestrationResult<StepOutcome> {
        let ctx = instance.step_context(step.clone(), pointer.clone());

        let run_result = match &spec.factory {
            BodyFactory::Inline(body) => body(&ctx),
            BodyFactory::Sync(make) => {
                let mut body = make();
                let data = instance.data_snapshot();
                let mut bind_failure = None;
                for binder in &spec.input_binders {
                    if let Err(e) = binder(body.as_mut().as_any_mut(), &data) {
                        bind_failure = Some(e);
                        break;
                    }
                }
                match bind_failure {
                    Some(e) => Err(e),
                    None => match body.run(&ctx) {
                        Ok(result) => {
                            self.bind_outputs(instance, spec, body.as_ref().as_any(), &result)?;
                            Ok(result)
                        }
                        Err(e) => Err(e),
                    },
                }
            }
            BodyFactory::Async(make) => {
                let mut body = make();
                let data = instance.data_snapshot();
                let mut bind_failure = None;
                for binder in &spec.input_binders {
                    if let Err(e) = binder(body.as_mut().as_any_mut(), &data) {
                        bind_failure = Some(e);
                        break;
                    }
                }
                match bind_failure {
                    Some(e) => Err(e),
                    None => match body.run_async(&ctx).await {
                        Ok(result) => {
                            self.bind_outputs(instance, spec, body.as_ref().as_any(), &result)?;
                            Ok(result)
                        }
                        Err(e) => Err(e),
                    },
                }
            }
        };

        match run_result {
            Ok(result) => Ok(StepOutcome::Completed(result)),
            Err(e) => {
                warn!(
                    instance_id = %instance.id(),
                    step = %step.name,
                    error = %e,
                    "step body failed"
                );
                Ok(StepOutcome::Failed(format!(
                    "step '{}' failed: {e}",
                    step.name
                )))
            }
        }
    }

    /// Output binders only run on a plain completion
    fn bind_outputs(
        &self,
        instance: &OrchestrationInstance,
        spec: &HandlerSpec,
        body: &dyn std::any::Any,
        result: &ExecutionResult,
    ) -> anyhow::Result<()> {
        if !result.is_completion() || spec.output_binders.is_empty() {
            return Ok(());
        }

        let mut data = instance.data_snapshot();
        for binder in &spec.output_binders {
            binder(body, &mut data)?;
        }
        instance.replace_data(data);
        Ok(())
    }

    /// Interpret the execution result into pointer transitions and new
    /// pointers
    async fn process_execution_result(
        &self,
        instance: &OrchestrationInstance,
        pointer: &mut ExecutionPointer,
        step: &Arc<OrchestrationStep>,
        result: ExecutionResult,
    ) -> OrchestrationResult<()> {
        if result.requests_retry() {
            let detail = result
                .error_detail
                .clone()
                .unwrap_or_else(|| format!("step '{}' requested retry", step.name));
            return self
                .retry_or_suspend(
                    instance,
                    pointer,
                    step,
                    result.is_error,
                    result.retry_interval,
                    detail,
                )
                .await;
        }

        if let Some(event_name) = &result.event_name {
            let ttl = match result.event_ttl {
                Some(ttl) => Some(self.now() + Self::chrono_duration(ttl)?),
                None => None,
            };
            pointer.mark_waiting_for_event(
                event_name.clone(),
                result.event_key.clone().unwrap_or_default(),
                ttl,
            );
            self.repository
                .update_execution_pointer(instance.id(), pointer)
                .await?;
            debug!(
                instance_id = %instance.id(),
                step = %step.name,
                event_name = %event_name,
                "pointer parked waiting for event"
            );
            return Ok(());
        }

        // Plain completion: close the pointer, persist the payload, advance
        pointer.mark_completed(self.now());
        self.repository
            .update_execution_pointer(instance.id(), pointer)
            .await?;
        self.repository
            .update_instance_data(instance.id(), &instance.data_snapshot())
            .await?;

        self.publish(
            instance,
            LifeCycleEvent::StepCompleted {
                instance_id: instance.id(),
                step_id: step.id,
                pointer_id: pointer.id,
                step_name: step.name.clone(),
                at: self.now(),
            },
        )
        .await;

        if !result.nested_steps.is_empty() {
            for nested_step_id in &result.nested_steps {
                let nested = self
                    .pointer_factory
                    .build_nested_pointer(instance.definition(), pointer, *nested_step_id)
                    .ok_or_else(|| self.unresolvable_step(instance, *nested_step_id))?;
                self.repository
                    .add_nested_execution_pointer(instance.id(), pointer.id, &nested)
                    .await?;
            }
            return Ok(());
        }

        if result.next_steps.is_empty() {
            // No continuation requested: a branch terminal merges back, a
            // top-level End simply closes its chain.
            if step.branch_controller.is_some() {
                return self.resolve_branch_merge(instance, pointer, step).await;
            }
            if !step.is_end() {
                return Err(OrchestrationError::StructuralViolation {
                    instance_id: instance.id(),
                    detail: format!(
                        "step '{}' completed without continuation and is not an end step",
                        step.name
                    ),
                });
            }
            return Ok(());
        }

        for target in &result.next_steps {
            match target {
                NextStepRef::Step(step_id) => {
                    self.create_next_pointer(instance, pointer, *step_id).await?;
                }
                NextStepRef::Continue => {
                    if let Some(next_step) = step.next_step {
                        self.create_next_pointer(instance, pointer, next_step).await?;
                    } else if step.branch_controller.is_some() {
                        self.resolve_branch_merge(instance, pointer, step).await?;
                    } else if !step.is_end() {
                        return Err(OrchestrationError::StructuralViolation {
                            instance_id: instance.id(),
                            detail: format!(
                                "step '{}' has no continuation and no branch controller",
                                step.name
                            ),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    async fn create_next_pointer(
        &self,
        instance: &OrchestrationInstance,
        pointer: &ExecutionPointer,
        step_id: Uuid,
    ) -> OrchestrationResult<()> {
        let next = self
            .pointer_factory
            .build_next_pointer(instance.definition(), pointer, step_id)
            .ok_or_else(|| self.unresolvable_step(instance, step_id))?;
        self.repository
            .add_execution_pointer(instance.id(), &next)
            .await?;
        Ok(())
    }

    /// A completed branch terminal resolves outward through its controller
    /// chain. `While` controllers loop by re-evaluating; other controllers
    /// advance once every arm has finalized, escalating to the enclosing
    /// controller when they are themselves branch terminals.
    async fn resolve_branch_merge(
        &self,
        instance: &OrchestrationInstance,
        pointer: &ExecutionPointer,
        step: &Arc<OrchestrationStep>,
    ) -> OrchestrationResult<()> {
        let definition = instance.definition();
        let mut current: OrchestrationStep = (**step).clone();

        loop {
            let Some(controller_id) = current.branch_controller else {
                return Err(OrchestrationError::StructuralViolation {
                    instance_id: instance.id(),
                    detail: format!(
                        "step '{}' has no continuation and no branch controller",
                        current.name
                    ),
                });
            };
            let controller = definition
                .step(controller_id)
                .ok_or_else(|| self.unresolvable_step(instance, controller_id))?;

            if matches!(controller.kind, StepKind::While { .. }) {
                // Loop body finished; re-evaluate the condition with a fresh
                // pointer at the controller. Iterations stay independent, so
                // no finalization record is written.
                self.create_next_pointer(instance, pointer, controller_id).await?;
                return Ok(());
            }

            let entry = current.starting_step.ok_or_else(|| {
                OrchestrationError::StructuralViolation {
                    instance_id: instance.id(),
                    detail: format!("branch step '{}' has no starting step", current.name),
                }
            })?;

            self.repository
                .add_finalized_branch(instance.id(), controller_id, entry)
                .await?;
            let finalized = self
                .repository
                .get_finalized_branch_ids(instance.id(), controller_id)
                .await?;
            let all_finalized = controller
                .branches
                .iter()
                .all(|(_, branch_entry)| finalized.contains(branch_entry));
            if !all_finalized {
                // Sibling arms are still running; the last one merges.
                return Ok(());
            }

            if let Some(next_step) = controller.next_step {
                self.create_next_pointer(instance, pointer, next_step).await?;
                return Ok(());
            }

            // The controller is itself a branch terminal; merge outward.
            current = controller.clone();
        }
    }

    /// Apply the retry policy, falling back to suspension when exhausted
    async fn retry_or_suspend(
        &self,
        instance: &OrchestrationInstance,
        pointer: &mut ExecutionPointer,
        step: &Arc<OrchestrationStep>,
        is_error: bool,
        requested_interval: Option<std::time::Duration>,
        detail: String,
    ) -> OrchestrationResult<()> {
        let definition = instance.definition();
        if step.can_retry(pointer.retry_count, &definition.default_retry_policy) {
            let policy = definition.retry_policy_for(step.id);
            let interval = self
                .backoff
                .resolve(policy, pointer.retry_count, requested_interval);
            let wake_at = self.now() + Self::chrono_duration(interval)?;
            pointer.mark_retrying(wake_at);
            self.repository
                .update_execution_pointer(instance.id(), pointer)
                .await?;

            if is_error {
                warn!(
                    instance_id = %instance.id(),
                    step = %step.name,
                    retry_count = pointer.retry_count,
                    detail = %detail,
                    "step failed; retry scheduled"
                );
                self.publish(
                    instance,
                    LifeCycleEvent::OrchestrationError {
                        instance_id: instance.id(),
                        step_id: Some(step.id),
                        pointer_id: Some(pointer.id),
                        detail,
                        at: self.now(),
                    },
                )
                .await;
            }
            Ok(())
        } else {
            info!(
                instance_id = %instance.id(),
                step = %step.name,
                retry_count = pointer.retry_count,
                detail = %detail,
                "retry budget exhausted; suspending orchestration"
            );
            self.suspend_pointer(instance, pointer, step).await
        }
    }

    /// Suspend the pointer and the instance; terminal until an operator
    /// resumes the orchestration
    async fn suspend_pointer(
        &self,
        instance: &OrchestrationInstance,
        pointer: &mut ExecutionPointer,
        step: &Arc<OrchestrationStep>,
    ) -> OrchestrationResult<()> {
        pointer.mark_suspended();
        self.repository
            .update_execution_pointer(instance.id(), pointer)
            .await?;
        self.repository
            .update_orchestration_status(instance.id(), OrchestrationStatus::Suspended, None)
            .await?;
        instance.set_cached_status(OrchestrationStatus::Suspended);

        self.publish(
            instance,
            LifeCycleEvent::StepSuspended {
                instance_id: instance.id(),
                step_id: step.id,
                pointer_id: pointer.id,
                step_name: step.name.clone(),
                at: self.now(),
            },
        )
        .await;
        self.publish(
            instance,
            LifeCycleEvent::OrchestrationSuspended {
                instance_id: instance.id(),
                at: self.now(),
            },
        )
        .await;
        Ok(())
    }

    /// Completed iff every pointer is completed and an End step finished
    async fn determine_orchestration_completed(
        &self,
        instance: &OrchestrationInstance,
    ) -> OrchestrationResult<bool> {
        let pointers = self
            .repository
            .get_execution_pointers(instance.id())
            .await?;
        if pointers.is_empty() {
            return Ok(false);
        }
        if !pointers
            .iter()
            .all(|pointer| pointer.status == PointerStatus::Completed)
        {
            return Ok(false);
        }

        let definition = instance.definition();
        let end_reached = pointers.iter().any(|pointer| {
            definition
                .step(pointer.step_id)
                .map(|step| step.is_end())
                .unwrap_or(false)
        });
        if !end_reached {
            warn!(
                instance_id = %instance.id(),
                "all pointers completed but no end step was reached"
            );
            return Ok(false);
        }

        self.repository
            .update_orchestration_status(
                instance.id(),
                OrchestrationStatus::Completed,
                Some(self.now()),
            )
            .await?;
        instance.set_cached_status(OrchestrationStatus::Completed);

        info!(instance_id = %instance.id(), "orchestration completed");
        self.publish(
            instance,
            LifeCycleEvent::OrchestrationCompleted {
                instance_id: instance.id(),
                at: self.now(),
            },
        )
        .await;
        Ok(true)
    }

    /// Fatal path: an error escaped per-step handling. Force the instance
    /// to terminated, best effort, and surface the failure through the
    /// lifecycle stream.
    async fn terminate_on_fatal(
        &self,
        instance: &OrchestrationInstance,
        error: OrchestrationError,
    ) -> ExecutionPassOutcome {
        error!(
            instance_id = %instance.id(),
            error = %error,
            "unhandled executor error; terminating orchestration"
        );

        if let Err(update_error) = self
            .repository
            .update_orchestration_status(
                instance.id(),
                OrchestrationStatus::Terminated,
                Some(self.now()),
            )
            .await
        {
            error!(
                instance_id = %instance.id(),
                error = %update_error,
                "failed to persist termination; forcing in-memory status"
            );
        }
        instance.set_cached_status(OrchestrationStatus::Terminated);

        self.publish(
            instance,
            LifeCycleEvent::OrchestrationError {
                instance_id: instance.id(),
                step_id: None,
                pointer_id: None,
                detail: error.to_string(),
                at: self.now(),
            },
        )
        .await;

        ExecutionPassOutcome::Terminated
    }

    async fn publish(&self, instance: &OrchestrationInstance, event: LifeCycleEvent) {
        if instance.definition().await_lifecycle_events {
            self.lifecycle.publish(event).await;
        } else {
            self.lifecycle.publish_detached(event);
        }
    }

    async fn load_instance(
        &self,
        instance_id: Uuid,
    ) -> OrchestrationResult<OrchestrationInstanceRecord> {
        self.repository
            .get_orchestration_instance(instance_id)
            .await?
            .ok_or(OrchestrationError::InstanceNotFound { instance_id })
    }

    async fn find_pointer(
        &self,
        instance_id: Uuid,
        pointer_id: Uuid,
    ) -> OrchestrationResult<Option<ExecutionPointer>> {
        let pointers = self.repository.get_execution_pointers(instance_id).await?;
        Ok(pointers.into_iter().find(|pointer| pointer.id == pointer_id))
    }

    fn resolve_step(
        &self,
        instance: &OrchestrationInstance,
        step_id: Uuid,
    ) -> OrchestrationResult<Arc<OrchestrationStep>> {
        instance
            .definition()
            .step(step_id)
            .cloned()
            .map(Arc::new)
            .ok_or_else(|| self.unresolvable_step(instance, step_id))
    }

    fn unresolvable_step(
        &self,
        instance: &OrchestrationInstance,
        step_id: Uuid,
    ) -> OrchestrationError {
        let definition = instance.definition();
        OrchestrationError::UnresolvableStep {
            definition_id: definition.id.clone(),
            version: definition.version,
            step_id,
        }
    }

    fn structural(
        &self,
        instance: &OrchestrationInstance,
        step: &OrchestrationStep,
        error: anyhow::Error,
    ) -> OrchestrationError {
        OrchestrationError::StructuralViolation {
            instance_id: instance.id(),
            detail: format!("step '{}' discriminator failed: {error}", step.name),
        }
    }

    fn missing_branch(
        &self,
        instance: &OrchestrationInstance,
        step: &OrchestrationStep,
        branch: &str,
    ) -> OrchestrationError {
        OrchestrationError::StructuralViolation {
            instance_id: instance.id(),
            detail: format!("step '{}' has no {branch} branch", step.name),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    fn chrono_duration(duration: std::time::Duration) -> OrchestrationResult<chrono::Duration> {
        chrono::Duration::from_std(duration).map_err(|e| {
            OrchestrationError::configuration(format!("duration out of range: {e}"))
        })
    }
}
