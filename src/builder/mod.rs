//! # Orchestration Builder DSL
//!
//! Fluent construction of a validated step graph for a typed payload.
//! The builder is an explicit graph-construction pass: every call appends
//! arena nodes and rewrites branch/controller references by id, and
//! `build()` freezes the result into an immutable
//! [`OrchestrationDefinition`].
//!
//! Branch bodies (`if_then`, `if_else`, `switch`, `while_do`, `parallel`)
//! are built in a separate nested builder and then spliced: every spliced
//! step not already owned by an inner controller is stamped with the control
//! step as its `branch_controller` and with the branch's first step as its
//! `starting_step`.
//!
//! Misuse (a branch with no steps, an empty switch, an append before
//! `start_with`) is recorded and surfaced as a [`DefinitionError`] from
//! `build()` — configuration errors fail fast and are never silently
//! ignored.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::constants::system;
use crate::models::step::{InputBinder, OutputBinder, StepBodyResult};
use crate::models::{
    AsyncStepBody, BodyFactory, BranchKey, HandlerSpec, OrchestrationDefinition,
    OrchestrationStep, RetryPolicy, StepId, StepKind, SyncStepBody,
};
use crate::orchestration::context::StepExecutionContext;

/// Configuration errors raised while building or registering a definition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("definition has no steps")]
    NoSteps,

    #[error("start_with was already called for this definition")]
    StartAlreadyDefined,

    #[error("a step was appended before start_with")]
    MissingStartingStep,

    #[error("{context} produced no steps")]
    EmptyBranch { context: String },

    #[error("step '{step}' requires at least one branch")]
    EmptyBranchSet { step: String },

    #[error("step '{step}' references unknown step {reference}")]
    UnresolvedReference { step: String, reference: Uuid },

    #[error("step '{step}' has no continuation and no branch controller")]
    MissingContinuation { step: String },

    #[error("step '{step}' is not reachable from the starting step")]
    UnreachableStep { step: String },

    #[error("end step must not have a continuation")]
    EndWithContinuation,

    #[error("attached orchestration must have exactly one terminal step")]
    AmbiguousAttachment,

    #[error("definition registration failed: {0}")]
    Registration(String),
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Fluent builder over the step-graph arena for payload type `TData`
pub struct OrchestrationBuilder<TData> {
    id: String,
    version: i32,
    steps: Vec<OrchestrationStep>,
    first: Option<StepId>,
    cursor: Option<StepId>,
    error: Option<DefinitionError>,
    nested: bool,
    default_retry_policy: RetryPolicy,
    default_lock_expiration: Duration,
    worker_idle_timeout: Duration,
    is_singleton: bool,
    await_lifecycle_events: bool,
    _marker: PhantomData<fn(TData)>,
}

impl<TData> OrchestrationBuilder<TData>
where
    TData: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(id: impl Into<String>, version: i32) -> Self {
        Self {
            id: id.into(),
            version,
            steps: Vec::new(),
            first: None,
            cursor: None,
            error: None,
            nested: false,
            default_retry_policy: RetryPolicy::default(),
            default_lock_expiration: system::DEFAULT_LOCK_EXPIRATION,
            worker_idle_timeout: system::DEFAULT_WORKER_IDLE_TIMEOUT,
            is_singleton: false,
            await_lifecycle_events: false,
            _marker: PhantomData,
        }
    }

    fn new_nested() -> Self {
        let mut builder = Self::new("", 0);
        builder.nested = true;
        builder
    }

    // Definition-level settings

    /// Only one running instance per orchestration key may exist at a time
    pub fn as_singleton(&mut self) -> &mut Self {
        self.is_singleton = true;
        self
    }

    /// Await lifecycle subscribers inline instead of detaching them
    pub fn await_lifecycle_events(&mut self) -> &mut Self {
        self.await_lifecycle_events = true;
        self
    }

    pub fn default_retry_policy(&mut self, policy: RetryPolicy) -> &mut Self {
        self.default_retry_policy = policy;
        self
    }

    pub fn default_lock_expiration(&mut self, expiration: Duration) -> &mut Self {
        self.default_lock_expiration = expiration;
        self
    }

    pub fn worker_idle_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.worker_idle_timeout = timeout;
        self
    }

    // Handler steps

    /// Begin the graph with a synchronous body constructed via `Default`
    pub fn start_with<B>(&mut self) -> StepBuilder<'_, TData, B>
    where
        B: SyncStepBody + Default + 'static,
    {
        self.guard_start();
        let id = self.append_step(Self::sync_step::<B>());
        StepBuilder::new(self, id)
    }

    /// Append a synchronous body as the linear successor
    pub fn then<B>(&mut self) -> StepBuilder<'_, TData, B>
    where
        B: SyncStepBody + Default + 'static,
    {
        self.guard_continuation();
        let id = self.append_step(Self::sync_step::<B>());
        StepBuilder::new(self, id)
    }

    /// Begin the graph with an asynchronous body constructed via `Default`
    pub fn start_with_async<B>(&mut self) -> StepBuilder<'_, TData, B>
    where
        B: AsyncStepBody + Default + 'static,
    {
        self.guard_start();
        let id = self.append_step(Self::async_step::<B>());
        StepBuilder::new(self, id)
    }

    /// Append an asynchronous body as the linear successor
    pub fn then_async<B>(&mut self) -> StepBuilder<'_, TData, B>
    where
        B: AsyncStepBody + Default + 'static,
    {
        self.guard_continuation();
        let id = self.append_step(Self::async_step::<B>());
        StepBuilder::new(self, id)
    }

    /// Begin the graph with an inline closure body
    pub fn start_with_inline<F>(&mut self, name: &str, body: F) -> StepBuilder<'_, TData, ()>
    where
        F: Fn(&StepExecutionContext) -> StepBodyResult + Send + Sync + 'static,
    {
        self.guard_start();
        let id = self.append_step(Self::inline_step(name, body));
        StepBuilder::new(self, id)
    }

    /// Append an inline closure body as the linear successor
    pub fn then_inline<F>(&mut self, name: &str, body: F) -> StepBuilder<'_, TData, ()>
    where
        F: Fn(&StepExecutionContext) -> StepBodyResult + Send + Sync + 'static,
    {
        self.guard_continuation();
        let id = self.append_step(Self::inline_step(name, body));
        StepBuilder::new(self, id)
    }

    // Control steps

    /// Conditional branch; a false condition falls through to the
    /// continuation
    pub fn if_then<C, F>(&mut self, condition: C, configure: F) -> &mut Self
    where
        C: Fn(&TData) -> bool + Send + Sync + 'static,
        F: FnOnce(&mut OrchestrationBuilder<TData>),
    {
        self.guard_continuation();
        let step = OrchestrationStep::new(
            "if",
            StepKind::If {
                condition: Self::erase_predicate(condition),
            },
        );
        let id = self.append_step(step);
        match self.splice_branch(id, configure, "if branch") {
            Ok(entry) => self.push_branch(id, BranchKey::Bool(true), entry),
            Err(e) => self.record_error(e),
        }
        self
    }

    /// Conditional branch with both arms
    pub fn if_else<C, FT, FF>(
        &mut self,
        condition: C,
        configure_then: FT,
        configure_else: FF,
    ) -> &mut Self
    where
        C: Fn(&TData) -> bool + Send + Sync + 'static,
        FT: FnOnce(&mut OrchestrationBuilder<TData>),
        FF: FnOnce(&mut OrchestrationBuilder<TData>),
    {
        self.guard_continuation();
        let step = OrchestrationStep::new(
            "if_else",
            StepKind::If {
                condition: Self::erase_predicate(condition),
            },
        );
        let id = self.append_step(step);
        match self.splice_branch(id, configure_then, "then branch") {
            Ok(entry) => self.push_branch(id, BranchKey::Bool(true), entry),
            Err(e) => self.record_error(e),
        }
        match self.splice_branch(id, configure_else, "else branch") {
            Ok(entry) => self.push_branch(id, BranchKey::Bool(false), entry),
            Err(e) => self.record_error(e),
        }
        self
    }

    /// Value-dispatched branch set; requires at least one case
    pub fn switch<S, F>(&mut self, selector: S, configure: F) -> &mut Self
    where
        S: Fn(&TData) -> Value + Send + Sync + 'static,
        F: FnOnce(&mut SwitchCases<'_, TData>),
    {
        self.guard_continuation();
        let step = OrchestrationStep::new(
            "switch",
            StepKind::Switch {
                selector: Self::erase_selector(selector),
            },
        );
        let id = self.append_step(step);

        let mut cases = SwitchCases {
            builder: self,
            controller: id,
            count: 0,
        };
        configure(&mut cases);
        let count = cases.count;
        if count == 0 {
            self.record_error(DefinitionError::EmptyBranchSet {
                step: "switch".to_string(),
            });
        }
        self
    }

    /// Loop: the branch re-enters the condition until it turns false
    pub fn while_do<C, F>(&mut self, condition: C, configure: F) -> &mut Self
    where
        C: Fn(&TData) -> bool + Send + Sync + 'static,
        F: FnOnce(&mut OrchestrationBuilder<TData>),
    {
        self.guard_continuation();
        let step = OrchestrationStep::new(
            "while",
            StepKind::While {
                condition: Self::erase_predicate(condition),
            },
        );
        let id = self.append_step(step);
        match self.splice_branch(id, configure, "while branch") {
            Ok(entry) => self.push_branch(id, BranchKey::Index(0), entry),
            Err(e) => self.record_error(e),
        }
        self
    }

    /// Fan-out over concurrent branch arms; requires at least one arm
    pub fn parallel<F>(&mut self, configure: F) -> &mut Self
    where
        F: FnOnce(&mut ParallelBranches<'_, TData>),
    {
        self.guard_continuation();
        let step = OrchestrationStep::new("parallel", StepKind::Parallel);
        let id = self.append_step(step);

        let mut branches = ParallelBranches {
            builder: self,
            controller: id,
            count: 0,
        };
        configure(&mut branches);
        let count = branches.count;
        if count == 0 {
            self.record_error(DefinitionError::EmptyBranchSet {
                step: "parallel".to_string(),
            });
        }
        self
    }

    /// Park until a correlated external event arrives
    pub fn wait_for(
        &mut self,
        event_name: impl Into<String>,
        event_key: impl Into<String>,
        time_to_live: Option<Duration>,
    ) -> &mut Self {
        self.guard_continuation();
        let event_name = event_name.into();
        let step = OrchestrationStep::new(
            format!("wait_for:{event_name}"),
            StepKind::WaitForEvent {
                event_name,
                event_key: event_key.into(),
                time_to_live,
            },
        );
        self.append_step(step);
        self
    }

    /// Pause for the given interval
    pub fn delay(&mut self, interval: Duration) -> &mut Self {
        self.guard_continuation();
        let step = OrchestrationStep::new("delay", StepKind::Delay { interval });
        self.append_step(step);
        self
    }

    /// Terminate the chain
    pub fn end(&mut self) -> &mut Self {
        self.guard_continuation();
        let step = OrchestrationStep::new("end", StepKind::End);
        self.append_step(step);
        self
    }

    /// Splice an independently-built sub-graph inline; its single terminal
    /// step becomes the cursor
    pub fn attach_orchestration<F>(&mut self, configure: F) -> &mut Self
    where
        F: FnOnce(&mut OrchestrationBuilder<TData>),
    {
        let mut sub = Self::new_nested();
        configure(&mut sub);
        if let Some(e) = sub.error.take() {
            self.record_error(e);
            return self;
        }
        let Some(entry) = sub.first else {
            self.record_error(DefinitionError::EmptyBranch {
                context: "attached orchestration".to_string(),
            });
            return self;
        };

        let terminals: Vec<StepId> = sub
            .steps
            .iter()
            .filter(|step| step.branch_controller.is_none() && step.next_step.is_none())
            .map(|step| step.id)
            .collect();
        let [terminal] = terminals.as_slice() else {
            self.record_error(DefinitionError::AmbiguousAttachment);
            return self;
        };
        let terminal = *terminal;

        if self.first.is_none() {
            self.first = Some(entry);
        }
        if let Some(cursor) = self.cursor {
            if let Some(step) = self.step_mut_opt(cursor) {
                step.next_step = Some(entry);
            }
        }
        self.steps.extend(sub.steps);
        self.cursor = Some(terminal);
        self
    }

    /// Freeze and validate the definition.
    ///
    /// Consuming `self` is the finalize guard: a built builder cannot be
    /// built again.
    pub fn build(mut self) -> Result<OrchestrationDefinition, DefinitionError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        if self.steps.is_empty() {
            return Err(DefinitionError::NoSteps);
        }
        let first = self.first.ok_or(DefinitionError::NoSteps)?;

        self.validate_references()?;
        self.validate_continuations()?;
        self.validate_reachability(first)?;

        Ok(OrchestrationDefinition::from_parts(
            self.id,
            self.version,
            std::any::type_name::<TData>(),
            self.steps,
            Some(first),
            self.default_retry_policy,
            self.default_lock_expiration,
            self.worker_idle_timeout,
            self.is_singleton,
            self.await_lifecycle_events,
        ))
    }

    // Internals

    fn sync_step<B>() -> OrchestrationStep
    where
        B: SyncStepBody + Default + 'static,
    {
        let factory = BodyFactory::Sync(Arc::new(|| Box::new(B::default()) as Box<dyn SyncStepBody>));
        OrchestrationStep::new(
            short_type_name::<B>(),
            StepKind::Handler(HandlerSpec::new(factory)),
        )
    }

    fn async_step<B>() -> OrchestrationStep
    where
        B: AsyncStepBody + Default + 'static,
    {
        let factory =
            BodyFactory::Async(Arc::new(|| Box::new(B::default()) as Box<dyn AsyncStepBody>));
        OrchestrationStep::new(
            short_type_name::<B>(),
            StepKind::Handler(HandlerSpec::new(factory)),
        )
    }

    fn inline_step<F>(name: &str, body: F) -> OrchestrationStep
    where
        F: Fn(&StepExecutionContext) -> StepBodyResult + Send + Sync + 'static,
    {
        let factory = BodyFactory::Inline(Arc::new(body));
        OrchestrationStep::new(name, StepKind::Handler(HandlerSpec::new(factory)))
    }

    fn erase_predicate<C>(condition: C) -> crate::models::step::DataPredicate
    where
        C: Fn(&TData) -> bool + Send + Sync + 'static,
    {
        Arc::new(move |value: &Value| {
            let data: TData = serde_json::from_value(value.clone())?;
            Ok(condition(&data))
        })
    }

    fn erase_selector<S>(selector: S) -> crate::models::step::DataSelector
    where
        S: Fn(&TData) -> Value + Send + Sync + 'static,
    {
        Arc::new(move |value: &Value| {
            let data: TData = serde_json::from_value(value.clone())?;
            Ok(selector(&data))
        })
    }

    fn append_step(&mut self, step: OrchestrationStep) -> StepId {
        let id = step.id;
        if self.first.is_none() {
            self.first = Some(id);
        }
        if let Some(cursor) = self.cursor {
            if let Some(current) = self.step_mut_opt(cursor) {
                current.next_step = Some(id);
            }
        }
        self.steps.push(step);
        self.cursor = Some(id);
        id
    }

    fn splice_branch<F>(
        &mut self,
        controller_id: StepId,
        configure: F,
        context: &str,
    ) -> Result<StepId, DefinitionError>
    where
        F: FnOnce(&mut OrchestrationBuilder<TData>),
    {
        let mut sub = Self::new_nested();
        configure(&mut sub);
        if let Some(error) = sub.error.take() {
            return Err(error);
        }
        let entry = sub.first.ok_or_else(|| DefinitionError::EmptyBranch {
            context: context.to_string(),
        })?;

        for mut step in sub.steps {
            if step.branch_controller.is_none() {
                step.branch_controller = Some(controller_id);
                step.starting_step = Some(entry);
            }
            self.steps.push(step);
        }
        Ok(entry)
    }

    fn push_branch(&mut self, controller_id: StepId, key: BranchKey, entry: StepId) {
        if let Some(step) = self.step_mut_opt(controller_id) {
            step.branches.push((key, entry));
        }
    }

    fn guard_start(&mut self) {
        if self.first.is_some() {
            self.record_error(DefinitionError::StartAlreadyDefined);
        }
    }

    fn guard_continuation(&mut self) {
        if self.first.is_none() && self.cursor.is_none() && self.steps.is_empty() {
            // Appending before start_with is legal only for the implicit
            // first step of a nested branch builder.
            if !self.nested {
                self.record_error(DefinitionError::MissingStartingStep);
            }
        }
    }

    fn record_error(&mut self, error: DefinitionError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn step_mut_opt(&mut self, id: StepId) -> Option<&mut OrchestrationStep> {
        self.steps.iter_mut().find(|step| step.id == id)
    }

    fn validate_references(&self) -> Result<(), DefinitionError> {
        let known: std::collections::HashSet<StepId> =
            self.steps.iter().map(|step| step.id).collect();
        for step in &self.steps {
            let references = step
                .next_step
                .into_iter()
                .chain(step.branch_controller)
                .chain(step.starting_step)
                .chain(step.branches.iter().map(|(_, entry)| *entry));
            for reference in references {
                if !known.contains(&reference) {
                    return Err(DefinitionError::UnresolvedReference {
                        step: step.name.clone(),
                        reference,
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_continuations(&self) -> Result<(), DefinitionError> {
        for step in &self.steps {
            if step.is_end() {
                if step.next_step.is_some() {
                    return Err(DefinitionError::EndWithContinuation);
                }
                continue;
            }
            if step.next_step.is_none() && step.branch_controller.is_none() {
                return Err(DefinitionError::MissingContinuation {
                    step: step.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_reachability(&self, first: StepId) -> Result<(), DefinitionError> {
        let mut visited = std::collections::HashSet::new();
        let mut frontier = vec![first];
        while let Some(id) = frontier.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(step) = self.steps.iter().find(|step| step.id == id) {
                frontier.extend(step.next_step);
                frontier.extend(step.branches.iter().map(|(_, entry)| *entry));
            }
        }

        for step in &self.steps {
            if !visited.contains(&step.id) {
                return Err(DefinitionError::UnreachableStep {
                    step: step.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Case collector for [`OrchestrationBuilder::switch`]
pub struct SwitchCases<'a, TData> {
    builder: &'a mut OrchestrationBuilder<TData>,
    controller: StepId,
    count: usize,
}

impl<TData> SwitchCases<'_, TData>
where
    TData: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Add a case branch dispatched on value equality
    pub fn case<F>(&mut self, value: Value, configure: F) -> &mut Self
    where
        F: FnOnce(&mut OrchestrationBuilder<TData>),
    {
        match self
            .builder
            .splice_branch(self.controller, configure, "switch case")
        {
            Ok(entry) => {
                self.builder
                    .push_branch(self.controller, BranchKey::Value(value), entry);
                self.count += 1;
            }
            Err(e) => self.builder.record_error(e),
        }
        self
    }
}

/// Arm collector for [`OrchestrationBuilder::parallel`]
pub struct ParallelBranches<'a, TData> {
    builder: &'a mut OrchestrationBuilder<TData>,
    controller: StepId,
    count: usize,
}

impl<TData> ParallelBranches<'_, TData>
where
    TData: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Add a concurrent arm
    pub fn branch<F>(&mut self, configure: F) -> &mut Self
    where
        F: FnOnce(&mut OrchestrationBuilder<TData>),
    {
        match self
            .builder
            .splice_branch(self.controller, configure, "parallel branch")
        {
            Ok(entry) => {
                self.builder
                    .push_branch(self.controller, BranchKey::Index(self.count), entry);
                self.count += 1;
            }
            Err(e) => self.builder.record_error(e),
        }
        self
    }
}

/// Typed cursor over the most recently appended handler step
pub struct StepBuilder<'a, TData, B> {
    builder: &'a mut OrchestrationBuilder<TData>,
    step_id: StepId,
    _marker: PhantomData<fn(B)>,
}

impl<'a, TData, B> StepBuilder<'a, TData, B>
where
    TData: Serialize + DeserializeOwned + Send + Sync + 'static,
    B: 'static,
{
    fn new(builder: &'a mut OrchestrationBuilder<TData>, step_id: StepId) -> Self {
        Self {
            builder,
            step_id,
            _marker: PhantomData,
        }
    }

    /// Override the step's display name
    pub fn name(self, name: impl Into<String>) -> Self {
        let step_id = self.step_id;
        if let Some(step) = self.builder.step_mut_opt(step_id) {
            step.name = name.into();
        }
        self
    }

    /// Bind instance data into the body before it runs
    pub fn input<F>(self, bind: F) -> Self
    where
        F: Fn(&mut B, &TData) + Send + Sync + 'static,
    {
        let erased: InputBinder = Arc::new(move |body, data| {
            let body = body
                .downcast_mut::<B>()
                .ok_or_else(|| anyhow::anyhow!("step body type mismatch in input binding"))?;
            let typed: TData = serde_json::from_value(data.clone())?;
            bind(body, &typed);
            Ok(())
        });
        let step_id = self.step_id;
        if let Some(step) = self.builder.step_mut_opt(step_id) {
            if let StepKind::Handler(spec) = &mut step.kind {
                spec.input_binders.push(erased);
            }
        }
        self
    }

    /// Write body results back into instance data on completion
    pub fn output<F>(self, bind: F) -> Self
    where
        F: Fn(&B, &mut TData) + Send + Sync + 'static,
    {
        let erased: OutputBinder = Arc::new(move |body, data| {
            let body = body
                .downcast_ref::<B>()
                .ok_or_else(|| anyhow::anyhow!("step body type mismatch in output binding"))?;
            let mut typed: TData = serde_json::from_value(data.clone())?;
            bind(body, &mut typed);
            *data = serde_json::to_value(typed)?;
            Ok(())
        });
        let step_id = self.step_id;
        if let Some(step) = self.builder.step_mut_opt(step_id) {
            if let StepKind::Handler(spec) = &mut step.kind {
                spec.output_binders.push(erased);
            }
        }
        self
    }

    /// Error-handling override for this step
    pub fn retry_policy(self, policy: RetryPolicy) -> Self {
        let step_id = self.step_id;
        if let Some(step) = self.builder.step_mut_opt(step_id) {
            step.retry_policy = Some(policy);
        }
        self
    }

    /// Distributed-lock expiration override for this step
    pub fn lock_expiration(self, expiration: Duration) -> Self {
        let step_id = self.step_id;
        if let Some(step) = self.builder.step_mut_opt(step_id) {
            step.lock_expiration = Some(expiration);
        }
        self
    }

    // Graph continuation, forwarded to the owning builder

    pub fn then<C>(self) -> StepBuilder<'a, TData, C>
    where
        C: SyncStepBody + Default + 'static,
    {
        self.builder.then::<C>()
    }

    pub fn then_async<C>(self) -> StepBuilder<'a, TData, C>
    where
        C: AsyncStepBody + Default + 'static,
    {
        self.builder.then_async::<C>()
    }

    pub fn then_inline<F>(self, name: &str, body: F) -> StepBuilder<'a, TData, ()>
    where
        F: Fn(&StepExecutionContext) -> StepBodyResult + Send + Sync + 'static,
    {
        self.builder.then_inline(name, body)
    }

    pub fn if_then<C, F>(self, condition: C, configure: F) -> &'a mut OrchestrationBuilder<TData>
    where
        C: Fn(&TData) -> bool + Send + Sync + 'static,
        F: FnOnce(&mut OrchestrationBuilder<TData>),
    {
        self.builder.if_then(condition, configure)
    }

    pub fn if_else<C, FT, FF>(
        self,
        condition: C,
        configure_then: FT,
        configure_else: FF,
    ) -> &'a mut OrchestrationBuilder<TData>
    where
        C: Fn(&TData) -> bool + Send + Sync + 'static,
        FT: FnOnce(&mut OrchestrationBuilder<TData>),
        FF: FnOnce(&mut OrchestrationBuilder<TData>),
    {
        self.builder.if_else(condition, configure_then, configure_else)
    }

    pub fn switch<S, F>(self, selector: S, configure: F) -> &'a mut OrchestrationBuilder<TData>
    where
        S: Fn(&TData) -> Value + Send + Sync + 'static,
        F: FnOnce(&mut SwitchCases<'_, TData>),
    {
        self.builder.switch(selector, configure)
    }

    pub fn while_do<C, F>(self, condition: C, configure: F) -> &'a mut OrchestrationBuilder<TData>
    where
        C: Fn(&TData) -> bool + Send + Sync + 'static,
        F: FnOnce(&mut OrchestrationBuilder<TData>),
    {
        self.builder.while_do(condition, configure)
    }

    pub fn parallel<F>(self, configure: F) -> &'a mut OrchestrationBuilder<TData>
    where
        F: FnOnce(&mut ParallelBranches<'_, TData>),
    {
        self.builder.parallel(configure)
    }

    pub fn wait_for(
        self,
        event_name: impl Into<String>,
        event_key: impl Into<String>,
        time_to_live: Option<Duration>,
    ) -> &'a mut OrchestrationBuilder<TData> {
        self.builder.wait_for(event_name, event_key, time_to_live)
    }

    pub fn delay(self, interval: Duration) -> &'a mut OrchestrationBuilder<TData> {
        self.builder.delay(interval)
    }

    pub fn end(self) -> &'a mut OrchestrationBuilder<TData> {
        self.builder.end()
    }

    pub fn attach_orchestration<F>(self, configure: F) -> &'a mut OrchestrationBuilder<TData>
    where
        F: FnOnce(&mut OrchestrationBuilder<TData>),
    {
        self.builder.attach_orchestration(configure)
    }
}
