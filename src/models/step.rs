//! # Step Graph Nodes
//!
//! Arena nodes for the orchestration step graph. Every cross-reference
//! (`next_step`, `branch_controller`, `starting_step`, branch entries) is a
//! stable id into the definition's arena rather than a live object pointer,
//! which keeps ownership unambiguous and the graph serializable.
//!
//! Step behavior is a tagged variant (`StepKind`): handler steps carry an
//! explicit body factory resolved at definition-build time, control steps
//! carry the erased predicate or selector the builder captured, and the
//! remaining kinds (event wait, delay, end) are interpreted directly by the
//! executor.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::constants::system;
use crate::orchestration::context::StepExecutionContext;

/// Stable identity of a step within a definition
pub type StepId = Uuid;

/// Result type returned by step bodies
pub type StepBodyResult = anyhow::Result<super::result::ExecutionResult>;

/// Upcast helper so erased input/output binders can downcast a boxed body
/// back to its concrete type
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Synchronous step body
pub trait SyncStepBody: AsAny + Send {
    fn run(&mut self, ctx: &StepExecutionContext) -> StepBodyResult;
}

/// Asynchronous step body
#[async_trait]
pub trait AsyncStepBody: AsAny + Send {
    async fn run_async(&mut self, ctx: &StepExecutionContext) -> StepBodyResult;
}

/// Discriminator value selecting a branch sub-graph
#[derive(Debug, Clone, PartialEq)]
pub enum BranchKey {
    /// If/IfElse branches
    Bool(bool),
    /// Switch cases, compared by value equality
    Value(Value),
    /// Parallel and While arms, by position
    Index(usize),
}

/// Retry schedule applied when a step fails or requests a retry
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Whether another attempt is permitted after `retry_count` retries
    pub fn can_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_attempts
    }

    /// A policy that never retries, sending failures straight to suspension
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: system::DEFAULT_MAX_RETRY_ATTEMPTS,
            base_delay: system::DEFAULT_RETRY_BASE_DELAY,
            max_delay: system::DEFAULT_RETRY_MAX_DELAY,
            backoff_multiplier: system::DEFAULT_RETRY_BACKOFF_MULTIPLIER,
        }
    }
}

/// Erased condition over the instance data snapshot (If/While)
pub type DataPredicate = Arc<dyn Fn(&Value) -> anyhow::Result<bool> + Send + Sync>;

/// Erased case selector over the instance data snapshot (Switch)
pub type DataSelector = Arc<dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync>;

/// Erased input binder: configures a body from the data snapshot before `run`
pub type InputBinder = Arc<dyn Fn(&mut dyn Any, &Value) -> anyhow::Result<()> + Send + Sync>;

/// Erased output binder: writes body results back into the data on completion
pub type OutputBinder = Arc<dyn Fn(&dyn Any, &mut Value) -> anyhow::Result<()> + Send + Sync>;

/// Constructor for a handler step's body, resolved once at build time
#[derive(Clone)]
pub enum BodyFactory {
    Sync(Arc<dyn Fn() -> Box<dyn SyncStepBody> + Send + Sync>),
    Async(Arc<dyn Fn() -> Box<dyn AsyncStepBody> + Send + Sync>),
    Inline(Arc<dyn Fn(&StepExecutionContext) -> StepBodyResult + Send + Sync>),
}

/// Body factory plus the typed data bindings attached through the builder
#[derive(Clone)]
pub struct HandlerSpec {
    pub factory: BodyFactory,
    pub input_binders: Vec<InputBinder>,
    pub output_binders: Vec<OutputBinder>,
}

impl HandlerSpec {
    pub fn new(factory: BodyFactory) -> Self {
        Self {
            factory,
            input_binders: Vec::new(),
            output_binders: Vec::new(),
        }
    }
}

/// Step behavior discriminator
#[derive(Clone)]
pub enum StepKind {
    /// User-supplied sync/async/inline body
    Handler(HandlerSpec),
    /// Single conditional branch; false falls through to the continuation
    If { condition: DataPredicate },
    /// Loop: the branch re-enters this step until the condition turns false
    While { condition: DataPredicate },
    /// Value-dispatched branch set; no matching case falls through
    Switch { selector: DataSelector },
    /// Fan-out: every branch entry gets a nested pointer
    Parallel,
    /// Park until a correlated external event arrives
    WaitForEvent {
        event_name: String,
        event_key: String,
        time_to_live: Option<Duration>,
    },
    /// Time-based pause folded through the retry mechanism
    Delay { interval: Duration },
    /// Terminates the chain; completion requires a completed End pointer
    End,
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Handler(_) => "handler",
            StepKind::If { .. } => "if",
            StepKind::While { .. } => "while",
            StepKind::Switch { .. } => "switch",
            StepKind::Parallel => "parallel",
            StepKind::WaitForEvent { .. } => "wait_for_event",
            StepKind::Delay { .. } => "delay",
            StepKind::End => "end",
        }
    }

    /// Control steps own branch sub-graphs and resume execution after them
    pub fn is_branch_controller(&self) -> bool {
        matches!(
            self,
            StepKind::If { .. } | StepKind::While { .. } | StepKind::Switch { .. } | StepKind::Parallel
        )
    }
}

impl std::fmt::Debug for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Node in the orchestration step graph
#[derive(Debug, Clone)]
pub struct OrchestrationStep {
    pub id: StepId,
    pub name: String,
    /// Linear continuation
    pub next_step: Option<StepId>,
    /// Ordered discriminator -> branch-entry mapping
    pub branches: Vec<(BranchKey, StepId)>,
    /// The control step owning this step's branch, for steps inside a branch
    pub branch_controller: Option<StepId>,
    /// First step of the owning branch, used to detect branch completion
    pub starting_step: Option<StepId>,
    pub kind: StepKind,
    /// Error-handling override of the definition default
    pub retry_policy: Option<RetryPolicy>,
    /// Distributed-lock expiration override of the definition default
    pub lock_expiration: Option<Duration>,
}

impl OrchestrationStep {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            next_step: None,
            branches: Vec::new(),
            branch_controller: None,
            starting_step: None,
            kind,
            retry_policy: None,
            lock_expiration: None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, StepKind::End)
    }

    /// Entry step of the branch selected by `key`, if any
    pub fn branch_entry(&self, key: &BranchKey) -> Option<StepId> {
        self.branches
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entry)| *entry)
    }

    /// Whether another retry is permitted, falling back to the definition
    /// default when the step carries no override
    pub fn can_retry(&self, retry_count: u32, default_policy: &RetryPolicy) -> bool {
        self.retry_policy
            .as_ref()
            .unwrap_or(default_policy)
            .can_retry(retry_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_exhaustion() {
        let policy = RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        };
        assert!(policy.can_retry(0));
        assert!(policy.can_retry(1));
        assert!(!policy.can_retry(2));
        assert!(!RetryPolicy::none().can_retry(0));
    }

    #[test]
    fn test_step_retry_falls_back_to_default() {
        let mut step = OrchestrationStep::new("node", StepKind::End);
        let default_policy = RetryPolicy::default();
        assert!(step.can_retry(0, &default_policy));

        step.retry_policy = Some(RetryPolicy::none());
        assert!(!step.can_retry(0, &default_policy));
    }

    #[test]
    fn test_branch_entry_lookup() {
        let mut step = OrchestrationStep::new(
            "gate",
            StepKind::If {
                condition: Arc::new(|_| Ok(true)),
            },
        );
        let entry = Uuid::new_v4();
        step.branches.push((BranchKey::Bool(true), entry));

        assert_eq!(step.branch_entry(&BranchKey::Bool(true)), Some(entry));
        assert_eq!(step.branch_entry(&BranchKey::Bool(false)), None);
        assert!(step.kind.is_branch_controller());
    }
}
