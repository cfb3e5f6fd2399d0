//! # Orchestration Runtime
//!
//! The executor-side half of the engine: the pass state machine that
//! advances pointer forests, the pointer factory, the retry backoff
//! schedule, the per-instance idle worker, and the public controller
//! surface.
//!
//! ## Core Components
//!
//! - **OrchestrationExecutor**: selects runnable pointers, serializes work
//!   under the distributed lock, runs step bodies, and interprets results
//!   into pointer transitions
//! - **OrchestrationInstance**: binds a definition, key, and payload to a
//!   self-rescheduling idle worker
//! - **OrchestrationController**: registration, start with singleton
//!   semantics, suspend/resume/terminate, queries, and lifecycle fan-out
//! - **ExecutionPointerFactory**: genesis, next, nested, and retry pointers
//! - **BackoffCalculator**: capped exponential retry schedule

pub mod backoff;
pub mod context;
pub mod controller;
pub mod errors;
pub mod executor;
pub mod instance;
pub mod pointer_factory;
pub mod types;

pub use backoff::BackoffCalculator;
pub use context::StepExecutionContext;
pub use controller::OrchestrationController;
pub use errors::{OrchestrationError, OrchestrationResult};
pub use executor::OrchestrationExecutor;
pub use instance::OrchestrationInstance;
pub use pointer_factory::ExecutionPointerFactory;
pub use types::{ExecutionPassOutcome, Orchestration};
