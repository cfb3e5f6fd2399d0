//! # Conductor Core
//!
//! Durable workflow-orchestration engine for embedding inside a larger
//! service framework. Callers define **orchestrations** — step graphs
//! combining sequential steps, conditional branches, switches, loops,
//! parallel fan-out, event waits, and delays — over a strongly-typed data
//! payload. The engine persists progress as a forest of **execution
//! pointers**, resumes orchestrations after crashes, coordinates execution
//! across hosts via distributed locking, and supports suspend / resume /
//! terminate lifecycle operations with retry and failure policies.
//!
//! ## Architecture
//!
//! - [`builder`] - Fluent, typed construction of validated step graphs
//! - [`models`] - Step arena, definitions, pointers, results, event records
//! - [`orchestration`] - Executor state machine, instance workers, and the
//!   public controller surface
//! - [`persistence`] - Repository boundary plus the in-memory reference
//!   implementation
//! - [`locking`] - Distributed-lock boundary plus the in-process provider
//! - [`events`] - Lifecycle event fan-out with per-subscriber isolation
//! - [`registry`] - Definition registry keyed by id and version
//! - [`state_machine`] - Instance and pointer status transitions
//! - [`config`] - File- and environment-driven engine configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use conductor_core::builder::{DefinitionError, OrchestrationBuilder};
//! use conductor_core::config::ConductorConfig;
//! use conductor_core::locking::InProcessLockProvider;
//! use conductor_core::models::ExecutionResult;
//! use conductor_core::orchestration::{Orchestration, OrchestrationController};
//! use conductor_core::persistence::InMemoryOrchestrationRepository;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct OrderData {
//!     paid: bool,
//! }
//!
//! struct OrderFulfillment;
//!
//! impl Orchestration for OrderFulfillment {
//!     type Data = OrderData;
//!
//!     fn definition_id(&self) -> &str {
//!         "order-fulfillment"
//!     }
//!
//!     fn build(
//!         &self,
//!         builder: &mut OrchestrationBuilder<OrderData>,
//!     ) -> Result<(), DefinitionError> {
//!         builder
//!             .start_with_inline("reserve-stock", |_ctx| Ok(ExecutionResult::next()))
//!             .wait_for("payment.confirmed", "order-1", None)
//!             .end();
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = OrchestrationController::new(
//!     Arc::new(InMemoryOrchestrationRepository::new()),
//!     Arc::new(InProcessLockProvider::default()),
//!     ConductorConfig::default(),
//! );
//! controller.register_orchestration(OrderFulfillment)?;
//!
//! let instance_id = controller
//!     .start_orchestration("order-fulfillment", "order-1", None, OrderData { paid: false })
//!     .await?;
//! controller
//!     .publish_orchestration_event("payment.confirmed", "order-1", serde_json::json!({}))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod locking;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod registry;
pub mod state_machine;
pub mod utils;

pub use builder::{DefinitionError, OrchestrationBuilder, StepBuilder};
pub use config::{ConductorConfig, ConfigManager};
pub use constants::{status_groups, system, OrchestrationStatus, PointerStatus};
pub use error::{ConductorError, Result};
pub use events::{LifeCycleEvent, LifeCycleEventPublisher};
pub use models::{
    AsyncStepBody, ExecutionPointer, ExecutionResult, OrchestrationDefinition, RetryPolicy,
    SyncStepBody,
};
pub use orchestration::{
    ExecutionPassOutcome, Orchestration, OrchestrationController, OrchestrationError,
    OrchestrationExecutor, OrchestrationInstance, StepExecutionContext,
};
pub use persistence::{InMemoryOrchestrationRepository, OrchestrationRepository};
