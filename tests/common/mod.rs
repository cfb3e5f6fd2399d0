//! Shared fixtures for integration tests: an engine harness wired to the
//! in-memory repository, the in-process lock provider, and a manual clock
//! so time-driven behavior is deterministic.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use conductor_core::events::LifeCycleEventPublisher;
use conductor_core::locking::InProcessLockProvider;
use conductor_core::models::{OrchestrationDefinition, OrchestrationInstanceRecord};
use conductor_core::orchestration::{
    ExecutionPointerFactory, OrchestrationExecutor, OrchestrationInstance,
};
use conductor_core::persistence::{InMemoryOrchestrationRepository, OrchestrationRepository};
use conductor_core::utils::{Clock, ManualClock};

pub struct EngineHarness {
    pub repository: Arc<InMemoryOrchestrationRepository>,
    pub locks: Arc<InProcessLockProvider>,
    pub clock: Arc<ManualClock>,
    pub lifecycle: LifeCycleEventPublisher,
    pub executor: Arc<OrchestrationExecutor>,
}

impl EngineHarness {
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryOrchestrationRepository::new());
        let clock = Arc::new(ManualClock::starting_at(Utc::now()));
        let locks = Arc::new(InProcessLockProvider::new(clock.clone()));
        let lifecycle = LifeCycleEventPublisher::default();
        let executor = Arc::new(OrchestrationExecutor::new(
            repository.clone(),
            locks.clone(),
            lifecycle.clone(),
            clock.clone(),
            "test-host",
        ));

        Self {
            repository,
            locks,
            clock,
            lifecycle,
            executor,
        }
    }

    /// Persist an instance with its genesis pointer and wrap it in a
    /// runtime instance the tests can drive manually
    pub async fn start_instance(
        &self,
        definition: OrchestrationDefinition,
        orchestration_key: &str,
        data: Value,
    ) -> Arc<OrchestrationInstance> {
        let definition = Arc::new(definition);
        let record = OrchestrationInstanceRecord::new(
            definition.id.clone(),
            definition.version,
            orchestration_key,
            data,
            self.clock.now_utc(),
        );
        self.repository
            .create_new_orchestration(&record)
            .await
            .expect("instance persists");

        let factory = ExecutionPointerFactory::new();
        let genesis = factory
            .build_genesis_pointer(&definition)
            .expect("definition has steps");
        self.repository
            .add_execution_pointer(record.id, &genesis)
            .await
            .expect("genesis pointer persists");

        Arc::new(OrchestrationInstance::new(
            record,
            definition,
            self.executor.clone(),
        ))
    }
}
