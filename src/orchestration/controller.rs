//! # Orchestration Controller
//!
//! Public API surface of the engine: definition registration, orchestration
//! start with singleton get-or-create semantics, suspend/resume/terminate
//! lifecycle operations under the distributed lock, read-only queries, and
//! lifecycle-event fan-out. Other subsystems (the bus layer feeding event
//! waits included) interact with the core exclusively through this type and
//! the lifecycle stream.

use std::any::type_name;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::builder::{DefinitionError, OrchestrationBuilder};
use crate::config::ConductorConfig;
use crate::events::{LifeCycleEvent, LifeCycleEventPublisher, LifeCycleSubscriber};
use crate::locking::DistributedLockProvider;
use crate::models::{
    derive_lock_key, ExecutionPointer, OrchestrationEventRecord, OrchestrationInstanceRecord,
};
use crate::persistence::OrchestrationRepository;
use crate::registry::DefinitionRegistry;
use crate::state_machine::OrchestrationStatus;
use crate::utils::{Clock, SystemClock};

use super::errors::{OrchestrationError, OrchestrationResult};
use super::executor::OrchestrationExecutor;
use super::instance::OrchestrationInstance;
use super::pointer_factory::ExecutionPointerFactory;
use super::types::{ExecutionPassOutcome, Orchestration};

pub struct OrchestrationController {
    registry: Arc<DefinitionRegistry>,
    repository: Arc<dyn OrchestrationRepository>,
    lock_provider: Arc<dyn DistributedLockProvider>,
    lifecycle: LifeCycleEventPublisher,
    executor: Arc<OrchestrationExecutor>,
    pointer_factory: ExecutionPointerFactory,
    clock: Arc<dyn Clock>,
    config: ConductorConfig,
    lock_owner: String,
    instances: DashMap<Uuid, Arc<OrchestrationInstance>>,
    singleton_index: DashMap<String, Uuid>,
    /// Serializes instance creation so singleton get-or-create is
    /// first-writer-wins with exactly one genesis pointer
    creation_lock: Mutex<()>,
}

impl OrchestrationController {
    pub fn new(
        repository: Arc<dyn OrchestrationRepository>,
        lock_provider: Arc<dyn DistributedLockProvider>,
        config: ConductorConfig,
    ) -> Self {
        Self::with_clock(repository, lock_provider, config, Arc::new(SystemClock))
    }

    /// Constructor with an injected clock, for simulated-time tests
    pub fn with_clock(
        repository: Arc<dyn OrchestrationRepository>,
        lock_provider: Arc<dyn DistributedLockProvider>,
        config: ConductorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let lock_owner = config
            .engine
            .lock_owner
            .clone()
            .unwrap_or_else(|| format!("conductor-{}", Uuid::new_v4()));
        let lifecycle = LifeCycleEventPublisher::new(config.events.channel_capacity);
        let executor = Arc::new(OrchestrationExecutor::new(
            repository.clone(),
            lock_provider.clone(),
            lifecycle.clone(),
            clock.clone(),
            lock_owner.clone(),
        ));

        Self {
            registry: Arc::new(DefinitionRegistry::new()),
            repository,
            lock_provider,
            lifecycle,
            executor,
            pointer_factory: ExecutionPointerFactory::new(),
            clock,
            config,
            lock_owner,
            instances: DashMap::new(),
            singleton_index: DashMap::new(),
            creation_lock: Mutex::new(()),
        }
    }

    /// Build, validate, and register an orchestration definition
    pub fn register_orchestration<O: Orchestration>(
        &self,
        orchestration: O,
    ) -> Result<(), DefinitionError> {
        let mut builder: OrchestrationBuilder<O::Data> =
            OrchestrationBuilder::new(orchestration.definition_id(), orchestration.version());
        orchestration.build(&mut builder)?;
        let definition = builder.build()?;
        self.registry
            .register(definition)
            .map_err(|e| DefinitionError::Registration(e.to_string()))
    }

    /// Start an orchestration: persist the instance and its genesis pointer,
    /// announce it, and trigger the first executor pass.
    ///
    /// For singleton definitions, a second start with the same key returns
    /// the existing instance id without creating anything.
    pub async fn start_orchestration<TData>(
        &self,
        definition_id: &str,
        orchestration_key: &str,
        version: Option<i32>,
        data: TData,
    ) -> OrchestrationResult<Uuid>
    where
        TData: serde::Serialize + Send + Sync + 'static,
    {
        let definition = self
            .registry
            .resolve(definition_id, version)
            .map_err(OrchestrationError::from)?;

        if definition.data_type != type_name::<TData>() {
            return Err(OrchestrationError::DataTypeMismatch {
                definition_id: definition.id.clone(),
                expected: definition.data_type,
                actual: type_name::<TData>(),
            });
        }

        let singleton_key =
            derive_lock_key(&definition.id, definition.version, orchestration_key);

        let _creation_guard = self.creation_lock.lock().await;

        if definition.is_singleton {
            if let Some(existing_id) = self.singleton_index.get(&singleton_key) {
                if self.instances.contains_key(&*existing_id) {
                    info!(
                        definition_id = %definition.id,
                        orchestration_key = %orchestration_key,
                        instance_id = %*existing_id,
                        "singleton orchestration already running; returning existing instance"
                    );
                    return Ok(*existing_id);
                }
            }
        }

        let data_value = serde_json::to_value(&data)?;
        let record = OrchestrationInstanceRecord::new(
            definition.id.clone(),
            definition.version,
            orchestration_key,
            data_value,
            self.clock.now_utc(),
        );
        self.repository.create_new_orchestration(&record).await?;

        let genesis = self
            .pointer_factory
            .build_genesis_pointer(&definition)
            .ok_or_else(|| {
                OrchestrationError::configuration(format!(
                    "definition '{}' has no steps",
                    definition.id
                ))
            })?;
        self.repository
            .add_execution_pointer(record.id, &genesis)
            .await?;

        let instance = Arc::new(OrchestrationInstance::new(
            record.clone(),
            definition.clone(),
            self.executor.clone(),
        ));
        self.instances.insert(record.id, instance.clone());
        if definition.is_singleton {
            self.singleton_index.insert(singleton_key, record.id);
        }

        info!(
            definition_id = %definition.id,
            version = definition.version,
            orchestration_key = %orchestration_key,
            instance_id = %record.id,
            "orchestration started"
        );
        self.lifecycle
            .publish(LifeCycleEvent::OrchestrationStarted {
                instance_id: record.id,
                definition_id: definition.id.clone(),
                version: definition.version,
                orchestration_key: orchestration_key.to_string(),
                at: self.clock.now_utc(),
            })
            .await;

        if self.config.engine.worker_polling_enabled {
            instance.clone().start_worker();
        } else {
            instance.run_once().await;
        }

        Ok(record.id)
    }

    /// Suspend a running orchestration. Returns whether the transition
    /// occurred.
    pub async fn suspend_orchestration(&self, instance_id: Uuid) -> OrchestrationResult<bool> {
        let transitioned = self
            .transition_status(instance_id, OrchestrationStatus::Suspended)
            .await?;
        if transitioned {
            if let Some(instance) = self.instances.get(&instance_id) {
                instance.set_cached_status(OrchestrationStatus::Suspended);
            }
            self.lifecycle
                .publish(LifeCycleEvent::OrchestrationSuspended {
                    instance_id,
                    at: self.clock.now_utc(),
                })
                .await;
        }
        Ok(transitioned)
    }

    /// Resume a suspended orchestration: re-activate its suspended pointers
    /// and wake (or rehydrate) the worker. Returns whether the transition
    /// occurred.
    pub async fn resume_orchestration(&self, instance_id: Uuid) -> OrchestrationResult<bool> {
        let transitioned = self
            .transition_status(instance_id, OrchestrationStatus::Running)
            .await?;
        if !transitioned {
            return Ok(false);
        }

        // Operator intervention: suspended pointers get a fresh retry budget
        let pointers = self.repository.get_execution_pointers(instance_id).await?;
        for pointer in pointers {
            if pointer.status == crate::state_machine::PointerStatus::Suspended {
                let mut reactivated = pointer;
                reactivated.reactivate();
                self.repository
                    .update_execution_pointer(instance_id, &reactivated)
                    .await?;
            }
        }

        self.lifecycle
            .publish(LifeCycleEvent::OrchestrationResumed {
                instance_id,
                at: self.clock.now_utc(),
            })
            .await;

        let instance = self.ensure_instance(instance_id).await?;
        instance.set_cached_status(OrchestrationStatus::Running);
        if self.config.engine.worker_polling_enabled {
            instance.clone().start_worker();
            instance.wake();
        } else {
            instance.run_once().await;
        }
        Ok(true)
    }

    /// Terminate an orchestration. Returns whether the transition occurred.
    pub async fn terminate_orchestration(&self, instance_id: Uuid) -> OrchestrationResult<bool> {
        let transitioned = self
            .transition_status(instance_id, OrchestrationStatus::Terminated)
            .await?;
        if !transitioned {
            return Ok(false);
        }

        self.lifecycle
            .publish(LifeCycleEvent::OrchestrationTerminated {
                instance_id,
                at: self.clock.now_utc(),
            })
            .await;

        if let Some(instance) = self.instances.get(&instance_id) {
            instance.set_cached_status(OrchestrationStatus::Terminated);
            instance.request_cancellation();
            instance.stop();
        }
        Ok(true)
    }

    /// Validate and persist a status transition under the distributed lock.
    /// Lock contention is benign: the transition simply did not occur.
    async fn transition_status(
        &self,
        instance_id: Uuid,
        target: OrchestrationStatus,
    ) -> OrchestrationResult<bool> {
        let record = self
            .repository
            .get_orchestration_instance(instance_id)
            .await?
            .ok_or(OrchestrationError::InstanceNotFound { instance_id })?;

        let lock_key = record.lock_key();
        let definition = self
            .registry
            .resolve(&record.definition_id, Some(record.version))
            .map_err(OrchestrationError::from)?;
        let expires_at = self.clock.now_utc()
            + chrono::Duration::from_std(definition.default_lock_expiration).map_err(|e| {
                OrchestrationError::configuration(format!("lock expiration out of range: {e}"))
            })?;

        let acquisition = self
            .lock_provider
            .acquire_lock(&lock_key, &self.lock_owner, expires_at)
            .await?;
        if !acquisition.succeeded {
            warn!(
                instance_id = %instance_id,
                lock_key = %lock_key,
                target = %target,
                "lock contended; lifecycle transition not applied"
            );
            return Ok(false);
        }

        // Re-validate under the lock, then persist; release on every path.
        let result = async {
            let record = self
                .repository
                .get_orchestration_instance(instance_id)
                .await?
                .ok_or(OrchestrationError::InstanceNotFound { instance_id })?;

            if !record.status.can_transition_to(target) {
                info!(
                    instance_id = %instance_id,
                    from = %record.status,
                    to = %target,
                    "lifecycle transition rejected"
                );
                return Ok(false);
            }

            let complete_time = target
                .is_terminal()
                .then(|| self.clock.now_utc());
            self.repository
                .update_orchestration_status(instance_id, target, complete_time)
                .await?;
            Ok(true)
        }
        .await;

        if let Err(e) = self.lock_provider.release_lock(&lock_key, &self.lock_owner).await {
            warn!(instance_id = %instance_id, error = %e, "lock release failed");
        }

        result
    }

    // Query operations

    pub async fn get_orchestration_instance(
        &self,
        instance_id: Uuid,
    ) -> OrchestrationResult<Option<OrchestrationInstanceRecord>> {
        Ok(self.repository.get_orchestration_instance(instance_id).await?)
    }

    pub async fn is_completed_orchestration(&self, instance_id: Uuid) -> OrchestrationResult<bool> {
        Ok(self.repository.is_completed_orchestration(instance_id).await?)
    }

    pub async fn get_orchestration_execution_pointers(
        &self,
        instance_id: Uuid,
    ) -> OrchestrationResult<Vec<ExecutionPointer>> {
        Ok(self.repository.get_execution_pointers(instance_id).await?)
    }

    // Event surface

    /// Record an external orchestration event and nudge in-memory instances
    /// so waiting pointers correlate promptly. This is the surface the bus
    /// layer calls.
    pub async fn publish_orchestration_event(
        &self,
        name: impl Into<String>,
        key: impl Into<String>,
        payload: serde_json::Value,
    ) -> OrchestrationResult<()> {
        let event =
            OrchestrationEventRecord::new(name, key, payload, self.clock.now_utc());
        self.repository.add_event(&event).await?;

        for entry in self.instances.iter() {
            entry.value().wake();
        }
        Ok(())
    }

    /// Register a lifecycle callback; failures in the callback are logged
    /// and isolated
    pub async fn on_lifecycle_event(
        &self,
        subscriber_name: impl Into<String>,
        callback: LifeCycleSubscriber,
    ) {
        self.lifecycle
            .register_subscriber(subscriber_name, callback)
            .await;
    }

    /// Subscribe to the lifecycle broadcast stream
    pub fn subscribe_lifecycle_events(&self) -> broadcast::Receiver<LifeCycleEvent> {
        self.lifecycle.subscribe()
    }

    /// Run one executor pass for an instance inline. Useful for hosts that
    /// drive execution from bus messages instead of worker polling.
    pub async fn run_executor_pass(
        &self,
        instance_id: Uuid,
    ) -> OrchestrationResult<ExecutionPassOutcome> {
        let instance = self.ensure_instance(instance_id).await?;
        Ok(instance.run_once().await)
    }

    /// Stop all instance workers and wait for them to exit
    pub async fn shutdown(&self) {
        let instances: Vec<Arc<OrchestrationInstance>> = self
            .instances
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for instance in &instances {
            instance.stop();
        }
        join_all(instances.iter().map(|instance| instance.join_worker())).await;
        info!("orchestration controller shut down");
    }

    /// In-memory instance for `instance_id`, rehydrated from the repository
    /// when this process has no cached copy (crash recovery)
    async fn ensure_instance(
        &self,
        instance_id: Uuid,
    ) -> OrchestrationResult<Arc<OrchestrationInstance>> {
        if let Some(instance) = self.instances.get(&instance_id) {
            return Ok(instance.clone());
        }

        let record = self
            .repository
            .get_orchestration_instance(instance_id)
            .await?
            .ok_or(OrchestrationError::InstanceNotFound { instance_id })?;
        let definition = self
            .registry
            .resolve(&record.definition_id, Some(record.version))
            .map_err(OrchestrationError::from)?;

        let singleton_key = record.lock_key();
        let instance = Arc::new(OrchestrationInstance::new(
            record,
            definition.clone(),
            self.executor.clone(),
        ));
        self.instances.insert(instance_id, instance.clone());
        if definition.is_singleton {
            self.singleton_index.insert(singleton_key, instance_id);
        }
        Ok(instance)
    }
}
