//! # Orchestration Instance
//!
//! Runtime binding of a definition, an orchestration key, the shared data
//! payload, and the executor, driven by a self-rescheduling idle worker.
//! The worker is an explicit task loop — run a pass, then park on the re-arm
//! signal or the idle timeout — so the "at most one in-flight pass per
//! instance" invariant is carried by the pass mutex rather than implied by
//! timer callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex as SyncMutex, RwLock};
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

use crate::models::{
    derive_lock_key, ExecutionPointer, OrchestrationDefinition, OrchestrationInstanceRecord,
    OrchestrationStep,
};
use crate::state_machine::OrchestrationStatus;

use super::context::StepExecutionContext;
use super::executor::OrchestrationExecutor;

pub struct OrchestrationInstance {
    id: Uuid,
    orchestration_key: String,
    definition: Arc<OrchestrationDefinition>,
    data: Arc<RwLock<Value>>,
    executor: Arc<OrchestrationExecutor>,
    /// Guards against concurrent passes over this instance in-process
    pub(crate) pass_lock: Mutex<()>,
    cached_status: RwLock<OrchestrationStatus>,
    cancellation: Arc<AtomicBool>,
    rearm: Notify,
    shutdown: AtomicBool,
    shutdown_notify: Notify,
    worker: SyncMutex<Option<JoinHandle<()>>>,
}

impl OrchestrationInstance {
    pub fn new(
        record: OrchestrationInstanceRecord,
        definition: Arc<OrchestrationDefinition>,
        executor: Arc<OrchestrationExecutor>,
    ) -> Self {
        Self {
            id: record.id,
            orchestration_key: record.orchestration_key,
            definition,
            data: Arc::new(RwLock::new(record.data)),
            executor,
            pass_lock: Mutex::new(()),
            cached_status: RwLock::new(record.status),
            cancellation: Arc::new(AtomicBool::new(false)),
            rearm: Notify::new(),
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
            worker: SyncMutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn orchestration_key(&self) -> &str {
        &self.orchestration_key
    }

    pub fn definition(&self) -> &Arc<OrchestrationDefinition> {
        &self.definition
    }

    /// Distributed-lock key for this orchestration identity
    pub fn lock_key(&self) -> String {
        derive_lock_key(
            &self.definition.id,
            self.definition.version,
            &self.orchestration_key,
        )
    }

    /// Clone of the current in-memory payload
    pub fn data_snapshot(&self) -> Value {
        self.data.read().clone()
    }

    pub fn replace_data(&self, data: Value) {
        *self.data.write() = data;
    }

    pub fn cached_status(&self) -> OrchestrationStatus {
        *self.cached_status.read()
    }

    pub(crate) fn set_cached_status(&self, status: OrchestrationStatus) {
        *self.cached_status.write() = status;
    }

    /// Context handed to a step body
    pub(crate) fn step_context(
        &self,
        step: Arc<OrchestrationStep>,
        pointer: ExecutionPointer,
    ) -> StepExecutionContext {
        StepExecutionContext::new(
            self.id,
            self.orchestration_key.clone(),
            step,
            pointer,
            self.data.clone(),
            self.cancellation.clone(),
        )
    }

    /// Signal cooperative cancellation to running step bodies
    pub fn request_cancellation(&self) {
        self.cancellation.store(true, Ordering::Release);
    }

    pub fn cancellation_requested(&self) -> bool {
        self.cancellation.load(Ordering::Acquire)
    }

    /// Nudge the worker to run a pass before the idle timeout elapses
    pub fn wake(&self) {
        self.rearm.notify_waiters();
    }

    /// Run a single executor pass inline
    pub async fn run_once(&self) -> super::types::ExecutionPassOutcome {
        self.executor.execute(self).await
    }

    /// Spawn the idle worker: one pass now, then re-poll on wake or after
    /// the definition's idle timeout until a terminal outcome
    pub fn start_worker(self: Arc<Self>) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let instance = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            debug!(instance_id = %instance.id, "orchestration worker started");
            loop {
                if instance.shutdown.load(Ordering::Acquire) {
                    break;
                }

                let outcome = instance.executor.execute(&instance).await;
                if outcome.is_terminal() {
                    debug!(
                        instance_id = %instance.id,
                        outcome = ?outcome,
                        "orchestration worker finished"
                    );
                    break;
                }

                tokio::select! {
                    _ = instance.rearm.notified() => {}
                    _ = instance.shutdown_notify.notified() => {}
                    _ = tokio::time::sleep(instance.definition.worker_idle_timeout) => {}
                }
            }
        });
        *worker = Some(handle);
    }

    /// Ask the worker to stop after its current pass
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.shutdown_notify.notify_waiters();
        self.rearm.notify_waiters();
    }

    /// Stop and wait for the worker task to exit
    pub async fn join_worker(&self) {
        self.stop();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(instance_id = %self.id, error = %e, "worker task join failed");
            }
        }
    }
}
