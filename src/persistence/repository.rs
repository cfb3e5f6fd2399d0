use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ExecutionPointer, OrchestrationEventRecord, OrchestrationInstanceRecord, PointerId, StepId,
};
use crate::state_machine::OrchestrationStatus;

/// Storage contract the executor and controller operate against.
///
/// Implementations must make each operation atomic on its own;
/// `try_mark_event_processed` in particular is the first-winner primitive
/// that guarantees an event activates at most one waiting pointer.
#[async_trait]
pub trait OrchestrationRepository: Send + Sync {
    // Instance lifecycle

    async fn create_new_orchestration(&self, instance: &OrchestrationInstanceRecord)
        -> Result<()>;

    async fn update_orchestration_status(
        &self,
        instance_id: Uuid,
        status: OrchestrationStatus,
        complete_time: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Persist the durable form of the instance payload
    async fn update_instance_data(&self, instance_id: Uuid, data: &Value) -> Result<()>;

    async fn get_orchestration_instance(
        &self,
        instance_id: Uuid,
    ) -> Result<Option<OrchestrationInstanceRecord>>;

    async fn is_completed_orchestration(&self, instance_id: Uuid) -> Result<bool>;

    // Execution pointers

    async fn add_execution_pointer(
        &self,
        instance_id: Uuid,
        pointer: &ExecutionPointer,
    ) -> Result<()>;

    /// Add a pointer owned as a nested child of `parent_pointer_id`
    async fn add_nested_execution_pointer(
        &self,
        instance_id: Uuid,
        parent_pointer_id: PointerId,
        pointer: &ExecutionPointer,
    ) -> Result<()>;

    async fn update_execution_pointer(
        &self,
        instance_id: Uuid,
        pointer: &ExecutionPointer,
    ) -> Result<()>;

    async fn get_execution_pointers(&self, instance_id: Uuid) -> Result<Vec<ExecutionPointer>>;

    /// Most recent pointer at `step_id`, if any
    async fn get_step_execution_pointer(
        &self,
        instance_id: Uuid,
        step_id: StepId,
    ) -> Result<Option<ExecutionPointer>>;

    // Event correlation

    async fn add_event(&self, event: &OrchestrationEventRecord) -> Result<()>;

    async fn get_unprocessed_events(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Vec<OrchestrationEventRecord>>;

    /// Atomically claim an event; returns false when another pointer won
    async fn try_mark_event_processed(&self, event_id: Uuid) -> Result<bool>;

    // Branch-completion bookkeeping

    async fn add_finalized_branch(
        &self,
        instance_id: Uuid,
        controller_step_id: StepId,
        branch_entry_step_id: StepId,
    ) -> Result<()>;

    async fn get_finalized_branch_ids(
        &self,
        instance_id: Uuid,
        controller_step_id: StepId,
    ) -> Result<Vec<StepId>>;
}
