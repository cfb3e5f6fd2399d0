//! # In-Memory Repository
//!
//! Reference repository backed by dashmap shards. State survives only as
//! long as the process; the value of this implementation is exact contract
//! semantics (atomic event claims, nested-pointer ownership, append-only
//! pointer history) for tests and embedded single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ConductorError, Result};
use crate::models::{
    ExecutionPointer, OrchestrationEventRecord, OrchestrationInstanceRecord, PointerId, StepId,
};
use crate::state_machine::OrchestrationStatus;

use super::repository::OrchestrationRepository;

#[derive(Default)]
pub struct InMemoryOrchestrationRepository {
    instances: DashMap<Uuid, OrchestrationInstanceRecord>,
    /// Pointer forests per instance, in creation order
    pointers: DashMap<Uuid, Vec<ExecutionPointer>>,
    events: DashMap<Uuid, OrchestrationEventRecord>,
    /// (instance, controller step) -> finalized branch entries
    finalized_branches: DashMap<(Uuid, StepId), Vec<StepId>>,
    /// Serializes event claims so exactly one claimant wins
    event_claim_guard: Mutex<()>,
}

impl InMemoryOrchestrationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn missing_instance(instance_id: Uuid) -> ConductorError {
        ConductorError::PersistenceError(format!("unknown orchestration instance {instance_id}"))
    }
}

#[async_trait]
impl OrchestrationRepository for InMemoryOrchestrationRepository {
    async fn create_new_orchestration(
        &self,
        instance: &OrchestrationInstanceRecord,
    ) -> Result<()> {
        if self.instances.contains_key(&instance.id) {
            return Err(ConductorError::PersistenceError(format!(
                "orchestration instance {} already exists",
                instance.id
            )));
        }
        self.instances.insert(instance.id, instance.clone());
        self.pointers.insert(instance.id, Vec::new());
        Ok(())
    }

    async fn update_orchestration_status(
        &self,
        instance_id: Uuid,
        status: OrchestrationStatus,
        complete_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut instance = self
            .instances
            .get_mut(&instance_id)
            .ok_or_else(|| Self::missing_instance(instance_id))?;
        instance.status = status;
        if complete_time.is_some() {
            instance.complete_time = complete_time;
        }
        Ok(())
    }

    async fn update_instance_data(&self, instance_id: Uuid, data: &Value) -> Result<()> {
        let mut instance = self
            .instances
            .get_mut(&instance_id)
            .ok_or_else(|| Self::missing_instance(instance_id))?;
        instance.data = data.clone();
        Ok(())
    }

    async fn get_orchestration_instance(
        &self,
        instance_id: Uuid,
    ) -> Result<Option<OrchestrationInstanceRecord>> {
        Ok(self.instances.get(&instance_id).map(|entry| entry.clone()))
    }

    async fn is_completed_orchestration(&self, instance_id: Uuid) -> Result<bool> {
        Ok(self
            .instances
            .get(&instance_id)
            .map(|entry| entry.status == OrchestrationStatus::Completed)
            .unwrap_or(false))
    }

    async fn add_execution_pointer(
        &self,
        instance_id: Uuid,
        pointer: &ExecutionPointer,
    ) -> Result<()> {
        let mut pointers = self
            .pointers
            .get_mut(&instance_id)
            .ok_or_else(|| Self::missing_instance(instance_id))?;
        pointers.push(pointer.clone());
        Ok(())
    }

    async fn add_nested_execution_pointer(
        &self,
        instance_id: Uuid,
        parent_pointer_id: PointerId,
        pointer: &ExecutionPointer,
    ) -> Result<()> {
        let mut pointers = self
            .pointers
            .get_mut(&instance_id)
            .ok_or_else(|| Self::missing_instance(instance_id))?;

        let parent = pointers
            .iter_mut()
            .find(|candidate| candidate.id == parent_pointer_id)
            .ok_or_else(|| {
                ConductorError::PersistenceError(format!(
                    "unknown parent pointer {parent_pointer_id} for nested pointer"
                ))
            })?;
        parent.nested_pointers.push(pointer.id);
        pointers.push(pointer.clone());
        Ok(())
    }

    async fn update_execution_pointer(
        &self,
        instance_id: Uuid,
        pointer: &ExecutionPointer,
    ) -> Result<()> {
        let mut pointers = self
            .pointers
            .get_mut(&instance_id)
            .ok_or_else(|| Self::missing_instance(instance_id))?;

        let stored = pointers
            .iter_mut()
            .find(|candidate| candidate.id == pointer.id)
            .ok_or_else(|| {
                ConductorError::PersistenceError(format!("unknown execution pointer {}", pointer.id))
            })?;
        *stored = pointer.clone();
        Ok(())
    }

    async fn get_execution_pointers(&self, instance_id: Uuid) -> Result<Vec<ExecutionPointer>> {
        Ok(self
            .pointers
            .get(&instance_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn get_step_execution_pointer(
        &self,
        instance_id: Uuid,
        step_id: StepId,
    ) -> Result<Option<ExecutionPointer>> {
        Ok(self.pointers.get(&instance_id).and_then(|pointers| {
            pointers
                .iter()
                .rev()
                .find(|pointer| pointer.step_id == step_id)
                .cloned()
        }))
    }

    async fn add_event(&self, event: &OrchestrationEventRecord) -> Result<()> {
        self.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn get_unprocessed_events(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Vec<OrchestrationEventRecord>> {
        let mut matching: Vec<OrchestrationEventRecord> = self
            .events
            .iter()
            .filter(|entry| entry.matches(name, key))
            .map(|entry| entry.clone())
            .collect();
        matching.sort_by_key(|event| event.received_at);
        Ok(matching)
    }

    async fn try_mark_event_processed(&self, event_id: Uuid) -> Result<bool> {
        let _guard = self.event_claim_guard.lock();
        match self.events.get_mut(&event_id) {
            Some(mut event) if !event.processed => {
                event.processed = true;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(ConductorError::PersistenceError(format!(
                "unknown orchestration event {event_id}"
            ))),
        }
    }

    async fn add_finalized_branch(
        &self,
        instance_id: Uuid,
        controller_step_id: StepId,
        branch_entry_step_id: StepId,
    ) -> Result<()> {
        let mut finalized = self
            .finalized_branches
            .entry((instance_id, controller_step_id))
            .or_default();
        if !finalized.contains(&branch_entry_step_id) {
            finalized.push(branch_entry_step_id);
        }
        Ok(())
    }

    async fn get_finalized_branch_ids(
        &self,
        instance_id: Uuid,
        controller_step_id: StepId,
    ) -> Result<Vec<StepId>> {
        Ok(self
            .finalized_branches
            .get(&(instance_id, controller_step_id))
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance_record() -> OrchestrationInstanceRecord {
        OrchestrationInstanceRecord::new("billing", 1, "invoice-7", json!({"total": 0}), Utc::now())
    }

    #[tokio::test]
    async fn test_instance_round_trip() {
        let repository = InMemoryOrchestrationRepository::new();
        let record = instance_record();
        repository.create_new_orchestration(&record).await.unwrap();

        let loaded = repository
            .get_orchestration_instance(record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.orchestration_key, "invoice-7");
        assert!(!repository.is_completed_orchestration(record.id).await.unwrap());

        repository
            .update_orchestration_status(record.id, OrchestrationStatus::Completed, Some(Utc::now()))
            .await
            .unwrap();
        assert!(repository.is_completed_orchestration(record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_instance_rejected() {
        let repository = InMemoryOrchestrationRepository::new();
        let record = instance_record();
        repository.create_new_orchestration(&record).await.unwrap();
        assert!(repository.create_new_orchestration(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_nested_pointer_ownership() {
        let repository = InMemoryOrchestrationRepository::new();
        let record = instance_record();
        repository.create_new_orchestration(&record).await.unwrap();

        let parent = ExecutionPointer::at_step(Uuid::new_v4());
        repository
            .add_execution_pointer(record.id, &parent)
            .await
            .unwrap();

        let child = ExecutionPointer::at_step(Uuid::new_v4());
        repository
            .add_nested_execution_pointer(record.id, parent.id, &child)
            .await
            .unwrap();

        let pointers = repository.get_execution_pointers(record.id).await.unwrap();
        assert_eq!(pointers.len(), 2);
        assert_eq!(pointers[0].nested_pointers, vec![child.id]);
    }

    #[tokio::test]
    async fn test_event_claimed_at_most_once() {
        let repository = InMemoryOrchestrationRepository::new();
        let event =
            OrchestrationEventRecord::new("payment.confirmed", "invoice-7", json!({}), Utc::now());
        repository.add_event(&event).await.unwrap();

        assert!(repository.try_mark_event_processed(event.id).await.unwrap());
        assert!(!repository.try_mark_event_processed(event.id).await.unwrap());

        let unprocessed = repository
            .get_unprocessed_events("payment.confirmed", "invoice-7")
            .await
            .unwrap();
        assert!(unprocessed.is_empty());
    }

    #[tokio::test]
    async fn test_finalized_branch_bookkeeping_deduplicates() {
        let repository = InMemoryOrchestrationRepository::new();
        let instance_id = Uuid::new_v4();
        let controller = Uuid::new_v4();
        let entry = Uuid::new_v4();

        repository
            .add_finalized_branch(instance_id, controller, entry)
            .await
            .unwrap();
        repository
            .add_finalized_branch(instance_id, controller, entry)
            .await
            .unwrap();

        let finalized = repository
            .get_finalized_branch_ids(instance_id, controller)
            .await
            .unwrap();
        assert_eq!(finalized, vec![entry]);
    }
}
