//! # Step Execution Context
//!
//! The view a step body gets of its running orchestration: identity, the
//! current step and pointer, typed access to the shared data payload, the
//! payload of the event that released a preceding wait, and the cooperative
//! cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{ExecutionPointer, OrchestrationStep};

#[derive(Clone)]
pub struct StepExecutionContext {
    instance_id: Uuid,
    orchestration_key: String,
    step: Arc<OrchestrationStep>,
    pointer: ExecutionPointer,
    data: Arc<RwLock<Value>>,
    cancellation: Arc<AtomicBool>,
}

impl StepExecutionContext {
    pub fn new(
        instance_id: Uuid,
        orchestration_key: String,
        step: Arc<OrchestrationStep>,
        pointer: ExecutionPointer,
        data: Arc<RwLock<Value>>,
        cancellation: Arc<AtomicBool>,
    ) -> Self {
        Self {
            instance_id,
            orchestration_key,
            step,
            pointer,
            data,
            cancellation,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn orchestration_key(&self) -> &str {
        &self.orchestration_key
    }

    pub fn step(&self) -> &OrchestrationStep {
        &self.step
    }

    pub fn pointer(&self) -> &ExecutionPointer {
        &self.pointer
    }

    /// Payload of the matched event, present when the current pointer was
    /// promoted out of an event wait
    pub fn event_data(&self) -> Option<&Value> {
        self.pointer.event_data.as_ref()
    }

    /// Typed snapshot of the instance data
    pub fn data_as<TData: DeserializeOwned>(&self) -> anyhow::Result<TData> {
        let snapshot = self.data.read().clone();
        Ok(serde_json::from_value(snapshot)?)
    }

    /// Replace the instance data with a typed value
    pub fn store_data<TData: Serialize>(&self, data: &TData) -> anyhow::Result<()> {
        let value = serde_json::to_value(data)?;
        *self.data.write() = value;
        Ok(())
    }

    /// Read-modify-write over the typed payload
    pub fn mutate_data<TData, F>(&self, mutate: F) -> anyhow::Result<()>
    where
        TData: DeserializeOwned + Serialize,
        F: FnOnce(&mut TData),
    {
        let mut typed: TData = self.data_as()?;
        mutate(&mut typed);
        self.store_data(&typed)
    }

    /// Cooperative cancellation: long-running bodies should poll this
    pub fn cancellation_requested(&self) -> bool {
        self.cancellation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StepKind;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        attempts: u32,
    }

    fn context_with(data: Value) -> StepExecutionContext {
        let step = Arc::new(OrchestrationStep::new("noop", StepKind::End));
        let pointer = ExecutionPointer::at_step(step.id);
        StepExecutionContext::new(
            Uuid::new_v4(),
            "key-1".to_string(),
            step,
            pointer,
            Arc::new(RwLock::new(data)),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_typed_data_round_trip() {
        let ctx = context_with(json!({"attempts": 1}));
        let payload: Payload = ctx.data_as().unwrap();
        assert_eq!(payload, Payload { attempts: 1 });

        ctx.mutate_data::<Payload, _>(|p| p.attempts += 1).unwrap();
        let payload: Payload = ctx.data_as().unwrap();
        assert_eq!(payload.attempts, 2);
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let ctx = context_with(json!({"unexpected": true}));
        assert!(ctx.data_as::<Payload>().is_err());
    }
}
