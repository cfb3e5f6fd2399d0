//! # Execution Pointer Factory
//!
//! Builds the three pointer shapes the executor needs: the genesis pointer
//! at orchestration start, "next" pointers on linear advance, and nested
//! pointers on branch or parallel entry. An unresolvable step id yields
//! `None`; callers treat that as a fatal configuration error for the
//! orchestration.

use crate::models::{ExecutionPointer, OrchestrationDefinition, StepId};

#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutionPointerFactory;

impl ExecutionPointerFactory {
    pub fn new() -> Self {
        Self
    }

    /// Pointer at the definition's first step, or `None` for an empty
    /// definition
    pub fn build_genesis_pointer(
        &self,
        definition: &OrchestrationDefinition,
    ) -> Option<ExecutionPointer> {
        let first_step = definition.first_step()?;
        Some(ExecutionPointer::at_step(first_step))
    }

    /// Successor pointer at `next_step_id`, linked to its predecessor
    pub fn build_next_pointer(
        &self,
        definition: &OrchestrationDefinition,
        previous: &ExecutionPointer,
        next_step_id: StepId,
    ) -> Option<ExecutionPointer> {
        definition.step(next_step_id)?;
        let mut pointer = ExecutionPointer::at_step(next_step_id);
        pointer.predecessor = Some(previous.id);
        Some(pointer)
    }

    /// Nested child pointer at `nested_step_id`, owned by `previous`
    pub fn build_nested_pointer(
        &self,
        definition: &OrchestrationDefinition,
        previous: &ExecutionPointer,
        nested_step_id: StepId,
    ) -> Option<ExecutionPointer> {
        definition.step(nested_step_id)?;
        let mut pointer = ExecutionPointer::at_step(nested_step_id);
        pointer.predecessor = Some(previous.id);
        Some(pointer)
    }

    /// Fresh pointer re-executing `previous`'s step after an elapsed retry
    /// sleep; the retry budget carries over so exhaustion stays monotonic
    pub fn build_retry_pointer(
        &self,
        definition: &OrchestrationDefinition,
        previous: &ExecutionPointer,
    ) -> Option<ExecutionPointer> {
        let mut pointer = self.build_next_pointer(definition, previous, previous.step_id)?;
        pointer.retry_count = previous.retry_count;
        pointer.event_data = previous.event_data.clone();
        Some(pointer)
    }
}
