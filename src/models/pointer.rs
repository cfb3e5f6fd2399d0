//! # Execution Pointers
//!
//! Persisted runtime cursors, one per thread of control within a running
//! orchestration. Pointers form an append-only forest: they are created by
//! the pointer factory, mutated in place by the executor while live, and
//! marked completed rather than deleted so the history can be replayed and
//! audited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::step::StepId;
use crate::state_machine::PointerStatus;

/// Stable identity of an execution pointer
pub type PointerId = Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPointer {
    pub id: PointerId,
    pub step_id: StepId,
    /// A pointer is active iff it still requires executor attention
    pub active: bool,
    pub status: PointerStatus,
    pub retry_count: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Earliest instant a retrying pointer may be promoted
    pub sleep_until: Option<DateTime<Utc>>,
    pub event_name: Option<String>,
    pub event_key: Option<String>,
    /// Deadline after which an unmatched event wait is abandoned
    pub event_ttl: Option<DateTime<Utc>>,
    /// Payload of the matched event, set at promotion time
    pub event_data: Option<Value>,
    /// Weak back-reference; the predecessor is not owned
    pub predecessor: Option<PointerId>,
    /// Owned children created on branch or parallel entry
    pub nested_pointers: Vec<PointerId>,
}

impl ExecutionPointer {
    /// Fresh pending pointer at `step_id`
    pub fn at_step(step_id: StepId) -> Self {
        Self {
            id: Uuid::new_v4(),
            step_id,
            active: true,
            status: PointerStatus::Pending,
            retry_count: 0,
            start_time: None,
            end_time: None,
            sleep_until: None,
            event_name: None,
            event_key: None,
            event_ttl: None,
            event_data: None,
            predecessor: None,
            nested_pointers: Vec::new(),
        }
    }

    /// Whether the pointer is asleep at `now`
    pub fn is_sleeping(&self, now: DateTime<Utc>) -> bool {
        self.sleep_until.is_some_and(|until| until > now)
    }

    /// Runnable right now: active, attention-requiring, not parked on an
    /// event, and not sleeping
    pub fn is_runnable(&self, now: DateTime<Utc>) -> bool {
        self.active
            && matches!(
                self.status,
                PointerStatus::Pending | PointerStatus::InProcess
            )
            && !self.is_sleeping(now)
    }

    /// Transition into completed history
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = PointerStatus::Completed;
        self.end_time = Some(now);
        self.active = false;
        self.sleep_until = None;
    }

    /// Park until a correlated event arrives
    pub fn mark_waiting_for_event(
        &mut self,
        name: String,
        key: String,
        ttl: Option<DateTime<Utc>>,
    ) {
        self.status = PointerStatus::WaitingForEvent;
        self.active = false;
        self.event_name = Some(name);
        self.event_key = Some(key);
        self.event_ttl = ttl;
    }

    /// Put the pointer to sleep for a retry
    pub fn mark_retrying(&mut self, wake_at: DateTime<Utc>) {
        self.status = PointerStatus::Retrying;
        self.retry_count += 1;
        self.sleep_until = Some(wake_at);
    }

    /// Terminal until an operator resumes the orchestration
    pub fn mark_suspended(&mut self) {
        self.status = PointerStatus::Suspended;
        self.active = false;
    }

    /// Re-activate a suspended pointer after operator intervention; the
    /// retry budget starts over
    pub fn reactivate(&mut self) {
        self.status = PointerStatus::Pending;
        self.active = true;
        self.sleep_until = None;
        self.retry_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fresh_pointer_is_runnable() {
        let pointer = ExecutionPointer::at_step(Uuid::new_v4());
        assert!(pointer.active);
        assert_eq!(pointer.status, PointerStatus::Pending);
        assert!(pointer.is_runnable(Utc::now()));
    }

    #[test]
    fn test_sleeping_pointer_is_not_runnable() {
        let now = Utc::now();
        let mut pointer = ExecutionPointer::at_step(Uuid::new_v4());
        pointer.sleep_until = Some(now + Duration::seconds(10));

        assert!(pointer.is_sleeping(now));
        assert!(!pointer.is_runnable(now));
        assert!(pointer.is_runnable(now + Duration::seconds(11)));
    }

    #[test]
    fn test_completion_clears_attention() {
        let now = Utc::now();
        let mut pointer = ExecutionPointer::at_step(Uuid::new_v4());
        pointer.mark_completed(now);

        assert!(!pointer.active);
        assert_eq!(pointer.status, PointerStatus::Completed);
        assert_eq!(pointer.end_time, Some(now));
    }

    #[test]
    fn test_retry_increments_and_sleeps() {
        let now = Utc::now();
        let mut pointer = ExecutionPointer::at_step(Uuid::new_v4());
        pointer.mark_retrying(now + Duration::seconds(5));
        pointer.mark_retrying(now + Duration::seconds(15));

        assert_eq!(pointer.retry_count, 2);
        assert_eq!(pointer.status, PointerStatus::Retrying);
        assert!(pointer.is_sleeping(now));
    }

    #[test]
    fn test_reactivate_resets_retry_budget() {
        let mut pointer = ExecutionPointer::at_step(Uuid::new_v4());
        pointer.mark_retrying(Utc::now());
        pointer.mark_suspended();
        pointer.reactivate();

        assert!(pointer.active);
        assert_eq!(pointer.status, PointerStatus::Pending);
        assert_eq!(pointer.retry_count, 0);
        assert!(pointer.sleep_until.is_none());
    }
}
