//! Persisted orchestration instance row. The repository copy is the source
//! of truth; in-memory instances are caches over it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::state_machine::OrchestrationStatus;

/// Distributed-lock and singleton key for an orchestration identity
pub fn derive_lock_key(definition_id: &str, version: i32, orchestration_key: &str) -> String {
    format!("{definition_id}::{version}::{orchestration_key}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationInstanceRecord {
    pub id: Uuid,
    pub definition_id: String,
    pub version: i32,
    pub orchestration_key: String,
    pub status: OrchestrationStatus,
    /// Durable form of the typed payload
    pub data: Value,
    pub create_time: DateTime<Utc>,
    pub complete_time: Option<DateTime<Utc>>,
}

impl OrchestrationInstanceRecord {
    pub fn new(
        definition_id: impl Into<String>,
        version: i32,
        orchestration_key: impl Into<String>,
        data: Value,
        create_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            definition_id: definition_id.into(),
            version,
            orchestration_key: orchestration_key.into(),
            status: OrchestrationStatus::Running,
            data,
            create_time,
            complete_time: None,
        }
    }

    pub fn lock_key(&self) -> String {
        derive_lock_key(&self.definition_id, self.version, &self.orchestration_key)
    }
}
