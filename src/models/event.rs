//! External event row consumed by event-wait correlation. Events are
//! appended by the bus layer and claimed at most once by a waiting pointer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationEventRecord {
    pub id: Uuid,
    pub name: String,
    pub key: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
    /// Set atomically when a waiting pointer claims the event
    pub processed: bool,
}

impl OrchestrationEventRecord {
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        payload: Value,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            key: key.into(),
            payload,
            received_at,
            processed: false,
        }
    }

    /// Whether this event correlates with the given wait
    pub fn matches(&self, name: &str, key: &str) -> bool {
        !self.processed && self.name == name && self.key == key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_correlation_matching() {
        let event = OrchestrationEventRecord::new(
            "payment.confirmed",
            "order-42",
            json!({"amount": 100}),
            Utc::now(),
        );

        assert!(event.matches("payment.confirmed", "order-42"));
        assert!(!event.matches("payment.confirmed", "order-43"));
        assert!(!event.matches("payment.declined", "order-42"));

        let mut claimed = event;
        claimed.processed = true;
        assert!(!claimed.matches("payment.confirmed", "order-42"));
    }
}
