use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

use crate::constants::system;
use crate::models::{PointerId, StepId};

/// Lifecycle transition notifications observed by embedding subsystems
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifeCycleEvent {
    OrchestrationStarted {
        instance_id: Uuid,
        definition_id: String,
        version: i32,
        orchestration_key: String,
        at: DateTime<Utc>,
    },
    StepStarted {
        instance_id: Uuid,
        step_id: StepId,
        pointer_id: PointerId,
        step_name: String,
        at: DateTime<Utc>,
    },
    StepCompleted {
        instance_id: Uuid,
        step_id: StepId,
        pointer_id: PointerId,
        step_name: String,
        at: DateTime<Utc>,
    },
    StepSuspended {
        instance_id: Uuid,
        step_id: StepId,
        pointer_id: PointerId,
        step_name: String,
        at: DateTime<Utc>,
    },
    OrchestrationSuspended {
        instance_id: Uuid,
        at: DateTime<Utc>,
    },
    OrchestrationResumed {
        instance_id: Uuid,
        at: DateTime<Utc>,
    },
    OrchestrationCompleted {
        instance_id: Uuid,
        at: DateTime<Utc>,
    },
    OrchestrationTerminated {
        instance_id: Uuid,
        at: DateTime<Utc>,
    },
    OrchestrationError {
        instance_id: Uuid,
        step_id: Option<StepId>,
        pointer_id: Option<PointerId>,
        detail: String,
        at: DateTime<Utc>,
    },
}

impl LifeCycleEvent {
    /// Event name constant for logging and subscriber filtering
    pub fn name(&self) -> &'static str {
        use crate::constants::events;
        match self {
            Self::OrchestrationStarted { .. } => events::ORCHESTRATION_STARTED,
            Self::StepStarted { .. } => events::STEP_STARTED,
            Self::StepCompleted { .. } => events::STEP_COMPLETED,
            Self::StepSuspended { .. } => events::STEP_SUSPENDED,
            Self::OrchestrationSuspended { .. } => events::ORCHESTRATION_SUSPENDED,
            Self::OrchestrationResumed { .. } => events::ORCHESTRATION_RESUMED,
            Self::OrchestrationCompleted { .. } => events::ORCHESTRATION_COMPLETED,
            Self::OrchestrationTerminated { .. } => events::ORCHESTRATION_TERMINATED,
            Self::OrchestrationError { .. } => events::ORCHESTRATION_ERROR,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        match self {
            Self::OrchestrationStarted { instance_id, .. }
            | Self::StepStarted { instance_id, .. }
            | Self::StepCompleted { instance_id, .. }
            | Self::StepSuspended { instance_id, .. }
            | Self::OrchestrationSuspended { instance_id, .. }
            | Self::OrchestrationResumed { instance_id, .. }
            | Self::OrchestrationCompleted { instance_id, .. }
            | Self::OrchestrationTerminated { instance_id, .. }
            | Self::OrchestrationError { instance_id, .. } => *instance_id,
        }
    }

    /// JSON form handed to callback subscribers
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Callback subscriber; failures are logged and isolated, never propagated
pub type LifeCycleSubscriber =
    Arc<dyn Fn(&LifeCycleEvent) -> Result<(), anyhow::Error> + Send + Sync>;

struct NamedSubscriber {
    name: String,
    callback: LifeCycleSubscriber,
}

/// Fan-out point for lifecycle events
#[derive(Clone)]
pub struct LifeCycleEventPublisher {
    sender: broadcast::Sender<LifeCycleEvent>,
    subscribers: Arc<RwLock<Vec<NamedSubscriber>>>,
}

impl LifeCycleEventPublisher {
    /// Create a publisher with the given broadcast capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a named callback invoked on every lifecycle event
    pub async fn register_subscriber(&self, name: impl Into<String>, callback: LifeCycleSubscriber) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.push(NamedSubscriber {
            name: name.into(),
            callback,
        });
    }

    /// Subscribe to the raw broadcast stream
    pub fn subscribe(&self) -> broadcast::Receiver<LifeCycleEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an event, awaiting every callback subscriber inline.
    ///
    /// Subscriber failures are caught and logged so one subscriber cannot
    /// affect the executor or the remaining subscribers.
    pub async fn publish(&self, event: LifeCycleEvent) {
        // Broadcast send errors only mean there are no stream listeners
        let _ = self.sender.send(event.clone());

        let subscribers = self.subscribers.read().await;
        for subscriber in subscribers.iter() {
            if let Err(e) = (subscriber.callback)(&event) {
                error!(
                    subscriber = %subscriber.name,
                    event = event.name(),
                    instance_id = %event.instance_id(),
                    error = %e,
                    "lifecycle subscriber failed; continuing"
                );
            }
        }

        debug!(
            event = event.name(),
            instance_id = %event.instance_id(),
            "lifecycle event published"
        );
    }

    /// Publish without waiting for callback subscribers, for definitions
    /// that do not await lifecycle handling
    pub fn publish_detached(&self, event: LifeCycleEvent) {
        let publisher = self.clone();
        tokio::spawn(async move {
            publisher.publish(event).await;
        });
    }
}

impl Default for LifeCycleEventPublisher {
    fn default() -> Self {
        Self::new(system::DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
