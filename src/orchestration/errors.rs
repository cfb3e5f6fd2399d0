//! # Orchestration Error Types
//!
//! Structured runtime errors for the executor, controller, and instance
//! worker, using thiserror instead of `Box<dyn Error>` patterns. Builder
//! and registration failures live in [`crate::builder::DefinitionError`];
//! these are the errors of an orchestration that is already running.

use thiserror::Error;
use uuid::Uuid;

use crate::error::ConductorError;
use crate::state_machine::OrchestrationStatus;

#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("unknown orchestration instance {instance_id}")]
    InstanceNotFound { instance_id: Uuid },

    #[error("definition '{definition_id}' expects payload type {expected}, got {actual}")]
    DataTypeMismatch {
        definition_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("instance {instance_id} cannot transition from {from} to {to}")]
    InvalidStatusTransition {
        instance_id: Uuid,
        from: OrchestrationStatus,
        to: OrchestrationStatus,
    },

    #[error("step {step_id} is not part of definition '{definition_id}' version {version}")]
    UnresolvableStep {
        definition_id: String,
        version: i32,
        step_id: Uuid,
    },

    #[error("structural violation in instance {instance_id}: {detail}")]
    StructuralViolation { instance_id: Uuid, detail: String },

    #[error("payload serialization failed: {message}")]
    DataSerialization { message: String },

    #[error("persistence failure: {message}")]
    Persistence { message: String },

    #[error("lock provider failure: {message}")]
    Lock { message: String },

    #[error("configuration failure: {message}")]
    Configuration { message: String },
}

impl OrchestrationError {
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<ConductorError> for OrchestrationError {
    fn from(error: ConductorError) -> Self {
        match error {
            ConductorError::LockError(message) => Self::Lock { message },
            ConductorError::ConfigurationError(message) => Self::Configuration { message },
            other => Self::Persistence {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for OrchestrationError {
    fn from(error: serde_json::Error) -> Self {
        Self::DataSerialization {
            message: error.to_string(),
        }
    }
}

impl From<anyhow::Error> for OrchestrationError {
    fn from(error: anyhow::Error) -> Self {
        Self::DataSerialization {
            message: error.to_string(),
        }
    }
}

pub type OrchestrationResult<T> = std::result::Result<T, OrchestrationError>;
