use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ConductorError {
    DefinitionError(String),
    PersistenceError(String),
    LockError(String),
    ExecutionError(String),
    EventError(String),
    ValidationError(String),
    ConfigurationError(String),
    StateTransitionError(String),
}

impl fmt::Display for ConductorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConductorError::DefinitionError(msg) => write!(f, "Definition error: {msg}"),
            ConductorError::PersistenceError(msg) => write!(f, "Persistence error: {msg}"),
            ConductorError::LockError(msg) => write!(f, "Lock error: {msg}"),
            ConductorError::ExecutionError(msg) => write!(f, "Execution error: {msg}"),
            ConductorError::EventError(msg) => write!(f, "Event error: {msg}"),
            ConductorError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            ConductorError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            ConductorError::StateTransitionError(msg) => {
                write!(f, "State transition error: {msg}")
            }
        }
    }
}

impl std::error::Error for ConductorError {}

pub type Result<T> = std::result::Result<T, ConductorError>;
