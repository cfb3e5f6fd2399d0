//! # Engine Configuration
//!
//! Explicit, validated configuration for the orchestration engine, loaded
//! from an optional TOML file with environment-variable overrides. No
//! hidden fallbacks: every value has a documented default and tests cover
//! the override path.

pub mod loader;

use serde::{Deserialize, Serialize};

use crate::constants::system;

pub use loader::ConfigManager;

/// Root configuration for the orchestration engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConductorConfig {
    /// Executor and worker behavior
    #[serde(default)]
    pub engine: EngineConfig,

    /// Lifecycle event fan-out
    #[serde(default)]
    pub events: EventsConfig,
}

impl ConductorConfig {
    /// Configuration tuned for tests: no background polling, so passes run
    /// only when a test drives them
    pub fn for_testing() -> Self {
        Self {
            engine: EngineConfig {
                lock_owner: Some("test-owner".to_string()),
                worker_polling_enabled: false,
            },
            events: EventsConfig::default(),
        }
    }
}

/// Executor and worker behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Stable identity this process presents to the distributed lock
    /// provider; generated per-controller when unset
    #[serde(default)]
    pub lock_owner: Option<String>,

    /// Spawn an idle worker per instance. Hosts that drive execution from
    /// bus messages disable this and call `run_executor_pass` instead.
    #[serde(default = "default_worker_polling")]
    pub worker_polling_enabled: bool,
}

fn default_worker_polling() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_owner: None,
            worker_polling_enabled: true,
        }
    }
}

/// Lifecycle event fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Capacity of the lifecycle broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    system::DEFAULT_EVENT_CHANNEL_CAPACITY
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: system::DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConductorConfig::default();
        assert!(config.engine.worker_polling_enabled);
        assert!(config.engine.lock_owner.is_none());
        assert_eq!(
            config.events.channel_capacity,
            system::DEFAULT_EVENT_CHANNEL_CAPACITY
        );
    }

    #[test]
    fn test_testing_profile_disables_polling() {
        let config = ConductorConfig::for_testing();
        assert!(!config.engine.worker_polling_enabled);
        assert_eq!(config.engine.lock_owner.as_deref(), Some("test-owner"));
    }
}
