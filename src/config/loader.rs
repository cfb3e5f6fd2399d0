//! Environment-aware configuration loading: an optional `conductor.toml`
//! (or an explicit path) layered under `CONDUCTOR_*` environment overrides.

use std::path::Path;

use config::{Config, Environment, File};
use tracing::info;

use crate::error::{ConductorError, Result};

use super::ConductorConfig;

/// Loads and holds the engine configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: ConductorConfig,
}

impl ConfigManager {
    /// Load from `conductor.toml` in the working directory (optional) plus
    /// `CONDUCTOR_*` environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("conductor.toml")
    }

    /// Load from an explicit file path (optional) plus environment overrides.
    ///
    /// Environment variables use `__` as the section separator, e.g.
    /// `CONDUCTOR_ENGINE__WORKER_POLLING_ENABLED=false`.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loaded = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("CONDUCTOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                ConductorError::ConfigurationError(format!("failed to read configuration: {e}"))
            })?;

        let config: ConductorConfig = loaded.try_deserialize().map_err(|e| {
            ConductorError::ConfigurationError(format!("invalid configuration: {e}"))
        })?;

        info!(
            source = %path.display(),
            worker_polling_enabled = config.engine.worker_polling_enabled,
            "engine configuration loaded"
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &ConductorConfig {
        &self.config
    }

    pub fn into_config(self) -> ConductorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let manager = ConfigManager::load_from_path("does-not-exist.toml").unwrap();
        assert!(manager.config().engine.worker_polling_enabled);
    }

    #[test]
    fn test_file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[engine]\nlock_owner = \"host-7\"\nworker_polling_enabled = false\n\n[events]\nchannel_capacity = 64\n"
        )
        .unwrap();

        let manager = ConfigManager::load_from_path(file.path()).unwrap();
        let config = manager.config();
        assert_eq!(config.engine.lock_owner.as_deref(), Some("host-7"));
        assert!(!config.engine.worker_polling_enabled);
        assert_eq!(config.events.channel_capacity, 64);
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[engine]\nworker_polling_enabled = \"maybe\"").unwrap();

        assert!(ConfigManager::load_from_path(file.path()).is_err());
    }
}
