//! # Definition Registry
//!
//! Thread-safe registry of built orchestration definitions, keyed by
//! `(definition id, version)`. Definitions are immutable once registered;
//! lookups either pin an exact version or resolve the latest one.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::error::{ConductorError, Result};
use crate::models::OrchestrationDefinition;

#[derive(Default)]
pub struct DefinitionRegistry {
    definitions: DashMap<(String, i32), Arc<OrchestrationDefinition>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built definition; re-registering the same `(id, version)`
    /// is a configuration error
    pub fn register(&self, definition: OrchestrationDefinition) -> Result<()> {
        let key = (definition.id.clone(), definition.version);
        if self.definitions.contains_key(&key) {
            return Err(ConductorError::ConfigurationError(format!(
                "definition '{}' version {} is already registered",
                key.0, key.1
            )));
        }

        info!(
            definition_id = %definition.id,
            version = definition.version,
            steps = definition.step_count(),
            "orchestration definition registered"
        );
        self.definitions.insert(key, Arc::new(definition));
        Ok(())
    }

    /// Resolve a definition by id, pinning `version` when given and the
    /// highest registered version otherwise
    pub fn resolve(&self, id: &str, version: Option<i32>) -> Result<Arc<OrchestrationDefinition>> {
        match version {
            Some(version) => self
                .definitions
                .get(&(id.to_string(), version))
                .map(|entry| entry.value().clone())
                .ok_or_else(|| {
                    ConductorError::ConfigurationError(format!(
                        "no definition registered for '{id}' version {version}"
                    ))
                }),
            None => self
                .definitions
                .iter()
                .filter(|entry| entry.key().0 == id)
                .max_by_key(|entry| entry.key().1)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| {
                    ConductorError::ConfigurationError(format!(
                        "no definition registered for '{id}'"
                    ))
                }),
        }
    }

    pub fn contains(&self, id: &str, version: i32) -> bool {
        self.definitions.contains_key(&(id.to_string(), version))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
