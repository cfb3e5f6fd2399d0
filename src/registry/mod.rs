//! Definition registration and lookup.

pub mod definition_registry;

pub use definition_registry::DefinitionRegistry;
