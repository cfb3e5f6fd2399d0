//! # Persistence Boundary
//!
//! The repository trait is the single source of truth for instance and
//! pointer state; in-memory runtime objects are caches over it. Storage
//! engines implement [`OrchestrationRepository`]; the crate ships
//! [`InMemoryOrchestrationRepository`] for tests and embedded use.

pub mod memory;
pub mod repository;

pub use memory::InMemoryOrchestrationRepository;
pub use repository::OrchestrationRepository;
