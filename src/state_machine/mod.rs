//! # Orchestration State Machine
//!
//! Status definitions for orchestration instances and execution pointers,
//! with the transition legality checks the executor and controller enforce.

pub mod states;

pub use states::{OrchestrationStatus, PointerStatus};
