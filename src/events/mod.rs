//! # Lifecycle Event System
//!
//! Every orchestration and step transition fans out through the
//! [`LifeCycleEventPublisher`]: a broadcast channel for streaming consumers
//! plus a registered-callback list with per-subscriber error isolation, so a
//! failing subscriber can never affect the executor or its peers.

pub mod publisher;

pub use publisher::{LifeCycleEvent, LifeCycleEventPublisher, LifeCycleSubscriber};
