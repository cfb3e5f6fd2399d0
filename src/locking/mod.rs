//! # Distributed Locking Boundary
//!
//! Cross-host mutual exclusion keyed by orchestration identity. The executor
//! acquires the lock before advancing any pointer and releases it on every
//! exit path; acquisition failure is benign and simply defers the pass to
//! the next idle-timer tick. The crate ships [`InProcessLockProvider`] for
//! single-process deployments and tests; multi-host deployments plug in a
//! provider backed by their coordination service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::Result;
use crate::utils::Clock;
use std::sync::Arc;

/// Outcome of a lock acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockAcquisition {
    pub succeeded: bool,
}

impl LockAcquisition {
    pub fn acquired() -> Self {
        Self { succeeded: true }
    }

    pub fn contended() -> Self {
        Self { succeeded: false }
    }
}

/// Pluggable cross-process lock service
#[async_trait]
pub trait DistributedLockProvider: Send + Sync {
    /// Try to take the lock for `owner` until `expires_at`. Re-acquisition
    /// by the current owner extends the expiration.
    async fn acquire_lock(
        &self,
        lock_key: &str,
        owner: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<LockAcquisition>;

    /// Release the lock if `owner` still holds it
    async fn release_lock(&self, lock_key: &str, owner: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct LockEntry {
    owner: String,
    expires_at: DateTime<Utc>,
}

/// Expiring in-process lock table
pub struct InProcessLockProvider {
    locks: DashMap<String, LockEntry>,
    clock: Arc<dyn Clock>,
}

impl InProcessLockProvider {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            locks: DashMap::new(),
            clock,
        }
    }

    pub fn held_lock_count(&self) -> usize {
        let now = self.clock.now_utc();
        self.locks
            .iter()
            .filter(|entry| entry.expires_at > now)
            .count()
    }
}

impl Default for InProcessLockProvider {
    fn default() -> Self {
        Self::new(Arc::new(crate::utils::SystemClock))
    }
}

#[async_trait]
impl DistributedLockProvider for InProcessLockProvider {
    async fn acquire_lock(
        &self,
        lock_key: &str,
        owner: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<LockAcquisition> {
        let now = self.clock.now_utc();
        let mut entry = self
            .locks
            .entry(lock_key.to_string())
            .or_insert_with(|| LockEntry {
                owner: owner.to_string(),
                expires_at,
            });

        if entry.owner == owner || entry.expires_at <= now {
            entry.owner = owner.to_string();
            entry.expires_at = expires_at;
            Ok(LockAcquisition::acquired())
        } else {
            Ok(LockAcquisition::contended())
        }
    }

    async fn release_lock(&self, lock_key: &str, owner: &str) -> Result<()> {
        self.locks
            .remove_if(lock_key, |_, entry| entry.owner == owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;
    use std::time::Duration;

    fn provider_with_clock() -> (InProcessLockProvider, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (InProcessLockProvider::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_between_owners() {
        let (provider, clock) = provider_with_clock();
        let expires = clock.now_utc() + chrono::Duration::seconds(30);

        assert!(provider
            .acquire_lock("billing::1::invoice-7", "host-a", expires)
            .await
            .unwrap()
            .succeeded);
        assert!(!provider
            .acquire_lock("billing::1::invoice-7", "host-b", expires)
            .await
            .unwrap()
            .succeeded);
    }

    #[tokio::test]
    async fn test_owner_reacquisition_extends_expiry() {
        let (provider, clock) = provider_with_clock();
        let expires = clock.now_utc() + chrono::Duration::seconds(5);

        assert!(provider
            .acquire_lock("k", "host-a", expires)
            .await
            .unwrap()
            .succeeded);
        assert!(provider
            .acquire_lock("k", "host-a", expires + chrono::Duration::seconds(30))
            .await
            .unwrap()
            .succeeded);
    }

    #[tokio::test]
    async fn test_expired_lock_is_stealable() {
        let (provider, clock) = provider_with_clock();
        let expires = clock.now_utc() + chrono::Duration::seconds(5);
        provider.acquire_lock("k", "host-a", expires).await.unwrap();

        clock.advance(Duration::from_secs(6));
        let retaken = provider
            .acquire_lock("k", "host-b", clock.now_utc() + chrono::Duration::seconds(30))
            .await
            .unwrap();
        assert!(retaken.succeeded);
    }

    #[tokio::test]
    async fn test_release_only_by_owner() {
        let (provider, clock) = provider_with_clock();
        let expires = clock.now_utc() + chrono::Duration::seconds(30);
        provider.acquire_lock("k", "host-a", expires).await.unwrap();

        provider.release_lock("k", "host-b").await.unwrap();
        assert!(!provider
            .acquire_lock("k", "host-b", expires)
            .await
            .unwrap()
            .succeeded);

        provider.release_lock("k", "host-a").await.unwrap();
        assert!(provider
            .acquire_lock("k", "host-b", expires)
            .await
            .unwrap()
            .succeeded);
    }
}
