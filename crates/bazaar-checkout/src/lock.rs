//! # Lock Manager
//!
//! Short-lived, per-product advisory locks on top of a key-value store that
//! supports "set if absent, with expiry".
//!
//! ## Safety vs Throughput
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  safety     = the ledger's atomic conditional decrement                 │
//! │  throughput = this lock                                                 │
//! │                                                                         │
//! │  Cooperating callers take the lock before reserving, so they mostly    │
//! │  queue instead of racing and failing. A caller that skips the lock     │
//! │  cannot oversell either; it just loses more races.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Acquire Loop
//! ```text
//! attempt 1 ──SET NX PX──► taken? ──no──► token
//!     │                      │
//!     │                     yes ──► sleep(retry_interval) ──► attempt 2 ...
//!     ▼
//! after max_attempts ──► None  (caller reports LockContention)
//! ```
//!
//! The TTL bounds how long a crashed holder blocks everyone else; it must be
//! much longer than one conditional decrement.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::LockError;

/// Minimal key-value surface the lock manager needs.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Sets `key` to `value` with a TTL only if it is absent.
    ///
    /// Returns `true` when this call created the key.
    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Deletes `key`. Returns `true` if it existed.
    async fn del(&self, key: &str) -> Result<bool, LockError>;
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Process-local store with lazy expiry. Used in tests and when no Redis URL
/// is configured.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of `key`, ignoring expired entries.
    pub async fn holder(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|(_, deadline)| *deadline > Instant::now())
            .map(|(value, _)| value.clone())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LockError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if let Some((_, deadline)) = entries.get(key) {
            if *deadline > now {
                return Ok(false);
            }
        }

        entries.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<bool, LockError> {
        let mut entries = self.entries.lock().await;
        Ok(entries
            .remove(key)
            .is_some_and(|(_, deadline)| deadline > Instant::now()))
    }
}

// =============================================================================
// Lock Manager
// =============================================================================

/// Retry budget and expiry for product locks.
#[derive(Debug, Clone)]
pub struct LockSettings {
    pub key_prefix: String,
    pub max_attempts: u32,
    pub retry_interval: Duration,
    pub ttl: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        LockSettings {
            key_prefix: "checkout:lock".to_string(),
            max_attempts: 10,
            retry_interval: Duration::from_millis(50),
            ttl: Duration::from_millis(3000),
        }
    }
}

/// Proof of a held lock. The key is the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub key: String,
    pub holder_id: String,
}

#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn KeyValueStore>,
    settings: LockSettings,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl LockManager {
    pub fn new(store: Arc<dyn KeyValueStore>, settings: LockSettings) -> Self {
        LockManager { store, settings }
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    /// Store key guarding `resource`.
    pub fn key_for(&self, resource: &str) -> String {
        format!("{}:{}", self.settings.key_prefix, resource)
    }

    /// Tries to lock `resource` for `holder_id` with the configured TTL.
    pub async fn acquire(
        &self,
        resource: &str,
        holder_id: &str,
    ) -> Result<Option<LockToken>, LockError> {
        self.acquire_with_ttl(resource, holder_id, self.settings.ttl).await
    }

    /// Tries to lock `resource`, retrying up to `max_attempts` times.
    ///
    /// ## Returns
    /// * `Ok(Some(token))` - lock held until released or `ttl` elapses
    /// * `Ok(None)` - still held by someone else after every attempt
    /// * `Err(_)` - the store itself failed
    pub async fn acquire_with_ttl(
        &self,
        resource: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> Result<Option<LockToken>, LockError> {
        let key = self.key_for(resource);
        let attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=attempts {
            if self.store.set_nx_px(&key, holder_id, ttl).await? {
                debug!(%key, holder_id, attempt, "Lock acquired");
                return Ok(Some(LockToken {
                    key,
                    holder_id: holder_id.to_string(),
                }));
            }

            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_interval).await;
            }
        }

        debug!(%key, holder_id, attempts, "Lock still held, giving up");
        Ok(None)
    }

    /// Deletes the lock key.
    ///
    /// Releasing an expired or already released token is a no-op; store
    /// errors are logged and reported as `false`.
    pub async fn release(&self, token: &LockToken) -> bool {
        match self.store.del(&token.key).await {
            Ok(existed) => {
                debug!(key = %token.key, existed, "Lock released");
                existed
            }
            Err(e) => {
                warn!(key = %token.key, error = %e, "Lock release failed, key will expire");
                false
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(store: Arc<InMemoryKeyValueStore>) -> LockManager {
        LockManager::new(store, LockSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_and_release() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let locks = manager(store.clone());

        let token = locks.acquire("p-1", "holder-a").await.unwrap().unwrap();
        assert_eq!(token.key, "checkout:lock:p-1");
        assert_eq!(store.holder("checkout:lock:p-1").await.as_deref(), Some("holder-a"));

        assert!(locks.release(&token).await);
        // Second release is a no-op
        assert!(!locks.release(&token).await);
        assert!(store.holder("checkout:lock:p-1").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_contended_lock_gives_up_after_retries() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let locks = manager(store);

        let _held = locks.acquire("p-1", "holder-a").await.unwrap().unwrap();

        let started = Instant::now();
        assert!(locks.acquire("p-1", "holder-b").await.unwrap().is_none());
        // 10 attempts, 9 sleeps of 50ms
        assert!(started.elapsed() >= Duration::from_millis(450));
        assert!(started.elapsed() < Duration::from_millis(500));

        // Other products are unaffected
        assert!(locks.acquire("p-2", "holder-b").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_expires_after_ttl() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let locks = manager(store);

        let crashed = locks.acquire("p-1", "holder-a").await.unwrap().unwrap();
        let idle = locks.acquire("p-2", "holder-a").await.unwrap().unwrap();

        tokio::time::advance(Duration::from_millis(3001)).await;

        let token = locks.acquire("p-1", "holder-b").await.unwrap().unwrap();
        assert_eq!(token.holder_id, "holder-b");
        assert_ne!(token, crashed);

        // Releasing an expired token is a no-op
        assert!(!locks.release(&idle).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_gets_lock_once_released() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let locks = manager(store);

        let token = locks.acquire("p-1", "holder-a").await.unwrap().unwrap();

        let releaser = locks.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            releaser.release(&token).await
        });

        let waited = locks.acquire("p-1", "holder-b").await.unwrap();
        assert!(handle.await.unwrap());
        assert_eq!(waited.unwrap().holder_id, "holder-b");
    }
}
