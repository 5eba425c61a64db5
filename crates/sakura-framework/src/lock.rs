//! Keyed mutual exclusion
//!
//! Updates and deletes of some remote objects must not interleave, even when
//! the host runs them on different resource instances. The lock table is keyed
//! by remote ID and lives as long as the provider.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock service injected into resources
#[async_trait]
pub trait KeyedLock: Send + Sync {
    /// Wait until no other holder of `key` remains, then hold it until the
    /// returned guard is dropped
    async fn lock(&self, key: &str) -> KeyGuard;
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyGuard {
    /// Guard that holds nothing
    pub fn unlocked(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            guard: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        if self.guard.take().is_some() {
            tracing::debug!("Released lock: {}", self.key);
        }
    }
}

/// Process-wide table of named mutexes
///
/// Entries are created on first use and never removed.
#[derive(Debug, Default)]
pub struct MutexKv {
    entries: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl MutexKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.entry(key.to_string()).or_default().clone()
    }

    /// Number of keys ever locked
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyedLock for MutexKv {
    async fn lock(&self, key: &str) -> KeyGuard {
        let mutex = self.entry(key);
        tracing::debug!("Locking: {}", key);
        let guard = mutex.lock_owned().await;
        tracing::debug!("Locked: {}", key);
        KeyGuard {
            key: key.to_string(),
            guard: Some(guard),
        }
    }
}

/// Lock that never blocks
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLock;

#[async_trait]
impl KeyedLock for NoopLock {
    async fn lock(&self, key: &str) -> KeyGuard {
        KeyGuard::unlocked(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(MutexKv::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("113000000001").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = MutexKv::new();
        let a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock("b"))
            .await
            .expect("lock on another key should not wait");
        assert_eq!(a.key(), "a");
        assert_eq!(b.key(), "b");
    }

    #[tokio::test]
    async fn test_released_on_drop_and_entries_kept() {
        let locks = MutexKv::new();
        {
            let _guard = locks.lock("a").await;
        }
        let again = tokio::time::timeout(Duration::from_secs(1), locks.lock("a")).await;
        assert!(again.is_ok());
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_waiter_wakes_when_guard_drops() {
        use tokio_test::{assert_pending, assert_ready, task};

        let locks = MutexKv::new();
        let held = tokio_test::block_on(locks.lock("a"));

        let mut waiter = task::spawn(locks.lock("a"));
        assert_pending!(waiter.poll());

        drop(held);
        assert!(waiter.is_woken());
        let guard = assert_ready!(waiter.poll());
        assert_eq!(guard.key(), "a");
    }

    #[tokio::test]
    async fn test_noop_lock_never_blocks() {
        let locks = NoopLock;
        let _a = locks.lock("a").await;
        let _b = locks.lock("a").await;
    }
}
