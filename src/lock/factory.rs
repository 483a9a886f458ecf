//! Named locks
//!
//! A `LockFactory` hands out lock handles by key; every handle created for
//! the same key contends for the same underlying lock. The in-memory factory
//! serializes holders within one process. Cluster-wide stores plug in behind
//! the same traits.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A handle on one named lock
#[async_trait]
pub trait Lock: Send {
    /// The lock name
    fn key(&self) -> &str;

    /// Acquire the lock. In blocking mode waits until it is free (or the
    /// store gives up), otherwise returns immediately. `Ok(false)` means the
    /// store refused or timed out.
    async fn acquire(&mut self, blocking: bool) -> Result<bool>;

    /// Release a held lock
    async fn release(&mut self) -> Result<()>;
}

/// Creates lock handles by key
pub trait LockFactory: Send + Sync {
    /// Create a handle for `key`. Creating a handle never acquires it.
    fn create_lock(&self, key: &str) -> Box<dyn Lock>;
}

/// Process-wide named locks
#[derive(Debug, Clone, Default)]
pub struct MemoryLockFactory {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
    acquire_timeout: Option<Duration>,
}

impl MemoryLockFactory {
    /// Create a factory whose blocking acquisitions wait indefinitely
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound blocking acquisitions; a timed-out acquire returns `Ok(false)`
    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Number of distinct keys seen
    pub fn key_count(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    fn mutex_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Forget idle keys nobody else holds a handle to
        locks.retain(|k, m| k == key || Arc::strong_count(m) > 1);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

impl LockFactory for MemoryLockFactory {
    fn create_lock(&self, key: &str) -> Box<dyn Lock> {
        Box::new(MemoryLock {
            key: key.to_string(),
            mutex: self.mutex_for(key),
            guard: None,
            acquire_timeout: self.acquire_timeout,
        })
    }
}

/// Handle produced by [`MemoryLockFactory`]. Dropping a held handle releases it.
pub struct MemoryLock {
    key: String,
    mutex: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    acquire_timeout: Option<Duration>,
}

impl MemoryLock {
    /// Whether this handle currently holds the lock
    pub fn is_acquired(&self) -> bool {
        self.guard.is_some()
    }
}

#[async_trait]
impl Lock for MemoryLock {
    fn key(&self) -> &str {
        &self.key
    }

    async fn acquire(&mut self, blocking: bool) -> Result<bool> {
        if self.guard.is_some() {
            return Ok(true);
        }

        let mutex = Arc::clone(&self.mutex);
        self.guard = if !blocking {
            mutex.try_lock_owned().ok()
        } else if let Some(timeout) = self.acquire_timeout {
            tokio::time::timeout(timeout, mutex.lock_owned()).await.ok()
        } else {
            Some(mutex.lock_owned().await)
        };

        Ok(self.guard.is_some())
    }

    async fn release(&mut self) -> Result<()> {
        match self.guard.take() {
            Some(guard) => {
                drop(guard);
                Ok(())
            }
            None => Err(Error::lock(format!("lock '{}' is not held", self.key))),
        }
    }
}

impl std::fmt::Debug for MemoryLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLock")
            .field("key", &self.key)
            .field("acquired", &self.is_acquired())
            .finish_non_exhaustive()
    }
}
