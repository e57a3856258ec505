//! Keyed mutual exclusion with acquisition timeout.
//!
//! Every mutation serializes on a key derived from its target location(s).
//! Entries are reference-counted and dropped as soon as nobody holds or
//! waits on them, so the map stays bounded by the number of in-flight
//! operations. The timeout is the only liveness guarantee against a rogue
//! holder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use storax_core::{OpError, OpResult};

struct Entry {
    mutex: Arc<Mutex<()>>,
    /// Holders plus waiters; the entry lives while this is non-zero.
    refs: usize,
}

type EntryMap = Arc<StdMutex<HashMap<String, Entry>>>;

/// Map of per-key async mutexes.
pub struct LockManager {
    entries: EntryMap,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: Arc::new(StdMutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Acquire the lock for `key`, or fail with [`OpError::LockTimeout`].
    pub async fn acquire(&self, key: &str) -> OpResult<LockGuard> {
        let mutex = {
            let mut map = self.entries.lock().expect("lock map poisoned");
            let entry = map.entry(key.to_string()).or_insert_with(|| Entry {
                mutex: Arc::new(Mutex::new(())),
                refs: 0,
            });
            entry.refs += 1;
            Arc::clone(&entry.mutex)
        };

        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(LockGuard {
                key: key.to_string(),
                entries: Arc::clone(&self.entries),
                _guard: guard,
            }),
            Err(_) => {
                release_ref(&self.entries, key);
                debug!(key, "lock acquisition timed out");
                Err(OpError::LockTimeout {
                    key: key.to_string(),
                })
            }
        }
    }

    /// Number of live entries; used by tests to verify cleanup.
    pub fn entry_count(&self) -> usize {
        self.entries.lock().expect("lock map poisoned").len()
    }
}

fn release_ref(entries: &EntryMap, key: &str) {
    let mut map = entries.lock().expect("lock map poisoned");
    if let Some(entry) = map.get_mut(key) {
        entry.refs -= 1;
        if entry.refs == 0 {
            map.remove(key);
        }
    }
}

/// Held lock; released (and the entry possibly dropped) on drop.
pub struct LockGuard {
    key: String,
    entries: EntryMap,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        release_ref(&self.entries, &self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exclusive_acquire_and_release() {
        let locks = LockManager::new(Duration::from_millis(50));

        let guard = locks.acquire("k").await.unwrap();
        assert_eq!(locks.entry_count(), 1);

        // A second acquire on the same key times out while the first holds.
        assert!(matches!(
            locks.acquire("k").await,
            Err(OpError::LockTimeout { .. })
        ));

        drop(guard);
        assert_eq!(locks.entry_count(), 0);

        // Free again after release.
        let _guard = locks.acquire("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_are_independent() {
        let locks = LockManager::new(Duration::from_millis(50));
        let _a = locks.acquire("a").await.unwrap();
        let _b = locks.acquire("b").await.unwrap();
        assert_eq!(locks.entry_count(), 2);
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let locks = Arc::new(LockManager::new(Duration::from_secs(5)));

        let guard = locks.acquire("k").await.unwrap();
        let locks2 = Arc::clone(&locks);
        let waiter = tokio::spawn(async move { locks2.acquire("k").await.is_ok() });

        tokio::task::yield_now().await;
        drop(guard);
        assert!(waiter.await.unwrap());
        assert_eq!(locks.entry_count(), 0);
    }
}
