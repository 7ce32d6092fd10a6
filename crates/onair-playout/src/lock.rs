//! Exclusive in-process locks for playout jobs.
//!
//! One lock per playlist id serializes every job touching that
//! playlist's cache; a separate lock per studio id serializes
//! studio-wide jobs such as baseline timeline updates. Different
//! playlists proceed fully in parallel.
//!
//! Locks are never re-entrant. A job needing both scopes acquires the
//! studio lock first and the playlist lock inside it, never the
//! reverse.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use onair_core::{PlaylistId, StudioId};

use crate::error::{Error, Result};

/// The scope a lock protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// All state of one playlist.
    Playlist(PlaylistId),
    /// Studio-wide state independent of any playlist.
    Studio(StudioId),
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Playlist(id) => write!(f, "playlist:{id}"),
            Self::Studio(id) => write!(f, "studio:{id}"),
        }
    }
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::internal("lock registry poisoned")
}

/// Registry of per-key exclusive locks.
///
/// Acquisition suspends the caller until the key is free; there is no
/// timeout, matching the job model where a transaction either runs to
/// completion or fails before mutating anything.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl LockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the exclusive lock for a key, suspending until it is
    /// free.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry mutex is poisoned.
    pub async fn acquire(&self, key: LockKey) -> Result<LockGuard> {
        let entry = {
            let mut locks = self.locks.lock().map_err(poison_err)?;
            Arc::clone(locks.entry(key).or_default())
        };

        let wait_started = Instant::now();
        let guard = entry.lock_owned().await;
        let waited = wait_started.elapsed();

        tracing::debug!(key = %key, waited_ms = waited.as_millis() as u64, "lock acquired");

        Ok(LockGuard {
            key,
            waited,
            acquired_at: Instant::now(),
            _guard: guard,
        })
    }
}

/// RAII guard for an acquired lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    key: LockKey,
    waited: std::time::Duration,
    acquired_at: Instant,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    /// The key this guard holds.
    #[must_use]
    pub const fn key(&self) -> LockKey {
        self.key
    }

    /// How long the caller waited before the lock was granted.
    #[must_use]
    pub const fn waited(&self) -> std::time::Duration {
        self.waited
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        tracing::debug!(
            key = %self.key,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "lock released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn lock_is_exclusive_per_key() {
        let registry = Arc::new(LockRegistry::new());
        let key = LockKey::Playlist(PlaylistId::generate());
        let in_critical = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let in_critical = Arc::clone(&in_critical);
            handles.push(tokio::spawn(async move {
                let _guard = registry.acquire(key).await.expect("acquire");
                let now_inside = in_critical.fetch_add(1, Ordering::SeqCst) + 1;
                assert_eq!(now_inside, 1, "two holders inside the critical section");
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_critical.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.expect("task");
        }
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let registry = LockRegistry::new();
        let a = registry
            .acquire(LockKey::Playlist(PlaylistId::generate()))
            .await
            .expect("acquire a");
        // Acquiring a different key while holding the first must not block.
        let b = registry
            .acquire(LockKey::Studio(StudioId::generate()))
            .await
            .expect("acquire b");
        assert_ne!(a.key(), b.key());
    }

    #[tokio::test]
    async fn dropping_the_guard_releases_the_lock() {
        let registry = LockRegistry::new();
        let key = LockKey::Playlist(PlaylistId::generate());

        let guard = registry.acquire(key).await.expect("first acquire");
        drop(guard);

        // Must not deadlock.
        let again = registry.acquire(key).await.expect("second acquire");
        assert_eq!(again.key(), key);
    }
}
