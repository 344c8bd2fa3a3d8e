//! Repository Snapshot Cache
//!
//! Bounded LRU of composed snapshots keyed by (owner, repo, credential).
//! Each slot is a `OnceCell`, so concurrent callers sharing a key wait on one
//! in-flight fetch instead of racing their own. The map lock is held only
//! while looking up or inserting a slot, never across an await.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{SharedRepositoryProvider, fetch_snapshot};
use crate::types::{Credential, DiagramError, Result, SharedSnapshot, SnapshotKey};

type Slot = Arc<OnceCell<SharedSnapshot>>;

/// Cache statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Fetches that failed and were dropped from the cache
    pub failures: u64,
}

impl CacheStats {
    /// Cache hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub type SharedSnapshotCache = Arc<RepositorySnapshotCache>;

pub struct RepositorySnapshotCache {
    provider: SharedRepositoryProvider,
    slots: Mutex<LruCache<SnapshotKey, Slot>>,
    stats: Mutex<CacheStats>,
}

impl RepositorySnapshotCache {
    /// Create a cache holding at most `capacity` snapshots (minimum 1)
    pub fn new(provider: SharedRepositoryProvider, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            slots: Mutex::new(LruCache::new(capacity)),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Return the snapshot for a key, fetching it on first use
    pub async fn get(
        &self,
        owner: &str,
        repo: &str,
        credential: Option<&Credential>,
    ) -> Result<SharedSnapshot> {
        let key = SnapshotKey::new(owner, repo, credential);
        let slot = self.slot(&key)?;

        if let Some(snapshot) = slot.get() {
            self.record(|s| s.hits += 1);
            debug!("Snapshot cache hit: {}", key);
            return Ok(Arc::clone(snapshot));
        }

        // false when another caller's in-flight fetch filled the slot
        let mut fetched = false;
        let result = slot
            .get_or_try_init(|| {
                fetched = true;
                async {
                    self.record(|s| s.misses += 1);
                    info!("Fetching repository snapshot: {}", key);
                    fetch_snapshot(self.provider.as_ref(), owner, repo, credential)
                        .await
                        .map(Arc::new)
                }
            })
            .await;

        match result {
            Ok(snapshot) => {
                if !fetched {
                    self.record(|s| s.hits += 1);
                    debug!("Snapshot cache hit after waiting: {}", key);
                }
                Ok(Arc::clone(snapshot))
            }
            Err(e) => {
                self.discard(&key, &slot);
                self.record(|s| s.failures += 1);
                Err(e)
            }
        }
    }

    /// Get or create the slot for a key, bumping it to most-recently-used
    fn slot(&self, key: &SnapshotKey) -> Result<Slot> {
        let mut slots = self.lock_slots()?;

        if let Some(slot) = slots.get(key) {
            return Ok(Arc::clone(slot));
        }

        let slot: Slot = Arc::new(OnceCell::new());
        if let Some((evicted, _)) = slots.push(key.clone(), Arc::clone(&slot))
            && evicted != *key
        {
            debug!("Evicted snapshot: {}", evicted);
            self.record(|s| s.evictions += 1);
        }
        Ok(slot)
    }

    /// Remove a failed slot so the next caller fetches again
    fn discard(&self, key: &SnapshotKey, failed: &Slot) {
        if let Ok(mut slots) = self.lock_slots()
            && slots.peek(key).is_some_and(|current| Arc::ptr_eq(current, failed))
        {
            slots.pop(key);
        }
    }

    fn lock_slots(&self) -> Result<MutexGuard<'_, LruCache<SnapshotKey, Slot>>> {
        self.slots
            .lock()
            .map_err(|_| DiagramError::Config("Snapshot cache lock poisoned".to_string()))
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }

    /// Current number of cached entries (including in-flight fetches)
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().map(|s| s.cap().get()).unwrap_or(0)
    }
}

impl std::fmt::Debug for RepositorySnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositorySnapshotCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("stats", &self.stats())
            .finish()
    }
}
