use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use blackswan_models::{AnalysisResult, Fingerprint};
use lru::LruCache;
use tokio::time::Instant;
use tracing::debug;

use crate::error::CacheError;
use crate::store::ResultStore;

/// Upper bound for an entry lifetime when `now + ttl` would overflow.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

struct Entry {
    result: AnalysisResult,
    inserted_at: Instant,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process TTL + LRU result cache.
///
/// A single mutex guards the LRU map. Reads promote an entry, and inserting a
/// new key into a full cache evicts the least recently used one. Time comes
/// from `tokio::time::Instant`, so paused test runtimes can drive expiry
/// deterministically.
pub struct MemoryResultCache {
    entries: Mutex<LruCache<Fingerprint, Entry>>,
}

impl MemoryResultCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().map(|c| c.cap().get()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<Fingerprint, Entry>>, CacheError> {
        self.entries
            .lock()
            .map_err(|e| CacheError::Unavailable(format!("Cache mutex poisoned: {e}")))
    }
}

impl Default for MemoryResultCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl ResultStore for MemoryResultCache {
    async fn get(&self, key: &Fingerprint) -> Result<Option<AnalysisResult>, CacheError> {
        let now = Instant::now();
        let mut cache = self.lock()?;

        // Peek first so an expired entry is dropped without being promoted.
        let expired = match cache.peek(key) {
            Some(entry) => entry.is_expired(now),
            None => return Ok(None),
        };
        if expired {
            cache.pop(key);
            debug!(fingerprint = %key.short(), "Dropped expired cache entry on read");
            return Ok(None);
        }

        Ok(cache.get(key).map(|entry| entry.result.clone()))
    }

    async fn set(
        &self,
        key: &Fingerprint,
        result: &AnalysisResult,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + MAX_TTL.min(ttl));
        let entry = Entry {
            result: result.clone(),
            inserted_at: now,
            expires_at,
        };

        if let Some((evicted, old)) = self.lock()?.push(key.clone(), entry) {
            if &evicted != key {
                debug!(
                    fingerprint = %evicted.short(),
                    age_ms = now.duration_since(old.inserted_at).as_millis() as u64,
                    "Evicted least recently used cache entry"
                );
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &Fingerprint) -> Result<bool, CacheError> {
        Ok(self.lock()?.pop(key).is_some())
    }

    async fn cleanup_expired(&self) -> Result<usize, CacheError> {
        let now = Instant::now();
        let mut cache = self.lock()?;
        let expired: Vec<Fingerprint> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            cache.pop(key);
        }
        Ok(expired.len())
    }

    async fn len(&self) -> Result<usize, CacheError> {
        Ok(self.lock()?.len())
    }
}
