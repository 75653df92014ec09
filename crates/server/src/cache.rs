//! Time-expiring memo cache for finished recommendation lists.

use data_loader::Recommendation;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Keyed by a hash of the request arguments
pub type CacheKey = u64;

#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, (Instant, V)>>,
}

pub type RecommendationCache = TtlCache<Vec<Recommendation>>;

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // A panic mid-insert leaves the map consistent, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, (Instant, V)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The stored value, unless it has expired. Expired entries are evicted.
    pub fn get(&self, key: CacheKey) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(&key) {
            Some((stored, value)) if stored.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(&key);
                debug!("Cache entry {key:x} expired");
                None
            }
            None => None,
        }
    }

    /// Store `value` under `key`. Expired entries are swept out first, so
    /// the map never holds more than one TTL's worth of inserts.
    pub fn insert(&self, key: CacheKey, value: V) {
        let mut entries = self.lock();
        let purged = self.retain_fresh(&mut entries);
        if purged > 0 {
            debug!("Purged {purged} expired cache entries");
        }
        entries.insert(key, (Instant::now(), value));
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drop every expired entry, returning how many went
    pub fn purge_expired(&self) -> usize {
        self.retain_fresh(&mut self.lock())
    }

    fn retain_fresh(&self, entries: &mut HashMap<CacheKey, (Instant, V)>) -> usize {
        let before = entries.len();
        entries.retain(|_, (stored, _)| stored.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
