//! In-memory cache tier
//!
//! Bounded LRU front for the durable tier. Entries carry their own
//! expiry, so a value written with a short TTL disappears from this
//! tier on time as well instead of lingering until eviction.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    expires_at: Instant,
}

pub(crate) struct MemoryTier {
    entries: Mutex<LruCache<String, MemoryEntry>>,
    max_entries: usize,
}

impl MemoryTier {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        MemoryTier {
            entries: Mutex::new(LruCache::new(capacity)),
            max_entries: capacity.get(),
        }
    }

    /// Fetch a live value; an expired entry is evicted on the way out.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        entries.pop(key);
        None
    }

    pub fn insert(&self, key: &str, value: Value, ttl: Duration) {
        let entry = MemoryEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().put(key.to_string(), entry);
    }

    pub fn remove(&self, key: &str) {
        self.entries.lock().pop(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}
