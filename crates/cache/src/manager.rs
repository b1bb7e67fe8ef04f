//! Cache manager
//!
//! One API over both tiers. Reads check memory first and fall back to
//! the durable tier under its lock, repopulating memory on a hit.
//! Writes go to memory unconditionally, then to the durable tier under
//! the lock, so the tiers never diverge by more than one call.

use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::disk::DiskTier;
use crate::error::CacheError;
use crate::memory::MemoryTier;

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding the durable tier
    pub cache_dir: PathBuf,
    /// Default entry lifetime in seconds
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Maximum number of entries in the memory tier
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: usize,
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        CacheConfig {
            cache_dir: cache_dir.into(),
            default_ttl_secs: default_ttl_secs(),
            memory_max_entries: default_memory_max_entries(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

fn default_ttl_secs() -> u64 {
    86_400
}

fn default_memory_max_entries() -> usize {
    1000
}

/// Two-tier cache shielding callers from gateway latency.
pub struct CacheManager {
    memory: MemoryTier,
    disk: Mutex<DiskTier>,
    default_ttl: Duration,
    /// Serializes `add_chat_message` read-modify-writes (see accessors).
    pub(crate) chat_update: Mutex<()>,
}

impl CacheManager {
    /// Open the cache rooted at the configured directory, creating it
    /// if needed.
    pub fn open(config: &CacheConfig) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&config.cache_dir)?;
        let disk = DiskTier::open(&config.cache_dir.join("disk"))?;

        Ok(CacheManager {
            memory: MemoryTier::new(config.memory_max_entries),
            disk: Mutex::new(disk),
            default_ttl: config.default_ttl(),
            chat_update: Mutex::new(()),
        })
    }

    /// Fetch a value. Memory hits return without touching the durable
    /// tier.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        if let Some(value) = self.memory.get(key) {
            log::debug!("cache hit (memory): {key}");
            return Ok(Some(serde_json::from_value(value)?));
        }

        let disk = self.disk.lock().await;
        if let Some(value) = disk.get(key)? {
            self.memory.insert(key, value.clone(), self.default_ttl);
            log::debug!("cache hit (disk): {key}");
            return Ok(Some(serde_json::from_value(value)?));
        }

        log::debug!("cache miss: {key}");
        Ok(None)
    }

    /// Store a value in both tiers with the given or default TTL.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        let ttl = ttl.unwrap_or(self.default_ttl);

        self.memory.insert(key, value.clone(), ttl);
        self.disk.lock().await.insert(key, value, ttl)?;

        log::debug!("cache set: {key}");
        Ok(())
    }

    /// Remove one key from both tiers.
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.memory.remove(key);
        self.disk.lock().await.remove(key)?;

        log::debug!("cache delete: {key}");
        Ok(())
    }

    /// Remove every entry from both tiers.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.memory.clear();
        self.disk.lock().await.clear()?;

        log::info!("cache cleared");
        Ok(())
    }

    /// Flush the durable tier. Call before shutdown.
    pub async fn flush(&self) -> Result<(), CacheError> {
        self.disk.lock().await.flush()
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let disk = self.disk.lock().await;
        Ok(CacheStats {
            memory: MemoryStats {
                size: self.memory.len(),
                max_size: self.memory.max_entries(),
                ttl_secs: self.default_ttl.as_secs(),
            },
            disk: DiskStats {
                entries: disk.len(),
                size_on_disk: disk.size_on_disk()?,
            },
        })
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub memory: MemoryStats,
    pub disk: DiskStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskStats {
    pub entries: usize,
    pub size_on_disk: u64,
}
