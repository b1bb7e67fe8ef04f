//! Durable cache tier
//!
//! sled-backed key/value store rooted at the configured cache
//! directory. Values are stored as JSON entries carrying an absolute
//! expiry stamp; an expired entry is deleted when read and reported
//! absent.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CacheError;

#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    value: Value,
    expires_at_ms: i64,
}

pub(crate) struct DiskTier {
    db: sled::Db,
}

impl DiskTier {
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        Ok(DiskTier {
            db: sled::open(path)?,
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let Some(raw) = self.db.get(key)? else {
            return Ok(None);
        };

        let entry: DiskEntry = serde_json::from_slice(&raw)?;
        if entry.expires_at_ms <= Utc::now().timestamp_millis() {
            self.db.remove(key)?;
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    pub fn insert(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let entry = DiskEntry {
            value,
            expires_at_ms: Utc::now().timestamp_millis() + ttl.as_millis() as i64,
        };
        self.db.insert(key, serde_json::to_vec(&entry)?)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.db.remove(key)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.db.clear()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn size_on_disk(&self) -> Result<u64, CacheError> {
        Ok(self.db.size_on_disk()?)
    }

    pub fn flush(&self) -> Result<(), CacheError> {
        self.db.flush()?;
        Ok(())
    }
}
