//! Key/value store boundary behind the translation cache.

use crate::error::CacheError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Aggregate numbers reported by a store for one key namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub entry_count: usize,
    pub memory_bytes: usize,
}

/// Opaque string store with per-key expiry.
///
/// A `ttl` of zero means the entry never expires.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &'static str;

    async fn connect(&self) -> Result<(), CacheError>;

    async fn disconnect(&self) -> Result<(), CacheError>;

    /// Values for `keys`, positionally; `None` for absent or expired keys.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError>;

    /// Write every entry with the same expiry. Each write replaces the whole value.
    async fn set_many(&self, entries: &[(String, String)], ttl: Duration)
        -> Result<(), CacheError>;

    /// Remove every key starting with `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    /// Count and size of the live keys starting with `prefix`.
    async fn stats(&self, prefix: &str) -> Result<StoreStats, CacheError>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process store, used when no external cache is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    connected: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, stored| !stored.is_expired(now));
        before - entries.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> Result<(), CacheError> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), CacheError> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .map(|key| {
                entries
                    .get(key)
                    .filter(|stored| !stored.is_expired(now))
                    .map(|stored| stored.value.clone())
            })
            .collect())
    }

    async fn set_many(
        &self,
        new_entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        let mut entries = self.entries.write().await;
        for (key, value) in new_entries {
            entries.insert(
                key.clone(),
                StoredValue {
                    value: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }

    async fn stats(&self, prefix: &str) -> Result<StoreStats, CacheError> {
        self.purge_expired().await;
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .fold(StoreStats::default(), |mut stats, (key, stored)| {
                stats.entry_count += 1;
                stats.memory_bytes += key.len() + stored.value.len();
                stats
            }))
    }
}
