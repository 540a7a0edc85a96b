//! Translation cache gateway.
//!
//! Maps `(text, source language, target language)` to a previously produced
//! translation. The gateway never fails a translation: store errors are
//! logged, counted in [`TranslationMetrics`], and turned into misses or no-ops.
//! Every store call runs under a time limit, so an unreachable store behaves
//! like a failing one instead of stalling the caller.
//!
//! Keys follow `translation:<src>:<tgt>:<sha256(lowercase(trim(text)))>`, so
//! `"Hello "` and `"hello"` share one entry.

mod redis_store;
mod store;

pub use redis_store::RedisStore;
pub use store::{CacheStore, MemoryStore, StoreStats};

use crate::error::CacheError;
use crate::metrics::TranslationMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Namespace shared by every cache key.
pub const KEY_NAMESPACE: &str = "translation";

/// Default limit for one store call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// One resolved translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub source_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
}

/// Stored form of a [`TranslationUnit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    #[serde(flatten)]
    unit: TranslationUnit,
    created_at: DateTime<Utc>,
    ttl_seconds: u64,
}

/// Cache statistics as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub memory_footprint: usize,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Text form the cache key is derived from. Texts with equal normal forms
/// share one cache entry.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

fn normalize_lang(lang: &str) -> String {
    lang.trim().to_lowercase()
}

/// Key prefix for one language pair.
pub fn namespace(source_lang: &str, target_lang: &str) -> String {
    format!(
        "{}:{}:{}:",
        KEY_NAMESPACE,
        normalize_lang(source_lang),
        normalize_lang(target_lang)
    )
}

/// Cache key for a text in a language pair.
pub fn cache_key(text: &str, source_lang: &str, target_lang: &str) -> String {
    let digest = Sha256::digest(normalize_text(text).as_bytes());
    format!("{}{}", namespace(source_lang, target_lang), hex::encode(digest))
}

pub struct TranslationCache {
    store: Arc<dyn CacheStore>,
    state: Mutex<ConnectionState>,
    metrics: Arc<TranslationMetrics>,
    operation_timeout: Duration,
}

impl TranslationCache {
    pub fn new(store: Arc<dyn CacheStore>, metrics: Arc<TranslationMetrics>) -> Self {
        Self {
            store,
            state: Mutex::new(ConnectionState::Disconnected),
            metrics,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Limit for each store call. A store that does not answer in time is
    /// treated as disconnected.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Cache over a fresh in-process store.
    pub fn in_memory(metrics: Arc<TranslationMetrics>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), metrics)
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection_state().await == ConnectionState::Connected
    }

    /// Establish the store connection. Idempotent.
    pub async fn connect(&self) -> Result<(), CacheError> {
        let mut state = self.state.lock().await;
        if *state == ConnectionState::Connected {
            return Ok(());
        }
        self.bounded(self.store.connect()).await?;
        *state = ConnectionState::Connected;
        debug!("Translation cache connected ({})", self.store.name());
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), CacheError> {
        let mut state = self.state.lock().await;
        *state = ConnectionState::Disconnected;
        self.store.disconnect().await
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        if self.operation_timeout.is_zero() {
            return operation.await;
        }
        tokio::time::timeout(self.operation_timeout, operation)
            .await
            .unwrap_or_else(|_| {
                Err(CacheError::Connection(format!(
                    "{} store did not answer within {:?}",
                    self.store.name(),
                    self.operation_timeout
                )))
            })
    }

    /// Log and count a store failure. Connection failures drop the state so
    /// the next operation reconnects.
    async fn absorb(&self, operation: &str, error: CacheError) {
        warn!(
            "Translation cache {} failed ({}), continuing without cache: {}",
            operation,
            self.store.name(),
            error
        );
        self.metrics.record_cache_error();
        if matches!(error, CacheError::Connection(_)) {
            *self.state.lock().await = ConnectionState::Disconnected;
        }
    }

    pub async fn get(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Option<TranslationUnit> {
        if let Err(e) = self.connect().await {
            self.absorb("connect", e).await;
            return None;
        }

        let key = cache_key(text, source_lang, target_lang);
        let raw = match self.bounded(self.store.get_many(std::slice::from_ref(&key))).await {
            Ok(mut values) => values.pop().flatten()?,
            Err(e) => {
                self.absorb("get", e).await;
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry.unit),
            Err(e) => {
                self.absorb("get", e.into()).await;
                None
            }
        }
    }

    /// Hits only, keyed by the text as given.
    pub async fn get_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> HashMap<String, String> {
        let mut hits = HashMap::new();
        if texts.is_empty() {
            return hits;
        }
        if let Err(e) = self.connect().await {
            self.absorb("connect", e).await;
            return hits;
        }

        let keys: Vec<String> = texts
            .iter()
            .map(|text| cache_key(text, source_lang, target_lang))
            .collect();
        let values = match self.bounded(self.store.get_many(&keys)).await {
            Ok(values) => values,
            Err(e) => {
                self.absorb("batch get", e).await;
                return hits;
            }
        };

        for (text, raw) in texts.iter().zip(values) {
            let Some(raw) = raw else { continue };
            match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => {
                    hits.insert(text.clone(), entry.unit.translated_text);
                }
                Err(e) => self.absorb("batch get", e.into()).await,
            }
        }
        hits
    }

    pub async fn put(
        &self,
        text: &str,
        translated_text: &str,
        source_lang: &str,
        target_lang: &str,
        ttl_seconds: u64,
    ) {
        let mapping = HashMap::from([(text.to_string(), translated_text.to_string())]);
        self.put_batch(&mapping, source_lang, target_lang, ttl_seconds)
            .await;
    }

    pub async fn put_batch(
        &self,
        translations: &HashMap<String, String>,
        source_lang: &str,
        target_lang: &str,
        ttl_seconds: u64,
    ) {
        if translations.is_empty() {
            return;
        }
        if let Err(e) = self.connect().await {
            self.absorb("connect", e).await;
            return;
        }

        let created_at = Utc::now();
        let entries: Result<Vec<(String, String)>, serde_json::Error> = translations
            .iter()
            .map(|(text, translated)| {
                let entry = CacheEntry {
                    unit: TranslationUnit {
                        source_text: text.clone(),
                        translated_text: translated.clone(),
                        source_lang: source_lang.to_string(),
                        target_lang: target_lang.to_string(),
                    },
                    created_at,
                    ttl_seconds,
                };
                serde_json::to_string(&entry)
                    .map(|json| (cache_key(text, source_lang, target_lang), json))
            })
            .collect();

        let entries = match entries {
            Ok(entries) => entries,
            Err(e) => {
                self.absorb("put", e.into()).await;
                return;
            }
        };

        if let Err(e) = self
            .bounded(self.store.set_many(&entries, Duration::from_secs(ttl_seconds)))
            .await
        {
            self.absorb("put", e).await;
        } else {
            debug!(
                "Cached {} translations for {}->{}",
                entries.len(),
                source_lang,
                target_lang
            );
        }
    }

    /// Remove every entry of one language pair. Returns how many were removed.
    pub async fn clear(&self, source_lang: &str, target_lang: &str) -> usize {
        if let Err(e) = self.connect().await {
            self.absorb("connect", e).await;
            return 0;
        }

        let prefix = namespace(source_lang, target_lang);
        match self.bounded(self.store.delete_prefix(&prefix)).await {
            Ok(removed) => removed,
            Err(e) => {
                self.absorb("clear", e).await;
                0
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let disconnected = CacheStats {
            entry_count: 0,
            memory_footprint: 0,
            connected: false,
        };

        if let Err(e) = self.connect().await {
            self.absorb("connect", e).await;
            return disconnected;
        }

        let prefix = format!("{}:", KEY_NAMESPACE);
        match self.bounded(self.store.stats(&prefix)).await {
            Ok(stats) => CacheStats {
                entry_count: stats.entry_count,
                memory_footprint: stats.memory_bytes,
                connected: self.is_connected().await,
            },
            Err(e) => {
                self.absorb("stats", e).await;
                CacheStats {
                    connected: self.is_connected().await,
                    ..disconnected
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory_cache() -> (TranslationCache, Arc<TranslationMetrics>) {
        let metrics = Arc::new(TranslationMetrics::new());
        (TranslationCache::in_memory(metrics.clone()), metrics)
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn connect(&self) -> Result<(), CacheError> {
            Err(CacheError::Connection("refused".to_string()))
        }
        async fn disconnect(&self) -> Result<(), CacheError> {
            Ok(())
        }
        async fn get_many(&self, _: &[String]) -> Result<Vec<Option<String>>, CacheError> {
            Err(CacheError::Connection("refused".to_string()))
        }
        async fn set_many(&self, _: &[(String, String)], _: Duration) -> Result<(), CacheError> {
            Err(CacheError::Connection("refused".to_string()))
        }
        async fn delete_prefix(&self, _: &str) -> Result<usize, CacheError> {
            Err(CacheError::Connection("refused".to_string()))
        }
        async fn stats(&self, _: &str) -> Result<StoreStats, CacheError> {
            Err(CacheError::Connection("refused".to_string()))
        }
    }

    /// Store that accepts connections and then never answers.
    struct HangingStore;

    #[async_trait]
    impl CacheStore for HangingStore {
        fn name(&self) -> &'static str {
            "hanging"
        }
        async fn connect(&self) -> Result<(), CacheError> {
            std::future::pending().await
        }
        async fn disconnect(&self) -> Result<(), CacheError> {
            Ok(())
        }
        async fn get_many(&self, _: &[String]) -> Result<Vec<Option<String>>, CacheError> {
            std::future::pending().await
        }
        async fn set_many(&self, _: &[(String, String)], _: Duration) -> Result<(), CacheError> {
            std::future::pending().await
        }
        async fn delete_prefix(&self, _: &str) -> Result<usize, CacheError> {
            std::future::pending().await
        }
        async fn stats(&self, _: &str) -> Result<StoreStats, CacheError> {
            std::future::pending().await
        }
    }

    /// Memory store that counts connects and can drop its connection.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        connects: AtomicUsize,
        fail_reads: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl CacheStore for CountingStore {
        fn name(&self) -> &'static str {
            "counting"
        }
        async fn connect(&self) -> Result<(), CacheError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.inner.connect().await
        }
        async fn disconnect(&self) -> Result<(), CacheError> {
            self.inner.disconnect().await
        }
        async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
            if self.fail_reads.swap(false, Ordering::SeqCst) {
                return Err(CacheError::Connection("connection reset".to_string()));
            }
            self.inner.get_many(keys).await
        }
        async fn set_many(&self, e: &[(String, String)], ttl: Duration) -> Result<(), CacheError> {
            self.inner.set_many(e, ttl).await
        }
        async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
            self.inner.delete_prefix(prefix).await
        }
        async fn stats(&self, prefix: &str) -> Result<StoreStats, CacheError> {
            self.inner.stats(prefix).await
        }
    }

    // ==================== Key Derivation ====================

    #[test]
    fn test_cache_key_normalizes_text() {
        assert_eq!(cache_key("Hello ", "en", "es"), cache_key("hello", "en", "es"));
        assert_eq!(cache_key("  HELLO", "EN", "es"), cache_key("hello", "en", "es"));
    }

    #[test]
    fn test_cache_key_separates_language_pairs() {
        assert_ne!(cache_key("hello", "en", "es"), cache_key("hello", "en", "fr"));
        assert_ne!(cache_key("hello", "en", "es"), cache_key("hello", "es", "en"));
    }

    #[test]
    fn test_cache_key_layout() {
        let key = cache_key("hello", "en", "es");
        assert!(key.starts_with("translation:en:es:"));
        // sha256 hex digest
        assert_eq!(key.len(), "translation:en:es:".len() + 64);
    }

    // ==================== Round Trips ====================

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let (cache, _) = memory_cache();

        cache.put("Hello", "Hola", "en", "es", 60).await;
        let unit = cache.get("Hello", "en", "es").await.expect("cached");

        assert_eq!(unit.translated_text, "Hola");
        assert_eq!(unit.source_lang, "en");
        assert_eq!(unit.target_lang, "es");
    }

    #[tokio::test]
    async fn test_get_uses_normalized_key() {
        let (cache, _) = memory_cache();

        cache.put("hello", "hola", "en", "es", 60).await;

        assert!(cache.get("Hello ", "en", "es").await.is_some());
        assert!(cache.get("Hello", "en", "fr").await.is_none());
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let (cache, _) = memory_cache();

        cache.put("Hello", "Hola", "en", "es", 1).await;
        assert!(cache.get("Hello", "en", "es").await.is_some());

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(cache.get("Hello", "en", "es").await.is_none());
    }

    #[tokio::test]
    async fn test_get_batch_returns_hits_only() {
        let (cache, metrics) = memory_cache();
        let mapping = HashMap::from([
            ("One".to_string(), "Uno".to_string()),
            ("Two".to_string(), "Dos".to_string()),
        ]);
        cache.put_batch(&mapping, "en", "es", 60).await;

        let hits = cache
            .get_batch(&texts(&["One", "Three", "Two"]), "en", "es")
            .await;

        assert_eq!(hits.len(), 2);
        assert_eq!(hits["One"], "Uno");
        assert_eq!(hits["Two"], "Dos");
        assert_eq!(metrics.cache_errors(), 0);
    }

    #[tokio::test]
    async fn test_clear_only_removes_language_pair() {
        let (cache, _) = memory_cache();
        cache.put("Hello", "Hola", "en", "es", 60).await;
        cache.put("Hello", "Bonjour", "en", "fr", 60).await;

        assert_eq!(cache.clear("en", "es").await, 1);

        assert!(cache.get("Hello", "en", "es").await.is_none());
        assert!(cache.get("Hello", "en", "fr").await.is_some());
    }

    #[tokio::test]
    async fn test_stats_reports_entries_and_connection() {
        let (cache, _) = memory_cache();
        cache.put("Hello", "Hola", "en", "es", 60).await;

        let stats = cache.stats().await;

        assert_eq!(stats.entry_count, 1);
        assert!(stats.memory_footprint > 0);
        assert!(stats.connected);
    }

    // ==================== Connection Lifecycle ====================

    #[tokio::test]
    async fn test_connection_is_lazy_and_idempotent() {
        let store = Arc::new(CountingStore::default());
        let cache = TranslationCache::new(store.clone(), Arc::new(TranslationMetrics::new()));

        assert_eq!(cache.connection_state().await, ConnectionState::Disconnected);
        assert_eq!(store.connects.load(Ordering::SeqCst), 0);

        cache.get("Hello", "en", "es").await;
        cache.get("Hello", "en", "es").await;
        cache.connect().await.unwrap();

        assert!(cache.is_connected().await);
        assert_eq!(store.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_triggers_reconnect() {
        let store = Arc::new(CountingStore::default());
        let metrics = Arc::new(TranslationMetrics::new());
        let cache = TranslationCache::new(store.clone(), metrics.clone());
        cache.put("Hello", "Hola", "en", "es", 60).await;

        store.fail_reads.store(true, Ordering::SeqCst);
        assert!(cache.get("Hello", "en", "es").await.is_none());
        assert!(!cache.is_connected().await);
        assert_eq!(metrics.cache_errors(), 1);

        assert!(cache.get("Hello", "en", "es").await.is_some());
        assert_eq!(store.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disconnect_then_use_reconnects() {
        let (cache, _) = memory_cache();
        cache.put("Hello", "Hola", "en", "es", 60).await;

        cache.disconnect().await.unwrap();
        assert!(!cache.is_connected().await);

        assert!(cache.get("Hello", "en", "es").await.is_some());
        assert!(cache.is_connected().await);
    }

    // ==================== Failure Absorption ====================

    #[tokio::test]
    async fn test_broken_store_degrades_to_misses_and_no_ops() {
        let metrics = Arc::new(TranslationMetrics::new());
        let cache = TranslationCache::new(Arc::new(BrokenStore), metrics.clone());

        cache.put("Hello", "Hola", "en", "es", 60).await;
        assert!(cache.get("Hello", "en", "es").await.is_none());
        assert!(cache
            .get_batch(&texts(&["Hello"]), "en", "es")
            .await
            .is_empty());
        assert_eq!(cache.clear("en", "es").await, 0);

        let stats = cache.stats().await;
        assert!(!stats.connected);
        assert_eq!(stats.entry_count, 0);

        assert_eq!(metrics.cache_errors(), 5);
    }

    #[tokio::test]
    async fn test_unresponsive_store_times_out_as_miss() {
        let metrics = Arc::new(TranslationMetrics::new());
        let cache = TranslationCache::new(Arc::new(HangingStore), metrics.clone())
            .with_operation_timeout(Duration::from_millis(50));

        let start = std::time::Instant::now();
        assert!(cache.get("Hello", "en", "es").await.is_none());
        cache.put("Hello", "Hola", "en", "es", 60).await;
        assert_eq!(cache.clear("en", "es").await, 0);

        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!cache.is_connected().await);
        assert_eq!(metrics.cache_errors(), 3);
    }

    #[tokio::test]
    async fn test_timeout_applies_after_connect() {
        let store = Arc::new(CountingStore::default());
        let metrics = Arc::new(TranslationMetrics::new());
        let cache = TranslationCache::new(store.clone(), metrics.clone())
            .with_operation_timeout(Duration::from_millis(50));

        cache.put("Hello", "Hola", "en", "es", 60).await;

        assert!(cache.get("Hello", "en", "es").await.is_some());
        assert_eq!(metrics.cache_errors(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(TranslationMetrics::new());
        let cache = TranslationCache::new(store.clone(), metrics.clone());
        store
            .set_many(
                &[(cache_key("Hello", "en", "es"), "not json".to_string())],
                Duration::ZERO,
            )
            .await
            .unwrap();

        assert!(cache.get("Hello", "en", "es").await.is_none());
        assert!(cache
            .get_batch(&texts(&["Hello"]), "en", "es")
            .await
            .is_empty());
        assert_eq!(metrics.cache_errors(), 2);
    }
}
