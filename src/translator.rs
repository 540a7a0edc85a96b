//! Document translation orchestrator.
//!
//! Each document moves through one linear pipeline:
//!
//! 1. **Located**: candidate strings collected with the field selector,
//!    filtered for translatability and grouped by cache key in first-seen
//!    order; the first text of each group stands for the whole group
//! 2. **Cache checked**: one batch lookup splits candidates into hits and misses
//! 3. **Backend dispatched**: misses go to the backend in one batch call and
//!    are cached only if the whole batch succeeds
//! 4. **Merged**: hits and fresh translations form one mapping; a candidate in
//!    neither keeps its original text
//! 5. **Reconstructed**: a new document with the mapping applied
//!
//! A failure in any step fails the whole document. There is no partial output.

use crate::backend::{build_backend, TranslationBackend};
use crate::cache::{
    normalize_text, CacheStats, CacheStore, MemoryStore, RedisStore, TranslationCache,
    DEFAULT_OPERATION_TIMEOUT,
};
use crate::config::{Config, AUTO_DETECT};
use crate::error::{BackendError, ConfigurationError, StructuralError, TranslateError};
use crate::filter::is_translatable;
use crate::metrics::{MetricsReport, TranslationMetrics};
use crate::record::{FieldSelector, Record, TextLocator};
use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Orchestrator settings. A zero timeout disables that timeout.
#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    /// Default source language; `auto` turns on detection
    pub source_language: String,
    pub cache_ttl: Duration,
    /// Limit for one cache store call
    pub cache_timeout: Duration,
    /// Limit for one backend batch call
    pub batch_timeout: Duration,
    /// Limit for a whole document pipeline
    pub document_timeout: Duration,
    pub locator: TextLocator,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            cache_ttl: Duration::from_secs(86_400),
            cache_timeout: DEFAULT_OPERATION_TIMEOUT,
            batch_timeout: Duration::from_secs(60),
            document_timeout: Duration::from_secs(120),
            locator: TextLocator::default(),
        }
    }
}

impl TranslatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_language: config.source_language.clone(),
            cache_ttl: config.cache_ttl,
            cache_timeout: config.cache_timeout,
            batch_timeout: config.batch_timeout,
            document_timeout: config.document_timeout,
            locator: TextLocator::new(config.reserved_field_prefix.clone(), config.max_depth),
        }
    }
}

/// Where a text translation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationSource {
    Cache,
    Backend,
    /// Not translatable, or source and target languages are the same
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextTranslation {
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub source: TranslationSource,
}

impl TextTranslation {
    pub fn cached(&self) -> bool {
        self.source == TranslationSource::Cache
    }
}

pub struct DocumentTranslator {
    backend: Arc<dyn TranslationBackend>,
    cache: TranslationCache,
    metrics: Arc<TranslationMetrics>,
    settings: TranslatorSettings,
}

impl DocumentTranslator {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        store: Arc<dyn CacheStore>,
        settings: TranslatorSettings,
    ) -> Self {
        let metrics = Arc::new(TranslationMetrics::new());
        let cache = TranslationCache::new(store, metrics.clone())
            .with_operation_timeout(settings.cache_timeout);
        Self {
            backend,
            cache,
            metrics,
            settings,
        }
    }

    /// Translator over the configured backend and cache store.
    ///
    /// Without `REDIS_URL` the cache lives in process memory.
    pub fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        let backend = build_backend(config)?;
        let store: Arc<dyn CacheStore> = match &config.redis_url {
            Some(url) => Arc::new(
                RedisStore::open_with_timeout(url, config.cache_timeout).map_err(|_| {
                    ConfigurationError::Invalid {
                        name: "REDIS_URL",
                        value: url.clone(),
                    }
                })?,
            ),
            None => Arc::new(MemoryStore::new()),
        };
        info!(
            "Translator ready: provider={}, cache={}, source={}",
            backend.name(),
            store.name(),
            config.source_language
        );
        Ok(Self::new(backend, store, TranslatorSettings::from_config(config)))
    }

    pub fn settings(&self) -> &TranslatorSettings {
        &self.settings
    }

    /// Translate one text, consulting the cache first.
    pub async fn translate_text(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> Result<TextTranslation, TranslateError> {
        let target = normalize_lang(target_lang);
        let source = self.resolve_source(source_lang, Some(text)).await;

        let skipped = |source: String| TextTranslation {
            original_text: text.to_string(),
            translated_text: text.to_string(),
            source_language: source,
            target_language: target.clone(),
            source: TranslationSource::Skipped,
        };

        if !is_translatable(text) || source == target {
            return Ok(skipped(source));
        }

        if let Some(unit) = self.cache.get(text, &source, &target).await {
            self.metrics.record_cache_hits(1);
            return Ok(TextTranslation {
                original_text: text.to_string(),
                translated_text: unit.translated_text,
                source_language: source,
                target_language: target,
                source: TranslationSource::Cache,
            });
        }
        self.metrics.record_cache_misses(1);

        let texts = [text.to_string()];
        let mut fresh = self.dispatch(&texts, &source, &target).await?;
        let translated = fresh.remove(text).ok_or(BackendError::IncompleteResponse {
            provider: self.backend.name(),
            expected: 1,
            received: 0,
        })?;
        self.cache
            .put(text, &translated, &source, &target, self.settings.cache_ttl.as_secs())
            .await;

        Ok(TextTranslation {
            original_text: text.to_string(),
            translated_text: translated,
            source_language: source,
            target_language: target,
            source: TranslationSource::Backend,
        })
    }

    /// Translate every selected string of a document into a new document.
    pub async fn translate_document(
        &self,
        document: &Record,
        target_lang: &str,
        source_lang: Option<&str>,
        selector: &FieldSelector,
    ) -> Result<Record, TranslateError> {
        let limit = self.settings.document_timeout;
        within(limit, self.run_pipeline(document, target_lang, source_lang, selector))
            .await
            .ok_or(TranslateError::Timeout(limit))?
    }

    /// Translate any serializable value through its JSON form.
    pub async fn translate_typed<T>(
        &self,
        value: &T,
        target_lang: &str,
        source_lang: Option<&str>,
        selector: &FieldSelector,
    ) -> Result<T, TranslateError>
    where
        T: Serialize + DeserializeOwned,
    {
        let document = serde_json::to_value(value).map_err(StructuralError::from)?;
        let translated = self
            .translate_document(&document, target_lang, source_lang, selector)
            .await?;
        Ok(serde_json::from_value(translated).map_err(StructuralError::from)?)
    }

    /// Translate documents one after another, stopping at the first failure.
    pub async fn translate_documents(
        &self,
        documents: &[Record],
        target_lang: &str,
        source_lang: Option<&str>,
        selector: &FieldSelector,
    ) -> Result<Vec<Record>, TranslateError> {
        self.translate_with_progress(documents, target_lang, source_lang, selector, |_, _| {})
            .await
    }

    /// Like [`translate_documents`](Self::translate_documents), calling
    /// `on_progress(completed, total)` after each document.
    pub async fn translate_with_progress<F>(
        &self,
        documents: &[Record],
        target_lang: &str,
        source_lang: Option<&str>,
        selector: &FieldSelector,
        mut on_progress: F,
    ) -> Result<Vec<Record>, TranslateError>
    where
        F: FnMut(usize, usize),
    {
        let total = documents.len();
        let mut translated = Vec::with_capacity(total);
        for document in documents {
            translated.push(
                self.translate_document(document, target_lang, source_lang, selector)
                    .await?,
            );
            on_progress(translated.len(), total);
        }
        Ok(translated)
    }

    /// Translate with at most `limit` documents in flight. Results keep input order.
    pub async fn translate_documents_concurrent(
        &self,
        documents: &[Record],
        target_lang: &str,
        source_lang: Option<&str>,
        selector: &FieldSelector,
        limit: usize,
    ) -> Result<Vec<Record>, TranslateError> {
        futures::stream::iter(documents)
            .map(|document| self.translate_document(document, target_lang, source_lang, selector))
            .buffered(limit.max(1))
            .try_collect()
            .await
    }

    pub async fn detect_language(&self, text: &str) -> String {
        self.backend.detect_language(text).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Remove every cached translation of one language pair.
    pub async fn clear_cache(&self, source_lang: &str, target_lang: &str) -> usize {
        let removed = self.cache.clear(source_lang, target_lang).await;
        info!(
            "Cleared {} cached translations for {}->{}",
            removed, source_lang, target_lang
        );
        removed
    }

    pub fn metrics(&self) -> MetricsReport {
        self.metrics.report()
    }

    async fn run_pipeline(
        &self,
        document: &Record,
        target_lang: &str,
        source_lang: Option<&str>,
        selector: &FieldSelector,
    ) -> Result<Record, TranslateError> {
        let start = Instant::now();
        let target = normalize_lang(target_lang);

        // Located
        let located = self.settings.locator.locate(document, selector)?;
        let groups = CandidateGroups::collect(located.into_iter().map(|found| found.text));
        let candidates = &groups.representatives;

        let source = self
            .resolve_source(source_lang, candidates.first().map(String::as_str))
            .await;
        if candidates.is_empty() || source == target {
            debug!(
                "Nothing to translate ({} candidates, {}->{})",
                candidates.len(),
                source,
                target
            );
            return Ok(document.clone());
        }

        // CacheChecked
        let mut merged = self.cache.get_batch(candidates, &source, &target).await;
        let misses: Vec<String> = candidates
            .iter()
            .filter(|text| !merged.contains_key(*text))
            .cloned()
            .collect();
        self.metrics.record_cache_hits(merged.len());
        self.metrics.record_cache_misses(misses.len());
        debug!(
            "{} candidates: {} cached, {} to translate",
            candidates.len(),
            merged.len(),
            misses.len()
        );

        // BackendDispatched
        if !misses.is_empty() {
            let fresh = self.dispatch(&misses, &source, &target).await?;
            self.cache
                .put_batch(&fresh, &source, &target, self.settings.cache_ttl.as_secs())
                .await;
            // Merged
            merged.extend(fresh);
        }

        // Reconstructed
        let mapping = groups.expand(&merged);
        let rebuilt = self.settings.locator.reconstruct(document, &mapping, selector)?;
        self.metrics.record_document();
        info!(
            "Translated document {}->{}: {} strings in {:?}",
            source,
            target,
            candidates.len(),
            start.elapsed()
        );
        Ok(rebuilt)
    }

    /// One backend batch call under the batch timeout.
    async fn dispatch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Result<HashMap<String, String>, BackendError> {
        self.metrics.record_backend_call();
        let limit = self.settings.batch_timeout;
        let result = within(limit, self.backend.translate_batch(texts, source, target))
            .await
            .unwrap_or(Err(BackendError::Timeout(limit)));
        if result.is_err() {
            self.metrics.record_backend_failure();
        }
        result
    }

    /// Explicit language, else the configured one; `auto` asks the backend
    /// about `sample`.
    async fn resolve_source(&self, requested: Option<&str>, sample: Option<&str>) -> String {
        let source = requested
            .map(normalize_lang)
            .unwrap_or_else(|| self.settings.source_language.clone());
        if source != AUTO_DETECT {
            return source;
        }
        match sample {
            Some(text) if is_translatable(text) => self.backend.detect_language(text).await,
            _ => self.backend.settings().default_source_language.clone(),
        }
    }
}

fn normalize_lang(lang: &str) -> String {
    lang.trim().to_lowercase()
}

/// Translatable texts of one document grouped by cache key.
///
/// Texts that differ only in case or edge whitespace share a cache entry, so
/// only the first of them is looked up and translated and every other member
/// reuses its result. A cold pass therefore yields what a warm pass reads back.
struct CandidateGroups {
    /// First-seen text of each group, in document order
    representatives: Vec<String>,
    /// Every distinct text with its representative
    members: Vec<(String, String)>,
}

impl CandidateGroups {
    fn collect(texts: impl IntoIterator<Item = String>) -> Self {
        let mut by_key: HashMap<String, String> = HashMap::new();
        let mut seen = HashSet::new();
        let mut representatives = Vec::new();
        let mut members = Vec::new();

        for text in texts.into_iter().filter(|text| is_translatable(text)) {
            if !seen.insert(text.clone()) {
                continue;
            }
            let representative = by_key
                .entry(normalize_text(&text))
                .or_insert_with(|| {
                    representatives.push(text.clone());
                    text.clone()
                })
                .clone();
            members.push((text, representative));
        }

        Self {
            representatives,
            members,
        }
    }

    /// Mapping for every member from a mapping over representatives.
    fn expand(&self, translations: &HashMap<String, String>) -> HashMap<String, String> {
        self.members
            .iter()
            .filter_map(|(member, representative)| {
                translations
                    .get(representative)
                    .map(|translated| (member.clone(), translated.clone()))
            })
            .collect()
    }
}

/// Run `future` under `limit`; `None` on timeout. A zero limit never times out.
async fn within<F: Future>(limit: Duration, future: F) -> Option<F::Output> {
    if limit.is_zero() {
        return Some(future.await);
    }
    tokio::time::timeout(limit, future).await.ok()
}
