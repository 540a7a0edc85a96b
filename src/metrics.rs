//! Translation metrics and observability.
//!
//! Counters for cache traffic, absorbed cache failures and backend calls.
//! One instance is shared (behind an `Arc`) between a translator and its
//! cache gateway.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Texts answered from the cache
    cache_hits: AtomicUsize,

    /// Texts the cache could not answer
    cache_misses: AtomicUsize,

    /// Cache operations that failed and were absorbed
    cache_errors: AtomicUsize,

    /// Batch calls made to the translation backend
    backend_calls: AtomicUsize,

    /// Backend batch calls that failed
    backend_failures: AtomicUsize,

    /// Documents fully translated and rebuilt
    documents_translated: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hits(&self, count: usize) {
        self.cache_hits.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_cache_misses(&self, count: usize) {
        self.cache_misses.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_call(&self) {
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_failure(&self) {
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_document(&self) {
        self.documents_translated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn cache_errors(&self) -> usize {
        self.cache_errors.load(Ordering::Relaxed)
    }

    pub fn backend_calls(&self) -> usize {
        self.backend_calls.load(Ordering::Relaxed)
    }

    pub fn backend_failures(&self) -> usize {
        self.backend_failures.load(Ordering::Relaxed)
    }

    pub fn documents_translated(&self) -> usize {
        self.documents_translated.load(Ordering::Relaxed)
    }

    /// Snapshot of the counters with derived rates.
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let total_cache_queries = hits + misses;
        let cache_hit_rate = if total_cache_queries > 0 {
            (hits as f64 / total_cache_queries as f64) * 100.0
        } else {
            0.0
        };

        let calls = self.backend_calls();
        let failures = self.backend_failures();
        let backend_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            cache_errors: self.cache_errors(),
            backend_calls: calls,
            backend_failures: failures,
            backend_success_rate,
            documents_translated: self.documents_translated(),
        }
    }
}

/// Point-in-time translation statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,

    /// Percentage (0-100)
    pub cache_hit_rate: f64,

    pub cache_errors: usize,
    pub backend_calls: usize,
    pub backend_failures: usize,

    /// Percentage (0-100)
    pub backend_success_rate: f64,

    pub documents_translated: usize,
}
