//! In-process backend for development and tests.

use super::{ProviderSettings, TranslationBackend};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const PROVIDER: &str = "Mock";

#[derive(Debug, Clone)]
pub enum MockMode {
    /// `text` becomes `text_<target>`
    Suffix,
    /// Fixed answers; unknown texts fall back to `Suffix`
    Mappings(HashMap<String, String>),
    /// Every call fails with this message
    Error(String),
    /// Like `Suffix`, but the last text of each chunk is missing
    DropLast,
}

pub struct MockBackend {
    mode: MockMode,
    settings: ProviderSettings,
    detected_language: String,
    latency: Duration,
    chunk_calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            settings: ProviderSettings {
                chunk_delay: Duration::ZERO,
                ..ProviderSettings::default()
            },
            detected_language: "en".to_string(),
            latency: Duration::ZERO,
            chunk_calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn with_settings(mut self, settings: ProviderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_detected_language(mut self, language: &str) -> Self {
        self.detected_language = language.to_string();
        self
    }

    /// Sleep this long inside every chunk call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of `translate_chunk` calls so far.
    pub fn chunk_calls(&self) -> usize {
        self.chunk_calls.load(Ordering::SeqCst)
    }

    /// Every text sent for translation, in request order.
    pub fn requested_texts(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|texts| texts.clone())
            .unwrap_or_default()
    }

    fn translate_one(&self, text: &str, target_lang: &str) -> String {
        match &self.mode {
            MockMode::Mappings(map) => map
                .get(text)
                .cloned()
                .unwrap_or_else(|| format!("{}_{}", text, target_lang)),
            _ => format!("{}_{}", text, target_lang),
        }
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn translate_chunk(
        &self,
        texts: &[String],
        _source_lang: &str,
        target_lang: &str,
    ) -> BackendResult<Vec<String>> {
        self.chunk_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requested) = self.requested.lock() {
            requested.extend(texts.iter().cloned());
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match &self.mode {
            MockMode::Error(message) => Err(BackendError::Http {
                provider: PROVIDER,
                status: 500,
                body: message.clone(),
            }),
            MockMode::DropLast => Ok(texts
                .iter()
                .take(texts.len().saturating_sub(1))
                .map(|t| self.translate_one(t, target_lang))
                .collect()),
            MockMode::Suffix | MockMode::Mappings(_) => Ok(texts
                .iter()
                .map(|t| self.translate_one(t, target_lang))
                .collect()),
        }
    }

    async fn detect(&self, _text: &str) -> BackendResult<String> {
        match &self.mode {
            MockMode::Error(message) => Err(BackendError::Http {
                provider: PROVIDER,
                status: 500,
                body: message.clone(),
            }),
            _ => Ok(self.detected_language.clone()),
        }
    }
}
