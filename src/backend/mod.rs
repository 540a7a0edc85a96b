//! Translation backends.
//!
//! Every provider implements [`TranslationBackend`]. A provider only has to
//! translate one chunk of texts and detect a language; the batch contract
//! (deduplication, chunking with an inter-chunk delay, completeness checks)
//! is shared by the provided methods.
//!
//! # Example
//!
//! ```rust,ignore
//! let backend = build_backend(&config)?;
//! let texts = vec!["Hello".to_string(), "Goodbye".to_string()];
//! let translated = backend.translate_batch(&texts, "en", "es").await?;
//! assert_eq!(translated["Hello"], "Hola");
//! ```

mod azure;
mod google;
mod mock;
mod openai;

pub use azure::{AzureTranslator, DEFAULT_AZURE_ENDPOINT};
pub use google::{GoogleTranslator, DEFAULT_GOOGLE_API_URL};
pub use mock::{MockBackend, MockMode};
pub use openai::{OpenAiTranslator, DEFAULT_OPENAI_API_URL};

use crate::config::Config;
use crate::error::{BackendError, BackendResult, ConfigurationError};
use crate::retry::RetryConfig;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Settings every provider shares.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Maximum number of texts per API request
    pub chunk_size: usize,
    /// Pause between consecutive chunk requests
    pub chunk_delay: Duration,
    /// Returned by `detect_language` when detection fails
    pub default_source_language: String,
    /// Retry policy for one chunk request
    pub retry: RetryConfig,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            chunk_delay: Duration::from_millis(500),
            default_source_language: "en".to_string(),
            retry: RetryConfig::backend_call(),
        }
    }
}

impl ProviderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.batch_size.max(1),
            chunk_delay: config.batch_delay,
            default_source_language: config.default_source_language().to_string(),
            retry: RetryConfig::backend_call(),
        }
    }
}

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    fn settings(&self) -> &ProviderSettings;

    /// Translate one chunk (at most `settings().chunk_size` texts).
    ///
    /// The returned vector corresponds positionally to `texts`; callers
    /// check its length.
    async fn translate_chunk(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> BackendResult<Vec<String>>;

    /// Detect the language of `text`, returning its ISO 639-1 code.
    async fn detect(&self, text: &str) -> BackendResult<String>;

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> BackendResult<String> {
        let texts = [text.to_string()];
        let mut translated = self.translate_chunk(&texts, source_lang, target_lang).await?;
        if translated.len() != 1 {
            return Err(BackendError::IncompleteResponse {
                provider: self.name(),
                expected: 1,
                received: translated.len(),
            });
        }
        Ok(translated.remove(0))
    }

    /// Translate many texts, returning `original -> translated`.
    ///
    /// Duplicates are sent once. Chunks run sequentially with
    /// `settings().chunk_delay` between them. Any failed, malformed or short
    /// chunk fails the whole call, so every requested text is a key of a
    /// successful result.
    async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> BackendResult<HashMap<String, String>> {
        let unique = dedupe(texts);
        let mut translated = HashMap::with_capacity(unique.len());
        if unique.is_empty() {
            return Ok(translated);
        }

        let settings = self.settings();
        let chunks: Vec<&[String]> = unique.chunks(settings.chunk_size.max(1)).collect();
        let total = chunks.len();

        for (index, chunk) in chunks.into_iter().enumerate() {
            if index > 0 && !settings.chunk_delay.is_zero() {
                tokio::time::sleep(settings.chunk_delay).await;
            }
            debug!(
                "{}: translating chunk {}/{} ({} texts, {}->{})",
                self.name(),
                index + 1,
                total,
                chunk.len(),
                source_lang,
                target_lang
            );

            let results = self.translate_chunk(chunk, source_lang, target_lang).await?;
            if results.len() != chunk.len() {
                return Err(BackendError::IncompleteResponse {
                    provider: self.name(),
                    expected: chunk.len(),
                    received: results.len(),
                });
            }
            translated.extend(chunk.iter().cloned().zip(results));
        }

        Ok(translated)
    }

    /// Detect the language of `text`, falling back to the default source
    /// language when the provider cannot tell.
    async fn detect_language(&self, text: &str) -> String {
        match self.detect(text).await {
            Ok(code) if !code.trim().is_empty() => code.trim().to_lowercase(),
            Ok(_) => self.settings().default_source_language.clone(),
            Err(e) => {
                warn!(
                    "{}: language detection failed, assuming {}: {}",
                    self.name(),
                    self.settings().default_source_language,
                    e
                );
                self.settings().default_source_language.clone()
            }
        }
    }
}

/// First occurrence of each text, in input order.
fn dedupe(texts: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(texts.len());
    texts
        .iter()
        .filter(|text| seen.insert(text.as_str()))
        .cloned()
        .collect()
}

/// Which provider serves translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendProvider {
    OpenAi,
    Google,
    Azure,
    Mock,
}

impl FromStr for BackendProvider {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Ok(BackendProvider::OpenAi),
            "google" => Ok(BackendProvider::Google),
            "azure" => Ok(BackendProvider::Azure),
            "mock" => Ok(BackendProvider::Mock),
            other => Err(ConfigurationError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for BackendProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendProvider::OpenAi => "openai",
            BackendProvider::Google => "google",
            BackendProvider::Azure => "azure",
            BackendProvider::Mock => "mock",
        };
        f.write_str(name)
    }
}

/// Build the configured provider.
pub fn build_backend(config: &Config) -> Result<Arc<dyn TranslationBackend>, ConfigurationError> {
    let settings = ProviderSettings::from_config(config);
    let backend: Arc<dyn TranslationBackend> = match config.provider {
        BackendProvider::OpenAi => Arc::new(OpenAiTranslator::new(
            config
                .openai_api_key
                .clone()
                .ok_or(ConfigurationError::Missing("OPENAI_API_KEY"))?,
            config.openai_model.clone(),
            config.openai_api_url.clone(),
            settings,
        )),
        BackendProvider::Google => Arc::new(GoogleTranslator::new(
            config
                .google_api_key
                .clone()
                .ok_or(ConfigurationError::Missing("GOOGLE_TRANSLATE_API_KEY"))?,
            config.google_api_url.clone(),
            settings,
        )),
        BackendProvider::Azure => Arc::new(AzureTranslator::new(
            config
                .azure_key
                .clone()
                .ok_or(ConfigurationError::Missing("AZURE_TRANSLATOR_KEY"))?,
            config.azure_region.clone(),
            config.azure_endpoint.clone(),
            settings,
        )),
        BackendProvider::Mock => Arc::new(MockBackend::new(MockMode::Suffix).with_settings(settings)),
    };
    Ok(backend)
}

/// Shared HTTP client with a request timeout.
pub(crate) fn http_client(provider: &'static str) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|e| {
            warn!("{}: falling back to default HTTP client: {}", provider, e);
            reqwest::Client::new()
        })
}

/// Read a non-success response into a `BackendError::Http`.
pub(crate) async fn http_error(provider: &'static str, response: reqwest::Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
    BackendError::Http {
        provider,
        status,
        body,
    }
}
