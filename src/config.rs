use crate::backend::{
    BackendProvider, DEFAULT_AZURE_ENDPOINT, DEFAULT_GOOGLE_API_URL, DEFAULT_OPENAI_API_URL,
};
use crate::error::ConfigurationError;
use crate::record::{DEFAULT_MAX_DEPTH, DEFAULT_RESERVED_PREFIX};
use std::str::FromStr;
use std::time::Duration;

/// Source language value that turns on detection.
pub const AUTO_DETECT: &str = "auto";

#[derive(Debug, Clone)]
pub struct Config {
    // Translation
    pub provider: BackendProvider,
    pub source_language: String,

    // Cache
    pub cache_ttl: Duration,
    /// Limit for one cache store call before it counts as unavailable
    pub cache_timeout: Duration,
    pub redis_url: Option<String>,

    // Batching
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub batch_timeout: Duration,
    pub document_timeout: Duration,

    // Records
    pub reserved_field_prefix: String,
    pub max_depth: usize,

    // OpenAI
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_url: String,

    // Google
    pub google_api_key: Option<String>,
    pub google_api_url: String,

    // Azure
    pub azure_key: Option<String>,
    pub azure_region: Option<String>,
    pub azure_endpoint: String,

    // HTTP API
    pub api_key: Option<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider = match get("TRANSLATION_PROVIDER") {
            Some(value) => BackendProvider::from_str(&value)?,
            None => BackendProvider::OpenAi,
        };

        let source_language = get("SOURCE_LANGUAGE")
            .map(|v| v.to_lowercase())
            .unwrap_or_else(|| "en".to_string());

        let batch_size: usize = parse_or(&get, "BATCH_SIZE", 10)?;
        if batch_size == 0 {
            return Err(ConfigurationError::Invalid {
                name: "BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        let config = Self {
            provider,
            source_language,

            cache_ttl: Duration::from_secs(parse_or(&get, "CACHE_EXPIRATION_SECONDS", 86_400)?),
            cache_timeout: Duration::from_millis(parse_or(&get, "CACHE_TIMEOUT_MS", 2_000)?),
            redis_url: get("REDIS_URL"),

            batch_size,
            batch_delay: Duration::from_millis(parse_or(&get, "BATCH_DELAY_MS", 500)?),
            batch_timeout: Duration::from_secs(parse_or(&get, "BATCH_TIMEOUT_SECS", 60)?),
            document_timeout: Duration::from_secs(parse_or(&get, "DOCUMENT_TIMEOUT_SECS", 120)?),

            reserved_field_prefix: lookup("RESERVED_FIELD_PREFIX")
                .unwrap_or_else(|| DEFAULT_RESERVED_PREFIX.to_string()),
            max_depth: parse_or(&get, "MAX_DEPTH", DEFAULT_MAX_DEPTH)?,

            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            openai_api_url: get("OPENAI_API_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_API_URL.to_string()),

            google_api_key: get("GOOGLE_TRANSLATE_API_KEY"),
            google_api_url: get("GOOGLE_TRANSLATE_API_URL")
                .unwrap_or_else(|| DEFAULT_GOOGLE_API_URL.to_string()),

            azure_key: get("AZURE_TRANSLATOR_KEY"),
            azure_region: get("AZURE_TRANSLATOR_REGION"),
            azure_endpoint: get("AZURE_TRANSLATOR_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_AZURE_ENDPOINT.to_string()),

            api_key: get("API_KEY"),
            port: parse_or(&get, "PORT", 8080)?,
        };

        config.check_credentials()?;
        Ok(config)
    }

    /// The selected provider must have its credentials.
    fn check_credentials(&self) -> Result<(), ConfigurationError> {
        let missing = match self.provider {
            BackendProvider::OpenAi if self.openai_api_key.is_none() => Some("OPENAI_API_KEY"),
            BackendProvider::Google if self.google_api_key.is_none() => {
                Some("GOOGLE_TRANSLATE_API_KEY")
            }
            BackendProvider::Azure if self.azure_key.is_none() => Some("AZURE_TRANSLATOR_KEY"),
            _ => None,
        };
        match missing {
            Some(name) => Err(ConfigurationError::Missing(name)),
            None => Ok(()),
        }
    }

    pub fn auto_detect(&self) -> bool {
        self.source_language == AUTO_DETECT
    }

    /// Language assumed when detection is off or fails.
    pub fn default_source_language(&self) -> &str {
        if self.auto_detect() {
            "en"
        } else {
            &self.source_language
        }
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigurationError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigurationError::Invalid { name, value }),
        None => Ok(default),
    }
}
