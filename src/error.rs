//! Error taxonomy for the translation pipeline.
//!
//! Cache failures never leave the cache gateway (they are logged and counted),
//! so `CacheError` is not part of [`TranslateError`]. Everything else reaches
//! the caller of a text or document translation.

use std::time::Duration;
use thiserror::Error;

/// A translation provider call failed.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{provider} API error ({status}): {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned a malformed response: {message}")]
    MalformedResponse {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned {received} translations for {expected} texts")]
    IncompleteResponse {
        provider: &'static str,
        expected: usize,
        received: usize,
    },

    #[error("translation batch timed out after {0:?}")]
    Timeout(Duration),
}

impl BackendError {
    /// Whether retrying the same request could succeed.
    ///
    /// Rate limits (429), server errors (5xx) and transport failures are
    /// transient. Other client errors and bad payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Http { status, .. } => *status == 429 || *status >= 500,
            BackendError::Network { .. } => true,
            BackendError::MalformedResponse { .. }
            | BackendError::IncompleteResponse { .. }
            | BackendError::Timeout(_) => false,
        }
    }

    pub(crate) fn network(provider: &'static str, error: reqwest::Error) -> Self {
        BackendError::Network {
            provider,
            message: error.to_string(),
        }
    }

    pub(crate) fn malformed(provider: &'static str, message: impl Into<String>) -> Self {
        BackendError::MalformedResponse {
            provider,
            message: message.into(),
        }
    }
}

/// A cache store operation failed. Absorbed by the gateway.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Connection(String),

    #[error("cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache store error: {0}")]
    Store(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(error: redis::RedisError) -> Self {
        if error.is_connection_dropped() || error.is_connection_refusal() || error.is_timeout() {
            CacheError::Connection(error.to_string())
        } else {
            CacheError::Store(error.to_string())
        }
    }
}

/// The input record cannot be walked or rebuilt.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("record nesting exceeds the maximum depth of {limit}")]
    DepthExceeded { limit: usize },

    #[error("document cannot be represented as a record: {0}")]
    Unsupported(#[from] serde_json::Error),

    #[error("no value at path '{0}' while rebuilding the record")]
    PathMismatch(String),
}

/// Invalid or incomplete configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown translation provider '{0}' (expected openai, google, azure or mock)")]
    UnknownProvider(String),

    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Error returned by the document and text translation operations.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("document translation timed out after {0:?}")]
    Timeout(Duration),
}

pub type BackendResult<T> = Result<T, BackendError>;
