//! Translate the human-readable strings of nested JSON documents through a
//! pluggable machine-translation backend, with a shared translation cache.

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod record;
pub mod retry;
pub mod security;
pub mod server;
pub mod translator;

pub use error::{BackendError, CacheError, ConfigurationError, StructuralError, TranslateError};
pub use record::{FieldPath, FieldSelector, Record};
pub use translator::{DocumentTranslator, TextTranslation, TranslationSource, TranslatorSettings};
