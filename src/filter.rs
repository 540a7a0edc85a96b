//! Translatability filter.
//!
//! Decides whether a string carries natural-language text worth sending to a
//! translation backend. The rules are conservative: anything that looks like
//! a structural token (database identifier, URL, email address, phone number)
//! is left alone, everything else is translated.

use regex::Regex;
use std::sync::OnceLock;

static OBJECT_ID: OnceLock<Regex> = OnceLock::new();
static URL_SCHEME: OnceLock<Regex> = OnceLock::new();
static EMAIL: OnceLock<Regex> = OnceLock::new();
static PHONE: OnceLock<Regex> = OnceLock::new();

fn object_id_regex() -> &'static Regex {
    OBJECT_ID.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("valid object id regex"))
}

fn url_scheme_regex() -> &'static Regex {
    URL_SCHEME.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("valid url scheme regex")
    })
}

fn email_regex() -> &'static Regex {
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

fn phone_regex() -> &'static Regex {
    PHONE.get_or_init(|| Regex::new(r"^\+?[0-9]{1,16}$").expect("valid phone regex"))
}

/// A 24-character hexadecimal token, the shape of a document identifier.
pub fn is_identifier(text: &str) -> bool {
    object_id_regex().is_match(text.trim())
}

/// Whether `text` should be sent to a translation backend.
pub fn is_translatable(text: &str) -> bool {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return false;
    }

    !(object_id_regex().is_match(trimmed)
        || url_scheme_regex().is_match(trimmed)
        || email_regex().is_match(trimmed)
        || phone_regex().is_match(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Rejections ====================

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(!is_translatable(""));
        assert!(!is_translatable("   "));
        assert!(!is_translatable("\n\t"));
    }

    #[test]
    fn test_rejects_object_ids() {
        assert!(!is_translatable("507f1f77bcf86cd799439011"));
        assert!(!is_translatable("507F1F77BCF86CD799439011"));
    }

    #[test]
    fn test_rejects_urls() {
        assert!(!is_translatable("https://example.com"));
        assert!(!is_translatable("http://example.com/path?q=1"));
        assert!(!is_translatable("ftp://files.example.com"));
        assert!(!is_translatable("  https://example.com  "));
    }

    #[test]
    fn test_rejects_emails() {
        assert!(!is_translatable("a@b.com"));
        assert!(!is_translatable("support@example.co.uk"));
    }

    #[test]
    fn test_rejects_phone_numbers() {
        assert!(!is_translatable("+14155551234"));
        assert!(!is_translatable("4155551234"));
        assert!(!is_translatable("1234567890123456"));
    }

    // ==================== Acceptances ====================

    #[test]
    fn test_accepts_plain_text() {
        assert!(is_translatable("Hello"));
        assert!(is_translatable("Hello, world!"));
        assert!(is_translatable("ok"));
    }

    #[test]
    fn test_accepts_numbers_as_words_and_punctuation() {
        assert!(is_translatable("forty-two"));
        assert!(is_translatable("Price: $19.99!"));
        assert!(is_translatable("..."));
    }

    #[test]
    fn test_accepts_near_miss_structural_tokens() {
        // 23 and 25 hex characters are not identifiers
        assert!(is_translatable("507f1f77bcf86cd79943901"));
        assert!(is_translatable("507f1f77bcf86cd7994390111"));
        // More than 16 digits is not treated as a phone number
        assert!(is_translatable("12345678901234567"));
        // Not an email without a domain dot
        assert!(is_translatable("user@localhost"));
        // Mentions a URL but does not start with one
        assert!(is_translatable("Visit https://example.com today"));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("507f1f77bcf86cd799439011"));
        assert!(!is_identifier("Hello"));
        assert!(!is_identifier("507f1f77bcf86cd79943901g"));
    }
}
