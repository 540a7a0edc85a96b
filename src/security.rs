use subtle::ConstantTimeEq;

/// Header carrying the HTTP API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Compare a presented API key with the configured one without leaking,
/// through timing, how many leading bytes matched.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Whether a request presenting `provided` may pass.
///
/// With no key configured every request passes.
pub fn api_key_matches(expected: Option<&str>, provided: Option<&str>) -> bool {
    match (expected, provided) {
        (None, _) => true,
        (Some(expected), Some(provided)) => constant_time_compare(expected, provided),
        (Some(_), None) => false,
    }
}
