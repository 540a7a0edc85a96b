//! Google Cloud Translation API v2.
//!
//! `POST {base}?key=...` with `{"q": [...], "source", "target", "format": "text"}`
//! answers `{"data": {"translations": [{"translatedText": ...}]}}`.
//! Detection goes to `{base}/detect`.

use super::{http_client, http_error, ProviderSettings, TranslationBackend};
use crate::error::{BackendError, BackendResult};
use crate::retry::with_retry_if;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const PROVIDER: &str = "Google";

pub const DEFAULT_GOOGLE_API_URL: &str =
    "https://translation.googleapis.com/language/translate/v2";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TranslationsData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct DetectionsData {
    /// One list of candidates per input text
    detections: Vec<Vec<Detection>>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    language: String,
    #[serde(default)]
    confidence: f64,
}

pub struct GoogleTranslator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    settings: ProviderSettings,
}

impl GoogleTranslator {
    pub fn new(api_key: String, base_url: String, settings: ProviderSettings) -> Self {
        Self {
            client: http_client(PROVIDER),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
        }
    }

    async fn post<T: serde::de::DeserializeOwned + Send>(
        &self,
        operation: &str,
        url: &str,
        body: &serde_json::Value,
    ) -> BackendResult<T> {
        with_retry_if(
            &self.settings.retry,
            operation,
            || async {
                let response = self
                    .client
                    .post(url)
                    .query(&[("key", self.api_key.as_str())])
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| BackendError::network(PROVIDER, e))?;

                if !response.status().is_success() {
                    return Err(http_error(PROVIDER, response).await);
                }

                let envelope: Envelope<T> = response
                    .json()
                    .await
                    .map_err(|e| BackendError::malformed(PROVIDER, e.to_string()))?;
                Ok(envelope.data)
            },
            BackendError::is_retryable,
        )
        .await
    }
}

#[async_trait]
impl TranslationBackend for GoogleTranslator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn translate_chunk(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> BackendResult<Vec<String>> {
        let body = json!({
            "q": texts,
            "source": source_lang,
            "target": target_lang,
            "format": "text"
        });

        let data: TranslationsData = self
            .post(
                &format!("Google translation {}->{}", source_lang, target_lang),
                &self.base_url,
                &body,
            )
            .await?;

        Ok(data
            .translations
            .into_iter()
            .map(|t| t.translated_text)
            .collect())
    }

    async fn detect(&self, text: &str) -> BackendResult<String> {
        let url = format!("{}/detect", self.base_url);
        let data: DetectionsData = self
            .post("Google language detection", &url, &json!({ "q": [text] }))
            .await?;

        data.detections
            .into_iter()
            .next()
            .and_then(|candidates| {
                candidates
                    .into_iter()
                    .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            })
            .map(|d| d.language)
            .ok_or_else(|| BackendError::malformed(PROVIDER, "no detections in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_partial_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn create_translator(server: &MockServer, chunk_size: usize) -> GoogleTranslator {
        GoogleTranslator::new(
            "google-key".to_string(),
            format!("{}/language/translate/v2", server.uri()),
            ProviderSettings {
                chunk_size,
                chunk_delay: Duration::ZERO,
                default_source_language: "en".to_string(),
                retry: RetryConfig::new(2, Duration::from_millis(10)),
            },
        )
    }

    fn translations(items: &[&str]) -> serde_json::Value {
        let list: Vec<_> = items
            .iter()
            .map(|t| json!({ "translatedText": t }))
            .collect();
        json!({ "data": { "translations": list } })
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_translate_chunk_sends_v2_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/language/translate/v2"))
            .and(query_param("key", "google-key"))
            .and(body_partial_json(json!({
                "q": ["Hello", "World"],
                "source": "en",
                "target": "fr",
                "format": "text"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(translations(&["Bonjour", "Monde"])))
            .expect(1)
            .mount(&server)
            .await;

        let translator = create_translator(&server, 10);
        let result = translator
            .translate_chunk(&texts(&["Hello", "World"]), "en", "fr")
            .await
            .unwrap();

        assert_eq!(result, texts(&["Bonjour", "Monde"]));
    }

    #[tokio::test]
    async fn test_batch_uses_one_request_per_chunk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/language/translate/v2"))
            .and(body_partial_json(json!({ "q": ["a", "b"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(translations(&["A", "B"])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/language/translate/v2"))
            .and(body_partial_json(json!({ "q": ["c"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(translations(&["C"])))
            .expect(1)
            .mount(&server)
            .await;

        let translator = create_translator(&server, 2);
        let result = translator
            .translate_batch(&texts(&["a", "b", "c"]), "en", "de")
            .await
            .unwrap();

        assert_eq!(result["a"], "A");
        assert_eq!(result["c"], "C");
    }

    #[tokio::test]
    async fn test_missing_data_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "nope" })))
            .mount(&server)
            .await;

        let translator = create_translator(&server, 10);
        let result = translator.translate("Hello", "en", "fr").await;

        assert!(matches!(result, Err(BackendError::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .expect(1)
            .mount(&server)
            .await;

        let translator = create_translator(&server, 10);
        let result = translator.translate("Hello", "en", "fr").await;

        assert!(matches!(result, Err(BackendError::Http { status: 403, .. })));
    }

    #[tokio::test]
    async fn test_detect_picks_most_confident_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/language/translate/v2/detect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "detections": [[
                    { "language": "pt", "confidence": 0.3 },
                    { "language": "es", "confidence": 0.9 }
                ]] }
            })))
            .mount(&server)
            .await;

        let translator = create_translator(&server, 10);
        assert_eq!(translator.detect("Hola amigos").await.unwrap(), "es");
    }

    #[tokio::test]
    async fn test_detect_with_no_candidates_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/language/translate/v2/detect"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "detections": [] } })),
            )
            .mount(&server)
            .await;

        let translator = create_translator(&server, 10);
        assert_eq!(translator.detect_language("???").await, "en");
    }
}
