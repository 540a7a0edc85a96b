//! Azure AI Translator (REST API v3).

use super::{http_client, http_error, ProviderSettings, TranslationBackend};
use crate::error::{BackendError, BackendResult};
use crate::retry::with_retry_if;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "Azure";
const API_VERSION: &str = "3.0";

pub const DEFAULT_AZURE_ENDPOINT: &str = "https://api.cognitive.microsofttranslator.com";

#[derive(Debug, Serialize)]
struct TextItem<'a> {
    #[serde(rename = "Text")]
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResult {
    translations: Vec<TranslatedText>,
}

#[derive(Debug, Deserialize)]
struct TranslatedText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct DetectResult {
    language: String,
}

pub struct AzureTranslator {
    client: reqwest::Client,
    key: String,
    region: Option<String>,
    endpoint: String,
    settings: ProviderSettings,
}

impl AzureTranslator {
    pub fn new(
        key: String,
        region: Option<String>,
        endpoint: String,
        settings: ProviderSettings,
    ) -> Self {
        Self {
            client: http_client(PROVIDER),
            key,
            region,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            settings,
        }
    }

    async fn post<T: serde::de::DeserializeOwned + Send>(
        &self,
        operation: &str,
        route: &str,
        query: &[(&str, &str)],
        body: &[TextItem<'_>],
    ) -> BackendResult<Vec<T>> {
        let url = format!("{}/{}", self.endpoint, route);
        with_retry_if(
            &self.settings.retry,
            operation,
            || async {
                let mut request = self
                    .client
                    .post(&url)
                    .query(&[("api-version", API_VERSION)])
                    .query(query)
                    .header("Ocp-Apim-Subscription-Key", &self.key)
                    .json(body);
                if let Some(region) = &self.region {
                    request = request.header("Ocp-Apim-Subscription-Region", region);
                }

                let response = request
                    .send()
                    .await
                    .map_err(|e| BackendError::network(PROVIDER, e))?;

                if !response.status().is_success() {
                    return Err(http_error(PROVIDER, response).await);
                }

                response
                    .json::<Vec<T>>()
                    .await
                    .map_err(|e| BackendError::malformed(PROVIDER, e.to_string()))
            },
            BackendError::is_retryable,
        )
        .await
    }
}

#[async_trait]
impl TranslationBackend for AzureTranslator {
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
        let body: Vec<TextItem<'_>> = texts.iter().map(|t| TextItem { text: t }).collect();
        let results: Vec<TranslateResult> = self
            .post(
                &format!("Azure translation {}->{}", source_lang, target_lang),
                "translate",
                &[("from", source_lang), ("to", target_lang)],
                &body,
            )
            .await?;

        results
            .into_iter()
            .map(|result| {
                result
                    .translations
                    .into_iter()
                    .next()
                    .map(|t| t.text)
                    .ok_or_else(|| BackendError::malformed(PROVIDER, "result without translations"))
            })
            .collect()
    }

    async fn detect(&self, text: &str) -> BackendResult<String> {
        let results: Vec<DetectResult> = self
            .post("Azure language detection", "detect", &[], &[TextItem { text }])
            .await?;

        results
            .into_iter()
            .next()
            .map(|r| r.language)
            .ok_or_else(|| BackendError::malformed(PROVIDER, "empty detection response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_json, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn create_translator(server: &MockServer, region: Option<&str>) -> AzureTranslator {
        AzureTranslator::new(
            "azure-key".to_string(),
            region.map(str::to_string),
            server.uri(),
            ProviderSettings {
                chunk_size: 10,
                chunk_delay: Duration::ZERO,
                default_source_language: "en".to_string(),
                retry: RetryConfig::new(2, Duration::from_millis(10)),
            },
        )
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_translate_chunk_sends_v3_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(query_param("api-version", "3.0"))
            .and(query_param("from", "en"))
            .and(query_param("to", "it"))
            .and(header("Ocp-Apim-Subscription-Key", "azure-key"))
            .and(header("Ocp-Apim-Subscription-Region", "westeurope"))
            .and(body_json(json!([{ "Text": "Hello" }, { "Text": "Bye" }])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "translations": [{ "text": "Ciao", "to": "it" }] },
                { "translations": [{ "text": "Arrivederci", "to": "it" }] }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let translator = create_translator(&server, Some("westeurope"));
        let result = translator
            .translate_chunk(&texts(&["Hello", "Bye"]), "en", "it")
            .await
            .unwrap();

        assert_eq!(result, texts(&["Ciao", "Arrivederci"]));
    }

    #[tokio::test]
    async fn test_result_without_translations_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "translations": [] }])),
            )
            .mount(&server)
            .await;

        let translator = create_translator(&server, None);
        let result = translator.translate("Hello", "en", "it").await;

        assert!(matches!(result, Err(BackendError::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn test_retries_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "translations": [{ "text": "Ciao", "to": "it" }] }
            ])))
            .mount(&server)
            .await;

        let translator = create_translator(&server, None);
        assert_eq!(translator.translate("Hello", "en", "it").await.unwrap(), "Ciao");
    }

    #[tokio::test]
    async fn test_detect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .and(query_param("api-version", "3.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "language": "ja", "score": 1.0, "isTranslationSupported": true }
            ])))
            .mount(&server)
            .await;

        let translator = create_translator(&server, None);
        assert_eq!(translator.detect("こんにちは").await.unwrap(), "ja");
    }
}
