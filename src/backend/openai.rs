use super::{http_client, http_error, ProviderSettings, TranslationBackend};
use crate::error::{BackendError, BackendResult};
use crate::retry::with_retry_if;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "OpenAI";

pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI Chat Completion request
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// JSON object the model is asked to answer with
#[derive(Debug, Deserialize)]
struct TranslationPayload {
    translations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DetectionPayload {
    language: String,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

fn build_translation_system_prompt(source_lang: &str, target_lang: &str) -> String {
    format!(
        r#"You are a professional translator. Translate each string of the JSON array you receive from the language with ISO 639-1 code "{}" to the language with ISO 639-1 code "{}".

Rules:
- Return exactly one translation per input string, in the same order.
- Preserve placeholders, markup, URLs, numbers and surrounding whitespace.
- Keep proper names of people, companies and products untranslated.

Answer with a JSON object of the form {{"translations": ["...", "..."]}} and nothing else."#,
        source_lang, target_lang
    )
}

const DETECTION_SYSTEM_PROMPT: &str = r#"Identify the language of the text you receive. Answer with a JSON object of the form {"language": "<ISO 639-1 code>"} and nothing else."#;

/// Chat-completion based translator.
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
    settings: ProviderSettings,
}

impl OpenAiTranslator {
    pub fn new(api_key: String, model: String, api_url: String, settings: ProviderSettings) -> Self {
        Self {
            client: http_client(PROVIDER),
            api_key,
            model,
            api_url,
            settings,
        }
    }

    fn request(&self, system: String, user: String) -> ChatRequest {
        let is_reasoning = is_reasoning_model(&self.model);
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system,
                },
                Message {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            // Reasoning models don't support temperature - use reasoning_effort instead
            temperature: if is_reasoning { None } else { Some(0.3) },
            reasoning_effort: is_reasoning.then(|| "low".to_string()),
        }
    }

    /// Send one chat request (with retries) and return the first choice's content.
    async fn complete(&self, operation: &str, request: &ChatRequest) -> BackendResult<String> {
        with_retry_if(
            &self.settings.retry,
            operation,
            || async {
                let response = self
                    .client
                    .post(&self.api_url)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .header("Content-Type", "application/json")
                    .json(request)
                    .send()
                    .await
                    .map_err(|e| BackendError::network(PROVIDER, e))?;

                if !response.status().is_success() {
                    return Err(http_error(PROVIDER, response).await);
                }

                let chat: ChatResponse = response
                    .json()
                    .await
                    .map_err(|e| BackendError::malformed(PROVIDER, e.to_string()))?;

                chat.choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| BackendError::malformed(PROVIDER, "response contained no choices"))
            },
            BackendError::is_retryable,
        )
        .await
    }
}

#[async_trait]
impl TranslationBackend for OpenAiTranslator {
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
        let user = serde_json::to_string(texts)
            .map_err(|e| BackendError::malformed(PROVIDER, e.to_string()))?;
        let request = self.request(build_translation_system_prompt(source_lang, target_lang), user);

        let content = self
            .complete(&format!("OpenAI translation {}->{}", source_lang, target_lang), &request)
            .await?;

        let payload: TranslationPayload = serde_json::from_str(content.trim())
            .map_err(|e| BackendError::malformed(PROVIDER, format!("translations payload: {}", e)))?;
        Ok(payload.translations)
    }

    async fn detect(&self, text: &str) -> BackendResult<String> {
        let request = self.request(DETECTION_SYSTEM_PROMPT.to_string(), text.to_string());
        let content = self.complete("OpenAI language detection", &request).await?;

        let payload: DetectionPayload = serde_json::from_str(content.trim())
            .map_err(|e| BackendError::malformed(PROVIDER, format!("detection payload: {}", e)))?;
        Ok(payload.language)
    }
}
