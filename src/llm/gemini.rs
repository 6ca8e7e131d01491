use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ChatMessage, LlmProvider, ProviderError};
use crate::config::Settings;

const PROVIDER_NAME: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<GeminiMessage>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "topP")]
    top_p: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct GeminiMessage {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

/// Registry constructor.
pub fn create(settings: &Settings) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    Ok(Arc::new(GeminiProvider::from_settings(settings)?))
}

impl GeminiProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let api_key = settings
            .google_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey(PROVIDER_NAME))?;

        let client = Client::builder()
            .build()
            .map_err(|source| ProviderError::Request {
                provider: PROVIDER_NAME,
                source,
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: settings.model_name.clone(),
            generation_config: GenerationConfig {
                temperature: settings.temperature,
                top_p: settings.top_p,
                max_output_tokens: settings.max_tokens,
            },
        })
    }

    /// System messages become the system instruction; `assistant` turns map
    /// to Gemini's `model` role.
    fn build_request(&self, messages: &[ChatMessage]) -> GenerateContentRequest {
        let system_text = messages
            .iter()
            .filter(|msg| msg.role == "system")
            .map(|msg| msg.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let contents = messages
            .iter()
            .filter(|msg| msg.role != "system")
            .map(|msg| GeminiMessage {
                role: match msg.role.as_str() {
                    "assistant" => "model".to_string(),
                    _ => "user".to_string(),
                },
                parts: vec![GeminiPart {
                    text: msg.content.clone(),
                }],
            })
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction: (!system_text.is_empty()).then(|| GeminiContent {
                parts: vec![GeminiPart { text: system_text }],
            }),
            generation_config: self.generation_config.clone(),
        }
    }
}

fn response_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse(PROVIDER_NAME))?;

    let text = candidate
        .content
        .parts
        .into_iter()
        .map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        warn!(target: "llm", finish_reason = ?candidate.finish_reason, "Gemini candidate carried no text");
        return Err(ProviderError::EmptyResponse(PROVIDER_NAME));
    }
    Ok(text)
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        self.generate_chat_response(&[ChatMessage::user(prompt)])
            .await
    }

    async fn generate_chat_response(
        &self,
        messages: &[ChatMessage],
    ) -> Result<String, ProviderError> {
        let payload = self.build_request(messages);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        // The key travels in a header; errors are still stripped of their URL.
        let request_error = |source: reqwest::Error| ProviderError::Request {
            provider: PROVIDER_NAME,
            source: source.without_url(),
        };

        debug!(target: "llm", model = %self.model, messages = messages.len(), "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(target: "llm", status = status.as_u16(), "Gemini API returned an error status");
            return Err(ProviderError::Api {
                provider: PROVIDER_NAME,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(request_error)?;
        let text = response_text(parsed)?;
        debug!(target: "llm", model = %self.model, len = text.len(), "generateContent completed");
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
