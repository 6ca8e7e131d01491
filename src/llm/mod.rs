use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::Settings;

pub mod gemini;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{0} returned no text")]
    EmptyResponse(&'static str),

    #[error("Unknown LLM provider '{0}'")]
    UnknownProvider(String),

    #[error("Missing API key for {0}")]
    MissingApiKey(&'static str),
}

/// Text-generation backend shared by the summarization and extraction
/// pipelines.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError>;

    async fn generate_chat_response(&self, messages: &[ChatMessage])
        -> Result<String, ProviderError>;

    /// Returns the name of the provider for logging and debugging
    fn provider_name(&self) -> &'static str;
}

type ProviderConstructor = fn(&Settings) -> Result<Arc<dyn LlmProvider>, ProviderError>;

static PROVIDERS: &[(&str, ProviderConstructor)] = &[
    ("google", gemini::create as ProviderConstructor),
    ("gemini", gemini::create as ProviderConstructor),
];

/// Names accepted by [`create_provider`].
pub fn provider_names() -> impl Iterator<Item = &'static str> {
    PROVIDERS.iter().map(|(name, _)| *name)
}

/// Builds the provider selected by `settings.provider`.
pub fn create_provider(settings: &Settings) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    let name = settings.provider.trim().to_ascii_lowercase();
    match PROVIDERS.iter().find(|(candidate, _)| *candidate == name) {
        Some((_, constructor)) => constructor(settings),
        None => Err(ProviderError::UnknownProvider(settings.provider.clone())),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replies with a fixed text or fails with an API error; records prompts.
    pub struct StubProvider {
        reply: Option<String>,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
    }

    impl StubProvider {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.prompts.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
            self.generate_chat_response(&[ChatMessage::user(prompt)]).await
        }

        async fn generate_chat_response(
            &self,
            messages: &[ChatMessage],
        ) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = messages.last() {
                self.prompts.lock().unwrap().push(message.content.clone());
            }
            self.reply.clone().ok_or(ProviderError::Api {
                provider: "stub",
                status: 503,
                body: "model overloaded".to_string(),
            })
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }
    }
}
