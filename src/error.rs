use thiserror::Error;

use crate::llm::ProviderError;
use crate::models::SourceType;

/// Failures of the web-fetch capability, split by who is at fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timeout while fetching URL: {url}")]
    Timeout { url: String },

    #[error("Error fetching URL {url}: {reason}")]
    Client { url: String, reason: String },

    #[error("Error processing content from URL {url}: {reason}")]
    Server { url: String, reason: String },
}

impl FetchError {
    /// Stable code used in tool error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "ERR_FETCH_TIMEOUT",
            FetchError::Client { .. } => "ERR_FETCH_CLIENT",
            FetchError::Server { .. } => "ERR_FETCH_SERVER",
        }
    }
}

/// Errors surfaced by the summarization and extraction pipelines.
///
/// Interpretation failures never show up here: they resolve to a default
/// structure inside the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Source access error ({source_type}): {source}")]
    SourceAccess {
        source_type: SourceType,
        #[source]
        source: FetchError,
    },

    #[error("LLM provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "ERR_VALIDATION",
            PipelineError::SourceAccess { source, .. } => source.code(),
            PipelineError::Provider(_) => "ERR_PROVIDER",
        }
    }

    /// True when the caller, not the service, caused the failure.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_)
                | PipelineError::SourceAccess {
                    source: FetchError::Client { .. },
                    ..
                }
        )
    }
}
