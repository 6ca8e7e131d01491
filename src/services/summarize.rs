use std::sync::Arc;
use tracing::{error, info};

use super::prompt::PromptBuilder;
use super::router::ContentRouter;
use crate::error::PipelineError;
use crate::llm::LlmProvider;
use crate::models::{SummarizationRequest, SummarizationResponse};
use crate::utils::text_clean::word_count;

pub struct SummarizationService {
    router: ContentRouter,
    provider: Arc<dyn LlmProvider>,
    prompts: PromptBuilder,
    default_max_length: usize,
}

impl SummarizationService {
    pub fn new(
        router: ContentRouter,
        provider: Arc<dyn LlmProvider>,
        prompts: PromptBuilder,
        default_max_length: usize,
    ) -> Self {
        Self {
            router,
            provider,
            prompts,
            default_max_length,
        }
    }

    /// Resolves the source, prompts the model once and wraps its reply.
    /// Provider failures are returned to the caller unchanged.
    pub async fn summarize(
        &self,
        request: &SummarizationRequest,
    ) -> Result<SummarizationResponse, PipelineError> {
        let source_type = request.source.source_type();
        let max_length = request
            .max_length
            .filter(|len| *len > 0)
            .unwrap_or(self.default_max_length);

        let resolved = self.router.resolve(&request.source).await.map_err(|e| {
            error!(target: "summarize", source_type = %source_type, "Error resolving content: {}", e);
            e
        })?;

        let prompt = self
            .prompts
            .summarize(&resolved.content, &resolved.context, max_length);

        let summary = self.provider.generate_text(&prompt).await.map_err(|e| {
            error!(
                target: "summarize",
                source_type = %source_type,
                provider = self.provider.provider_name(),
                "Error generating summary: {}", e
            );
            PipelineError::from(e)
        })?;

        let words = word_count(&summary);
        info!(target: "summarize", source_type = %source_type, words = words, target_words = max_length, "Summary generated");

        Ok(SummarizationResponse {
            word_count: words,
            title: resolved.context.title().map(str::to_string),
            metadata: request
                .include_metadata
                .then(|| resolved.context.metadata_map()),
            summary,
        })
    }
}
