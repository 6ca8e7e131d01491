use std::sync::Arc;
use tracing::{error, info};

use super::interpret::{default_structure, map_custom, map_entities, map_key_points, parse_json_response};
use super::prompt::PromptBuilder;
use super::router::ContentRouter;
use crate::error::PipelineError;
use crate::llm::LlmProvider;
use crate::models::{ExtractionKind, ExtractionRequest, ExtractionResponse, ExtractionTask};

fn failure_prefix(kind: ExtractionKind) -> &'static str {
    match kind {
        ExtractionKind::KeyPoints => "Error extracting key points",
        ExtractionKind::Entities => "Error extracting entities",
        ExtractionKind::Custom => "Error performing custom extraction",
    }
}

pub struct ExtractionService {
    router: ContentRouter,
    provider: Arc<dyn LlmProvider>,
    prompts: PromptBuilder,
}

impl ExtractionService {
    pub fn new(router: ContentRouter, provider: Arc<dyn LlmProvider>, prompts: PromptBuilder) -> Self {
        Self {
            router,
            provider,
            prompts,
        }
    }

    /// Resolves the source and runs one extraction task against it.
    ///
    /// Source problems are returned as errors. Once content is resolved the
    /// call always yields a response: model failures set `success = false`
    /// and unparseable replies produce the task's empty structure.
    pub async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResponse, PipelineError> {
        let source_type = request.source.source_type();
        let kind = request.task.kind();

        let resolved = self.router.resolve(&request.source).await.map_err(|e| {
            error!(target: "extract", source_type = %source_type, kind = %kind, "Error resolving content: {}", e);
            e
        })?;

        let prompt = self.prompts.extraction(&request.task, &resolved.content);
        let raw = match self.provider.generate_text(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(
                    target: "extract",
                    source_type = %source_type,
                    kind = %kind,
                    provider = self.provider.provider_name(),
                    "{}: {}", failure_prefix(kind), e
                );
                return Ok(ExtractionResponse::failed(
                    kind,
                    source_type,
                    format!("{}: {}", failure_prefix(kind), e),
                ));
            }
        };

        let interpreted = parse_json_response(&raw, default_structure(kind, &raw));
        let mut response = ExtractionResponse::succeeded(kind, source_type);
        let mapped = match &request.task {
            ExtractionTask::KeyPoints => {
                map_key_points(&interpreted.value).map(|pairs| response.key_value_pairs = pairs)
            }
            ExtractionTask::Entities => {
                map_entities(&interpreted.value).map(|entities| response.entities = entities)
            }
            ExtractionTask::Custom { .. } => {
                response.data = map_custom(interpreted.value);
                Ok(())
            }
        };
        if let Err(e) = mapped {
            error!(
                target: "extract",
                source_type = %source_type,
                kind = %kind,
                "{}: unexpected reply shape: {}", failure_prefix(kind), e
            );
            return Ok(ExtractionResponse::failed(
                kind,
                source_type,
                format!("{}: unexpected reply shape: {}", failure_prefix(kind), e),
            ));
        }
        if request.include_context {
            response.context = Some(resolved.context.describe());
        }

        info!(
            target: "extract",
            source_type = %source_type,
            kind = %kind,
            fallback = interpreted.fallback_used,
            pairs = response.key_value_pairs.len(),
            entities = response.entities.len(),
            "Extraction completed"
        );
        Ok(response)
    }
}
