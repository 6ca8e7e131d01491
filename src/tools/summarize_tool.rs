use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::source::{pipeline_error_result, source_args_error_result, source_schema_properties, SourceArgs};
use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::models::SummarizationRequest;
use crate::services::SummarizationService;

pub static SUMMARIZE_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| {
    let mut properties = source_schema_properties();
    properties.insert(
        "maxLength".to_string(),
        json!({
            "type": "integer",
            "description": "Approximate summary length in words (default: server setting)",
            "minimum": 1
        }),
    );
    properties.insert(
        "includeMetadata".to_string(),
        json!({
            "type": "boolean",
            "description": "Whether to return source metadata with the summary (default: true)",
            "default": true
        }),
    );

    ToolDefinition {
        name: "summarize-content".to_string(),
        description: "Summarize a PDF, web page or text with the configured language model"
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": ["sourceType"]
        }),
        annotations: Some(ToolAnnotations {
            title: Some("Summarize Content".to_string()),
            read_only_hint: Some(true),
            open_world_hint: Some(true),
        }),
    }
});

#[derive(Debug, Deserialize)]
struct SummarizeParams {
    #[serde(flatten)]
    source: SourceArgs,
    #[serde(default, rename = "maxLength")]
    max_length: Option<usize>,
    #[serde(default = "default_true", rename = "includeMetadata")]
    include_metadata: bool,
}

fn default_true() -> bool {
    true
}

pub struct SummarizeTool {
    service: Arc<SummarizationService>,
    upload_dir: PathBuf,
}

impl SummarizeTool {
    pub fn new(service: Arc<SummarizationService>, upload_dir: PathBuf) -> Self {
        Self {
            service,
            upload_dir,
        }
    }

    pub async fn execute(&self, arguments: Option<Value>) -> CallToolResult {
        let params = match arguments {
            Some(args) => match serde_json::from_value::<SummarizeParams>(args) {
                Ok(params) => params,
                Err(e) => {
                    error!("Invalid summarize parameters: {}", e);
                    return CallToolResult::error(format!("Invalid parameters: {}", e));
                }
            },
            None => {
                return CallToolResult::error("Missing required parameters");
            }
        };

        let request_id = Uuid::new_v4();
        let source_type = params.source.source_type;
        info!(
            target: "tools",
            tool = "summarize-content",
            request_id = %request_id,
            source_type = %source_type,
            "Summarization requested"
        );

        let prepared = match params.source.prepare(&self.upload_dir) {
            Ok(prepared) => prepared,
            Err(e) => return source_args_error_result("summarize-content", e, source_type),
        };

        let request = SummarizationRequest {
            source: prepared.source.clone(),
            max_length: params.max_length,
            include_metadata: params.include_metadata,
        };

        let result = match self.service.summarize(&request).await {
            Ok(response) => match serde_json::to_string_pretty(&response) {
                Ok(body) => CallToolResult::success(body),
                Err(e) => CallToolResult::error(format!("Failed to serialize summary: {}", e)),
            },
            Err(e) => pipeline_error_result("summarize-content", &e, source_type),
        };

        // Upload lives until the pipeline is done with the file.
        drop(prepared);
        info!(target: "tools", tool = "summarize-content", request_id = %request_id, is_error = result.is_error.unwrap_or(false), "Summarization finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::StubProvider;
    use crate::services::router::test_support::StubFetcher;
    use crate::services::{ContentRouter, PromptBuilder};
    use crate::tools::source::test_support::{error_payload, success_json};
    use crate::utils::pdf::test_support::build_pdf;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

    fn tool(provider: Arc<StubProvider>, upload_dir: PathBuf) -> SummarizeTool {
        let service = SummarizationService::new(
            ContentRouter::new(Arc::new(StubFetcher::page("", None))),
            provider,
            PromptBuilder::new(1024),
            1000,
        );
        SummarizeTool::new(Arc::new(service), upload_dir)
    }

    #[tokio::test]
    async fn summarizes_text_argument() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(StubProvider::replying("Short summary."));
        let result = tool(provider.clone(), dir.path().to_path_buf())
            .execute(Some(json!({
                "sourceType": "text",
                "text": "Quarterly Notes\n\nRevenue rose.",
                "maxLength": 20
            })))
            .await;

        let body = success_json(&result);
        assert_eq!(body["summary"], "Short summary.");
        assert_eq!(body["word_count"], 2);
        assert_eq!(body["title"], "Quarterly Notes");
        assert_eq!(body["metadata"]["source_type"], "text");
        assert!(provider.last_prompt().unwrap().contains("approximately 20 words"));
    }

    #[tokio::test]
    async fn missing_text_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(StubProvider::replying("unused"));
        let result = tool(provider.clone(), dir.path().to_path_buf())
            .execute(Some(json!({"sourceType": "text", "url": "https://example.com"})))
            .await;

        let payload = error_payload(&result);
        assert_eq!(payload["code"], "ERR_VALIDATION");
        assert_eq!(payload["details"]["clientFault"], true);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(Arc::new(StubProvider::failing()), dir.path().to_path_buf())
            .execute(Some(json!({"sourceType": "text", "text": "body"})))
            .await;

        let payload = error_payload(&result);
        assert_eq!(payload["code"], "ERR_PROVIDER");
        assert_eq!(payload["details"]["clientFault"], false);
    }

    #[tokio::test]
    async fn uploaded_pdf_is_summarized_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = build_pdf(&["1. Overview", "Numbers went up."], Some("Upload Test"));
        let provider = Arc::new(StubProvider::replying("Numbers went up."));

        let result = tool(provider, dir.path().to_path_buf())
            .execute(Some(json!({
                "sourceType": "pdf",
                "pdfBase64": BASE64.encode(&pdf),
                "filename": "upload-test.pdf"
            })))
            .await;

        let body = success_json(&result);
        assert_eq!(body["title"], "Upload Test");
        assert_eq!(body["metadata"]["page_count"], 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_arguments_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(Arc::new(StubProvider::replying("x")), dir.path().to_path_buf())
            .execute(None)
            .await;
        assert_eq!(result.is_error, Some(true));
        assert_eq!(result.content[0].text, "Missing required parameters");
    }
}
