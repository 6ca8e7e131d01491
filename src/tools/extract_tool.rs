use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::source::{pipeline_error_result, source_args_error_result, source_schema_properties, SourceArgs};
use crate::mcp::types::{CallToolResult, ToolAnnotations, ToolDefinition};
use crate::models::{ExtractionKind, ExtractionRequest, ExtractionTask};
use crate::services::ExtractionService;

pub static EXTRACT_TOOL_DEFINITION: Lazy<ToolDefinition> = Lazy::new(|| {
    let mut properties = source_schema_properties();
    properties.insert(
        "extractionType".to_string(),
        json!({
            "type": "string",
            "enum": ["key_points", "entities", "custom"],
            "description": "Kind of structured data to extract"
        }),
    );
    properties.insert(
        "customInstructions".to_string(),
        json!({
            "type": "string",
            "description": "What to extract; required when extractionType is custom"
        }),
    );
    properties.insert(
        "includeContext".to_string(),
        json!({
            "type": "boolean",
            "description": "Whether to describe the source in the result (default: false)",
            "default": false
        }),
    );

    ToolDefinition {
        name: "extract-content".to_string(),
        description: "Extract key points, named entities or custom fields from a PDF, web page or text as JSON"
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": ["sourceType", "extractionType"]
        }),
        annotations: Some(ToolAnnotations {
            title: Some("Extract Structured Content".to_string()),
            read_only_hint: Some(true),
            open_world_hint: Some(true),
        }),
    }
});

#[derive(Debug, Deserialize)]
struct ExtractParams {
    #[serde(flatten)]
    source: SourceArgs,
    #[serde(rename = "extractionType")]
    extraction_type: ExtractionKind,
    #[serde(default, rename = "customInstructions")]
    custom_instructions: Option<String>,
    #[serde(default, rename = "includeContext")]
    include_context: bool,
}

pub struct ExtractTool {
    service: Arc<ExtractionService>,
    upload_dir: PathBuf,
}

impl ExtractTool {
    pub fn new(service: Arc<ExtractionService>, upload_dir: PathBuf) -> Self {
        Self {
            service,
            upload_dir,
        }
    }

    pub async fn execute(&self, arguments: Option<Value>) -> CallToolResult {
        let params = match arguments {
            Some(args) => match serde_json::from_value::<ExtractParams>(args) {
                Ok(params) => params,
                Err(e) => {
                    error!("Invalid extract parameters: {}", e);
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
            tool = "extract-content",
            request_id = %request_id,
            source_type = %source_type,
            kind = %params.extraction_type,
            "Extraction requested"
        );

        // Checked before touching the source so a bad task never stages an upload.
        let task = match ExtractionTask::new(params.extraction_type, params.custom_instructions.as_deref()) {
            Ok(task) => task,
            Err(e) => return pipeline_error_result("extract-content", &e, source_type),
        };

        let prepared = match params.source.prepare(&self.upload_dir) {
            Ok(prepared) => prepared,
            Err(e) => return source_args_error_result("extract-content", e, source_type),
        };

        let request = ExtractionRequest {
            source: prepared.source.clone(),
            task,
            include_context: params.include_context,
        };

        let result = match self.service.extract(&request).await {
            Ok(response) => match serde_json::to_string_pretty(&response) {
                Ok(body) => CallToolResult::success(body),
                Err(e) => CallToolResult::error(format!("Failed to serialize extraction: {}", e)),
            },
            Err(e) => pipeline_error_result("extract-content", &e, source_type),
        };

        drop(prepared);
        info!(target: "tools", tool = "extract-content", request_id = %request_id, is_error = result.is_error.unwrap_or(false), "Extraction finished");
        result
    }
}
