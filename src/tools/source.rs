use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{debug, error, warn};

use crate::error::PipelineError;
use crate::mcp::types::CallToolResult;
use crate::models::{ContentSource, SourceType};
use crate::utils::content_guard::build_error_payload;
use crate::utils::upload::{StagedUpload, UploadError};

/// Schema properties shared by every tool that reads content.
pub fn source_schema_properties() -> serde_json::Map<String, Value> {
    let properties = json!({
        "sourceType": {
            "type": "string",
            "enum": ["pdf", "url", "text"],
            "description": "Where the content comes from"
        },
        "text": {
            "type": "string",
            "description": "Raw text content (sourceType=text)"
        },
        "url": {
            "type": "string",
            "description": "Web page or PDF URL (sourceType=url)"
        },
        "filePath": {
            "type": "string",
            "description": "Path to a PDF readable by the server (sourceType=pdf)"
        },
        "pdfBase64": {
            "type": "string",
            "description": "Base64-encoded PDF upload, used instead of filePath (sourceType=pdf)"
        },
        "filename": {
            "type": "string",
            "description": "Original filename of the uploaded PDF"
        }
    });
    match properties {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SourceArgs {
    #[serde(rename = "sourceType")]
    pub source_type: SourceType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(default, rename = "pdfBase64")]
    pub pdf_base64: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// A validated source plus the staged upload backing it, if any.
/// The upload is deleted when this value goes out of scope.
#[derive(Debug)]
pub struct PreparedSource {
    pub source: ContentSource,
    _upload: Option<StagedUpload>,
}

#[derive(Debug)]
pub enum SourceArgsError {
    Invalid(PipelineError),
    Upload(UploadError),
}

impl SourceArgs {
    pub fn prepare(&self, upload_dir: &Path) -> Result<PreparedSource, SourceArgsError> {
        let payload = self
            .pdf_base64
            .as_deref()
            .filter(|payload| !payload.trim().is_empty());

        let Some(payload) = payload else {
            let source = ContentSource::from_fields(
                self.source_type,
                self.file_path.as_deref(),
                self.text.as_deref(),
                self.url.as_deref(),
            )
            .map_err(SourceArgsError::Invalid)?;
            return Ok(PreparedSource {
                source,
                _upload: None,
            });
        };

        if self.source_type != SourceType::Pdf {
            return Err(SourceArgsError::Invalid(PipelineError::validation(
                "Field 'pdfBase64' is only allowed for PDF source type",
            )));
        }
        if self.file_path.as_deref().is_some_and(|p| !p.trim().is_empty()) {
            return Err(SourceArgsError::Invalid(PipelineError::validation(
                "Provide either 'filePath' or 'pdfBase64', not both",
            )));
        }

        let filename = self.filename.as_deref().unwrap_or("upload.pdf");
        let upload = StagedUpload::from_base64(upload_dir, filename, payload)
            .map_err(SourceArgsError::Upload)?;
        debug!(target: "tools", filename = upload.filename(), "Using uploaded PDF");
        let staged_path = upload.path().to_string_lossy().into_owned();
        let source = ContentSource::from_fields(
            SourceType::Pdf,
            Some(&staged_path),
            self.text.as_deref(),
            self.url.as_deref(),
        )
        .map_err(SourceArgsError::Invalid)?;

        Ok(PreparedSource {
            source,
            _upload: Some(upload),
        })
    }
}

/// Renders a pipeline failure as a tool error carrying the standard payload.
pub fn pipeline_error_result(tool: &str, err: &PipelineError, source_type: SourceType) -> CallToolResult {
    if err.is_client_fault() {
        warn!(target: "tools", tool = tool, source_type = %source_type, code = err.code(), "{}", err);
    } else {
        error!(target: "tools", tool = tool, source_type = %source_type, code = err.code(), "{}", err);
    }
    CallToolResult::error(build_error_payload(
        err.code(),
        &err.to_string(),
        json!({
            "sourceType": source_type,
            "clientFault": err.is_client_fault(),
        }),
    ))
}

pub fn source_args_error_result(tool: &str, err: SourceArgsError, source_type: SourceType) -> CallToolResult {
    match err {
        SourceArgsError::Invalid(e) => pipeline_error_result(tool, &e, source_type),
        SourceArgsError::Upload(e) => {
            warn!(target: "tools", tool = tool, "Rejected upload: {}", e);
            CallToolResult::error(build_error_payload(
                "ERR_UPLOAD",
                &e.to_string(),
                json!({
                    "sourceType": source_type,
                    "hint": "Send the PDF as standard base64 in 'pdfBase64'.",
                }),
            ))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::mcp::types::CallToolResult;
    use serde_json::Value;

    /// Parses the JSON line of an error payload.
    pub fn error_payload(result: &CallToolResult) -> Value {
        assert_eq!(result.is_error, Some(true), "expected an error result");
        let text = &result.content[0].text;
        let line = text
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('{'))
            .expect("payload line");
        serde_json::from_str(line).expect("payload json")
    }

    pub fn success_json(result: &CallToolResult) -> Value {
        assert!(result.is_error.is_none(), "unexpected error: {}", result.content[0].text);
        serde_json::from_str(&result.content[0].text).expect("result json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> SourceArgs {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn plain_sources_skip_staging() {
        let dir = tempfile::tempdir().unwrap();
        let prepared = args(json!({"sourceType": "text", "text": "hello"}))
            .prepare(dir.path())
            .unwrap();
        assert_eq!(
            prepared.source,
            ContentSource::Text {
                text: "hello".to_string()
            }
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn upload_is_removed_with_prepared_source() {
        let dir = tempfile::tempdir().unwrap();
        let prepared = args(json!({
            "sourceType": "pdf",
            "pdfBase64": "JVBERi0xLjQK",
            "filename": "../../report.pdf"
        }))
        .prepare(dir.path())
        .unwrap();

        match &prepared.source {
            ContentSource::Pdf { file_path } => {
                assert!(file_path.starts_with(dir.path()));
                assert!(file_path.ends_with("report.pdf"));
                assert!(file_path.exists());
            }
            other => panic!("expected pdf source, got {:?}", other),
        }
        drop(prepared);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn upload_conflicts_are_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = args(json!({"sourceType": "text", "text": "x", "pdfBase64": "JVBERi0xLjQK"}))
            .prepare(dir.path())
            .unwrap_err();
        assert!(matches!(err, SourceArgsError::Invalid(PipelineError::Validation(_))));

        let err = args(json!({"sourceType": "pdf", "filePath": "/tmp/a.pdf", "pdfBase64": "JVBERi0xLjQK"}))
            .prepare(dir.path())
            .unwrap_err();
        assert!(matches!(err, SourceArgsError::Invalid(PipelineError::Validation(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn bad_base64_reports_upload_code() {
        let dir = tempfile::tempdir().unwrap();
        let err = args(json!({"sourceType": "pdf", "pdfBase64": "not base64!!"}))
            .prepare(dir.path())
            .unwrap_err();
        let result = source_args_error_result("summarize-content", err, SourceType::Pdf);
        assert_eq!(test_support::error_payload(&result)["code"], "ERR_UPLOAD");
    }
}
