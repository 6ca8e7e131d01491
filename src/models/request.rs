use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::PipelineError;

/// Where the content of a request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Url,
    Text,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Pdf => "pdf",
            SourceType::Url => "url",
            SourceType::Text => "text",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which structured extraction to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionKind {
    KeyPoints,
    Entities,
    Custom,
}

impl ExtractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionKind::KeyPoints => "key_points",
            ExtractionKind::Entities => "entities",
            ExtractionKind::Custom => "custom",
        }
    }
}

impl fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated content source: exactly one of path, text or URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Pdf { file_path: PathBuf },
    Text { text: String },
    Url { url: String },
}

fn populated(field: Option<&str>) -> Option<&str> {
    field.filter(|value| !value.trim().is_empty())
}

impl ContentSource {
    /// Builds a source from loosely-typed request fields.
    ///
    /// The field matching `source_type` must be non-empty and the other two
    /// must be absent or empty.
    pub fn from_fields(
        source_type: SourceType,
        file_path: Option<&str>,
        text: Option<&str>,
        url: Option<&str>,
    ) -> Result<Self, PipelineError> {
        let (file_path, text, url) = (populated(file_path), populated(text), populated(url));

        let source = match source_type {
            SourceType::Pdf => file_path
                .map(|path| ContentSource::Pdf {
                    file_path: PathBuf::from(path),
                })
                .ok_or_else(|| {
                    PipelineError::validation("File path is required for PDF source type")
                })?,
            SourceType::Text => text
                .map(|text| ContentSource::Text {
                    text: text.to_string(),
                })
                .ok_or_else(|| PipelineError::validation("Text is required for TEXT source type"))?,
            SourceType::Url => url
                .map(|url| ContentSource::Url {
                    url: url.to_string(),
                })
                .ok_or_else(|| PipelineError::validation("URL is required for URL source type"))?,
        };

        let extra = [
            (SourceType::Pdf, file_path.is_some(), "file path"),
            (SourceType::Text, text.is_some(), "text"),
            (SourceType::Url, url.is_some(), "url"),
        ]
        .into_iter()
        .find(|(kind, present, _)| *present && *kind != source_type);

        if let Some((_, _, field)) = extra {
            return Err(PipelineError::validation(format!(
                "Field '{}' is not allowed for {} source type",
                field,
                source_type.as_str().to_uppercase()
            )));
        }

        Ok(source)
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            ContentSource::Pdf { .. } => SourceType::Pdf,
            ContentSource::Text { .. } => SourceType::Text,
            ContentSource::Url { .. } => SourceType::Url,
        }
    }
}

/// Extraction task; custom extraction always carries its instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionTask {
    KeyPoints,
    Entities,
    Custom { instructions: String },
}

impl ExtractionTask {
    pub fn new(kind: ExtractionKind, custom_instructions: Option<&str>) -> Result<Self, PipelineError> {
        match kind {
            ExtractionKind::KeyPoints => Ok(ExtractionTask::KeyPoints),
            ExtractionKind::Entities => Ok(ExtractionTask::Entities),
            ExtractionKind::Custom => populated(custom_instructions)
                .map(|instructions| ExtractionTask::Custom {
                    instructions: instructions.to_string(),
                })
                .ok_or_else(|| {
                    PipelineError::validation(
                        "Custom instructions are required for custom extraction",
                    )
                }),
        }
    }

    pub fn kind(&self) -> ExtractionKind {
        match self {
            ExtractionTask::KeyPoints => ExtractionKind::KeyPoints,
            ExtractionTask::Entities => ExtractionKind::Entities,
            ExtractionTask::Custom { .. } => ExtractionKind::Custom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub source: ContentSource,
    pub task: ExtractionTask,
    pub include_context: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizationRequest {
    pub source: ContentSource,
    /// Target summary length in words; falls back to the configured default.
    pub max_length: Option<usize>,
    pub include_metadata: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_requires_matching_field() {
        let err = ContentSource::from_fields(SourceType::Url, None, Some("body"), None)
            .expect_err("url missing");
        assert!(matches!(err, PipelineError::Validation(_)));

        let err = ContentSource::from_fields(SourceType::Pdf, Some("   "), None, None)
            .expect_err("blank path");
        assert!(err.to_string().contains("File path is required"));
    }

    #[test]
    fn source_rejects_extra_fields() {
        let err = ContentSource::from_fields(
            SourceType::Text,
            None,
            Some("body"),
            Some("https://example.com"),
        )
        .expect_err("extra url");
        assert!(err.to_string().contains("'url' is not allowed for TEXT"));
    }

    #[test]
    fn source_accepts_single_field() {
        let source = ContentSource::from_fields(SourceType::Pdf, Some("/tmp/a.pdf"), None, Some(""))
            .expect("valid pdf source");
        assert_eq!(
            source,
            ContentSource::Pdf {
                file_path: PathBuf::from("/tmp/a.pdf")
            }
        );
        assert_eq!(source.source_type(), SourceType::Pdf);
    }

    #[test]
    fn custom_task_requires_instructions() {
        let err = ExtractionTask::new(ExtractionKind::Custom, None).expect_err("no instructions");
        assert!(matches!(err, PipelineError::Validation(_)));

        let task = ExtractionTask::new(ExtractionKind::Custom, Some("List all dates"))
            .expect("valid custom task");
        assert_eq!(task.kind(), ExtractionKind::Custom);
    }

    #[test]
    fn kinds_serialize_as_wire_names() {
        assert_eq!(
            serde_json::to_value(ExtractionKind::KeyPoints).unwrap(),
            serde_json::json!("key_points")
        );
        assert_eq!(
            serde_json::from_value::<SourceType>(serde_json::json!("pdf")).unwrap(),
            SourceType::Pdf
        );
    }
}
