use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::request::{ExtractionKind, SourceType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub mentions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub success: bool,
    pub extraction_type: ExtractionKind,
    pub source_type: SourceType,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub key_value_pairs: Vec<KeyValuePair>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ExtractionResponse {
    /// An empty successful response; callers fill in the populated shape.
    pub fn succeeded(extraction_type: ExtractionKind, source_type: SourceType) -> Self {
        Self {
            success: true,
            extraction_type,
            source_type,
            data: Map::new(),
            key_value_pairs: Vec::new(),
            entities: Vec::new(),
            context: None,
        }
    }

    pub fn failed(
        extraction_type: ExtractionKind,
        source_type: SourceType,
        context: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            context: Some(context.into()),
            ..Self::succeeded(extraction_type, source_type)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizationResponse {
    pub summary: String,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}
