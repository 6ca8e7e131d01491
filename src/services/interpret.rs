// Turns raw model replies into typed extraction results. Replies that are not
// valid JSON fall back to a default structure instead of failing the request.
// Valid JSON of the wrong shape is a MappingError.

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::models::{Entity, ExtractionKind, KeyValuePair};

/// Parsed reply, or the default that replaced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpreted {
    pub value: Value,
    pub fallback_used: bool,
}

/// Default structure used when a reply for `kind` cannot be parsed.
pub fn default_structure(kind: ExtractionKind, raw: &str) -> Value {
    match kind {
        ExtractionKind::KeyPoints => json!({ "key_points": [] }),
        ExtractionKind::Entities => json!({ "entities": [] }),
        ExtractionKind::Custom => json!({ "data": raw }),
    }
}

/// Strict JSON parse of the whole reply. No fence stripping or repair.
pub fn parse_json_response(raw: &str, default: Value) -> Interpreted {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => Interpreted {
            value,
            fallback_used: false,
        },
        Err(e) => {
            warn!(target: "interpret", error = %e, len = raw.len(), "No valid JSON structure found in response");
            Interpreted {
                value: default,
                fallback_used: true,
            }
        }
    }
}

/// Missing or null fields read as "", other scalars as their JSON text.
fn string_field(item: &Map<String, Value>, key: &str) -> String {
    match item.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// A parsed reply whose shape does not fit the requested extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("field '{field}' must be an array, got {found}")]
    FieldNotArray { field: &'static str, found: &'static str },
    #[error("item {index} of '{field}' must be an object, got {found}")]
    ItemNotObject {
        field: &'static str,
        index: usize,
        found: &'static str,
    },
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Object items of `value[field]`. A missing or null field is empty.
fn object_items<'a>(
    value: &'a Value,
    field: &'static str,
) -> Result<Vec<&'a Map<String, Value>>, MappingError> {
    let object = value
        .as_object()
        .ok_or(MappingError::NotAnObject(json_kind(value)))?;

    let items = match object.get(field) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(MappingError::FieldNotArray {
                field,
                found: json_kind(other),
            })
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_object().ok_or(MappingError::ItemNotObject {
                field,
                index,
                found: json_kind(item),
            })
        })
        .collect()
}

pub fn map_key_points(value: &Value) -> Result<Vec<KeyValuePair>, MappingError> {
    Ok(object_items(value, "key_points")?
        .into_iter()
        .map(|point| KeyValuePair {
            key: string_field(point, "key"),
            value: string_field(point, "value"),
        })
        .collect())
}

pub fn map_entities(value: &Value) -> Result<Vec<Entity>, MappingError> {
    Ok(object_items(value, "entities")?
        .into_iter()
        .map(|entity| Entity {
            name: string_field(entity, "name"),
            entity_type: string_field(entity, "type"),
            mentions: entity
                .get("mentions")
                .and_then(Value::as_array)
                .map(|mentions| {
                    mentions
                        .iter()
                        .map(|mention| match mention {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect())
}

/// Custom extraction keeps the parsed object as-is; any other JSON value is
/// wrapped under "data".
pub fn map_custom(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    }
}
