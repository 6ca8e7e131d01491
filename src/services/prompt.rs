use serde_json::Value;

use super::router::ContextDescriptor;
use crate::models::ExtractionTask;

const SUMMARY_GUIDELINES: &str = "Please provide a summary that:
1. Captures the main ideas and key points
2. Preserves important details and facts
3. Maintains a logical flow
4. Uses objective language
5. Is concise but comprehensive";

const JSON_ONLY_RULES: &str = "IMPORTANT: Your response must be a valid JSON object only, with NO explanatory text before or after.
Do NOT include markdown code block syntax (```json) or any other formatting. THIS IS IMPORTANT.
Do NOT use newlines or pretty-printing in your JSON - format it as a compact, single-line JSON object.
Just return the raw JSON object without any whitespace between properties.";

const KEY_POINTS_TASK: &str = "Extract the most important key points from the following text.
Format your response as a JSON array of key-value pairs, where the key is the point name or category,
and the value is the specific information.

For each key point:
1. Identify the category or type of information
2. Extract the specific detail, fact, or statistic
3. Ensure accuracy and preserve the original meaning";

const KEY_POINTS_EXAMPLE: &str =
    r#"{"key_points":[{"key":"Market Share","value":"Increased from 24% to 28% year-over-year"}]}"#;

const ENTITIES_TASK: &str = "Extract named entities from the following text.
Format your response as a JSON array of entities, where each entity has a name, type, and list of mentions.

Entity types to identify:
- Person (individuals mentioned by name)
- Organization (companies, agencies, institutions)
- Location (countries, cities, geographic locations)
- Product (products, services, brands)
- Event (specific events or occurrences)
- Date (specific dates or time periods)";

const ENTITIES_EXAMPLE: &str = r#"{"entities":[{"name":"Microsoft","type":"Organization","mentions":["Microsoft","MSFT","the company"]}]}"#;

const CUSTOM_EXAMPLE: &str = r#"{"data":{"key1":"value1","key2":"value2","items":[{"id":1,"name":"Item 1"},{"id":2,"name":"Item 2"}]}}"#;

/// Builds the prompts sent to the model. Pure: the same inputs always give
/// the same text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    max_tokens: u32,
}

/// "page_count" -> "Page Count"
fn field_label(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Empty strings, zero counts and nulls carry no information for the model.
fn field_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

impl PromptBuilder {
    pub fn new(max_tokens: u32) -> Self {
        Self { max_tokens }
    }

    fn token_limit(&self, overflow: &str, priority: &str) -> String {
        format!(
            "TOKEN LIMIT: Your response MUST be under {} tokens. If you have too {}, prioritize {} and limit the total to stay under this token limit.",
            self.max_tokens, overflow, priority
        )
    }

    pub fn summarize(&self, content: &str, context: &ContextDescriptor, max_length: usize) -> String {
        let mut prompt = format!(
            "Please summarize the following {} content",
            context.source_type()
        );
        if let Some(title) = context.title().filter(|t| !t.is_empty()) {
            prompt.push_str(&format!(" titled '{}'", title));
        }
        prompt.push_str(&format!(" in approximately {} words.\n\n", max_length));

        prompt.push_str("Content Information:\n");
        for (key, value) in context.metadata_fields() {
            if let Some(value) = field_value(&value) {
                prompt.push_str(&format!("- {}: {}\n", field_label(key), value));
            }
        }

        prompt.push_str(&format!(
            "\n{}\n\nContent to summarize:\n{}",
            SUMMARY_GUIDELINES, content
        ));
        prompt
    }

    pub fn key_points(&self, content: &str) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\nFormat your response like this (but without any newlines):\n{}\n\nThe text to analyze:\n{}",
            KEY_POINTS_TASK,
            JSON_ONLY_RULES,
            self.token_limit("many key points", "the most important ones"),
            KEY_POINTS_EXAMPLE,
            content
        )
    }

    pub fn entities(&self, content: &str) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\nFormat your response like this (but without any newlines):\n{}\n\nThe text to analyze:\n{}",
            ENTITIES_TASK,
            JSON_ONLY_RULES,
            self.token_limit("many entities", "the most important ones"),
            ENTITIES_EXAMPLE,
            content
        )
    }

    pub fn custom(&self, content: &str, instructions: &str) -> String {
        format!(
            "You are an expert AI trained to extract specific information from text based on custom instructions.\n\
             Your task is to extract information according to the following instructions:\n\n\
             {}\n\n{}\n\n{}\n\n\
             Example of correct format (but with your extracted content):\n{}\n\n\
             Ensure all extracted information is accurate and directly supported by the text.\n\n\
             The text to analyze:\n{}",
            instructions,
            JSON_ONLY_RULES,
            self.token_limit(
                "much information",
                "what is most important relative to the instructions"
            ),
            CUSTOM_EXAMPLE,
            content
        )
    }

    pub fn extraction(&self, task: &ExtractionTask, content: &str) -> String {
        match task {
            ExtractionTask::KeyPoints => self.key_points(content),
            ExtractionTask::Entities => self.entities(content),
            ExtractionTask::Custom { instructions } => self.custom(content, instructions),
        }
    }
}
