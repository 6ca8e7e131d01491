use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Document-level metadata read from a PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub keywords: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub word_count: usize,
}

/// A contiguous run of lines that starts at a detected header, or the whole
/// document when no header was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Header text; `None` for the single untitled section of a headerless document.
    pub title: Option<String>,
    pub content: String,
    /// Zero-based page holding the section's first line.
    pub page_number: usize,
    /// 1 when the section starts at a header, 0 otherwise.
    pub level: u8,
}

impl Section {
    /// Display label: the header text, or "Section N" for the 1-based `ordinal`.
    pub fn label(&self, ordinal: usize) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => title.clone(),
            _ => format!("Section {}", ordinal),
        }
    }
}

/// Parsed PDF: cleaned text plus structure. Built once per request and dropped
/// after routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    pub metadata: PdfMetadata,
    pub sections: Vec<Section>,
    pub raw_text: String,
}

impl Document {
    /// Titles of header-started sections, in document order.
    pub fn section_titles(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter_map(|section| section.title.as_deref())
            .filter(|title| !title.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untitled_section_gets_positional_label() {
        let section = Section {
            title: None,
            content: String::new(),
            page_number: 0,
            level: 0,
        };
        assert_eq!(section.label(1), "Section 1");

        let titled = Section {
            title: Some("1. Introduction".to_string()),
            ..section
        };
        assert_eq!(titled.label(3), "1. Introduction");
    }
}
