use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::models::{ContentSource, Document, PdfMetadata, SourceType};
use crate::utils::pdf::{assemble, PdfParser};
use crate::utils::text_clean::{clean_text, text_metadata};
use crate::utils::web_fetch::WebFetcher;

/// What is known about resolved content besides its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextDescriptor {
    Pdf {
        filename: String,
        page_count: usize,
        word_count: usize,
        title: Option<String>,
        author: Option<String>,
        /// Titles of header-started sections, in document order.
        sections: Vec<String>,
    },
    Text {
        word_count: usize,
        title: Option<String>,
    },
    Url {
        url: String,
        word_count: usize,
        title: Option<String>,
    },
}

impl ContextDescriptor {
    pub fn source_type(&self) -> SourceType {
        match self {
            ContextDescriptor::Pdf { .. } => SourceType::Pdf,
            ContextDescriptor::Text { .. } => SourceType::Text,
            ContextDescriptor::Url { .. } => SourceType::Url,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            ContextDescriptor::Pdf { title, .. }
            | ContextDescriptor::Text { title, .. }
            | ContextDescriptor::Url { title, .. } => title.as_deref(),
        }
    }

    /// One-line description attached to extraction responses.
    pub fn describe(&self) -> String {
        let base = match self {
            ContextDescriptor::Pdf {
                filename,
                page_count,
                ..
            } => format!("PDF Document: {}, Pages: {}", filename, page_count),
            ContextDescriptor::Text { word_count, .. } => {
                format!("Text document, Words: {}", word_count)
            }
            ContextDescriptor::Url { url, .. } => format!("Scraped from URL: {}", url),
        };

        match self.title() {
            Some(title) if !title.is_empty() => format!("{}, Title: {}", base, title),
            _ => base,
        }
    }

    /// Ordered metadata fields used by the summarize prompt and, optionally,
    /// returned with the summary. Absent values are omitted.
    pub fn metadata_fields(&self) -> Vec<(&'static str, Value)> {
        let mut fields: Vec<(&'static str, Value)> = Vec::new();

        match self {
            ContextDescriptor::Pdf {
                page_count,
                word_count,
                title,
                author,
                sections,
                ..
            } => {
                push_opt(&mut fields, "title", title);
                push_opt(&mut fields, "author", author);
                fields.push(("page_count", Value::from(*page_count)));
                fields.push(("word_count", Value::from(*word_count)));
                if !sections.is_empty() {
                    fields.push(("sections", Value::from(sections.join(", "))));
                }
            }
            ContextDescriptor::Text { word_count, title } => {
                push_opt(&mut fields, "title", title);
                fields.push(("word_count", Value::from(*word_count)));
            }
            ContextDescriptor::Url {
                url,
                word_count,
                title,
            } => {
                push_opt(&mut fields, "title", title);
                fields.push(("url", Value::from(url.as_str())));
                fields.push(("word_count", Value::from(*word_count)));
            }
        }

        fields.push(("source_type", Value::from(self.source_type().as_str())));
        fields
    }

    pub fn metadata_map(&self) -> Map<String, Value> {
        self.metadata_fields()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }
}

/// Text to hand to the model plus its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub content: String,
    pub context: ContextDescriptor,
}

/// Turns a validated source into cleaned content, one path per source kind.
#[derive(Clone)]
pub struct ContentRouter {
    pdf_parser: PdfParser,
    fetcher: Arc<dyn WebFetcher>,
}

impl ContentRouter {
    pub fn new(fetcher: Arc<dyn WebFetcher>) -> Self {
        Self {
            pdf_parser: PdfParser::new(),
            fetcher,
        }
    }

    pub async fn resolve(&self, source: &ContentSource) -> Result<ResolvedContent, PipelineError> {
        match source {
            ContentSource::Pdf { file_path } => self.resolve_pdf(file_path).await,
            ContentSource::Text { text } => Ok(resolve_text(text)),
            ContentSource::Url { url } => self.resolve_url(url).await,
        }
    }

    async fn resolve_pdf(&self, file_path: &Path) -> Result<ResolvedContent, PipelineError> {
        let filename = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| PipelineError::validation("File path is required for PDF source type"))?;

        if !file_path.is_file() {
            warn!(target: "router", path = %file_path.display(), "PDF path is not a readable file");
        }

        let parser = self.pdf_parser;
        let path = file_path.to_path_buf();
        let name = filename.clone();
        let document = parse_on_blocking_pool(&filename, move || parser.parse_file(&path, &name)).await;

        info!(
            target: "router",
            filename = %filename,
            pages = document.metadata.page_count,
            words = document.metadata.word_count,
            sections = document.sections.len(),
            "Resolved PDF source"
        );
        for (index, section) in document.sections.iter().enumerate() {
            debug!(
                target: "router",
                section = %section.label(index + 1),
                page = section.page_number,
                level = section.level,
                "Detected section"
            );
        }

        let context = ContextDescriptor::Pdf {
            filename,
            page_count: document.metadata.page_count,
            word_count: document.metadata.word_count,
            sections: document
                .section_titles()
                .into_iter()
                .map(str::to_string)
                .collect(),
            title: document.metadata.title,
            author: document.metadata.author,
        };

        Ok(ResolvedContent {
            content: document.raw_text,
            context,
        })
    }

    async fn resolve_url(&self, url: &str) -> Result<ResolvedContent, PipelineError> {
        let page = self
            .fetcher
            .fetch_and_extract(url)
            .await
            .map_err(|source| {
                warn!(target: "router", url = url, code = source.code(), "Web fetch failed: {}", source);
                PipelineError::SourceAccess {
                    source_type: SourceType::Url,
                    source,
                }
            })?;

        info!(target: "router", url = url, words = page.word_count, "Resolved URL source");

        Ok(ResolvedContent {
            context: ContextDescriptor::Url {
                url: url.to_string(),
                word_count: page.word_count,
                title: page.title,
            },
            content: page.content,
        })
    }
}

/// Runs a PDF parse job on the blocking pool. A job that dies (panic or
/// cancellation) degrades to an empty document like any other parse failure.
async fn parse_on_blocking_pool<F>(filename: &str, job: F) -> Document
where
    F: FnOnce() -> Document + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(document) => document,
        Err(e) => {
            error!(target: "router", filename = %filename, "PDF parsing task failed: {}", e);
            assemble(filename, &[], PdfMetadata::default())
        }
    }
}

fn push_opt(fields: &mut Vec<(&'static str, Value)>, key: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        fields.push((key, Value::from(value.as_str())));
    }
}

fn resolve_text(text: &str) -> ResolvedContent {
    let content = clean_text(text);
    let metadata = text_metadata(&content);
    ResolvedContent {
        context: ContextDescriptor::Text {
            word_count: metadata.word_count,
            title: metadata.title,
        },
        content,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::FetchError;
    use crate::utils::web_fetch::{WebContent, WebFetcher};

    /// Serves a canned page or error and counts calls.
    pub struct StubFetcher {
        pub result: Result<WebContent, FetchError>,
        pub calls: AtomicUsize,
    }

    impl StubFetcher {
        pub fn page(content: &str, title: Option<&str>) -> Self {
            Self {
                result: Ok(WebContent {
                    content: content.to_string(),
                    title: title.map(str::to_string),
                    word_count: content.split_whitespace().count(),
                }),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(error: FetchError) -> Self {
            Self {
                result: Err(error),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WebFetcher for StubFetcher {
        async fn fetch_and_extract(&self, _url: &str) -> Result<WebContent, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }
}
