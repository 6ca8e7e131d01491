// PDF structural parsing: per-page text, line-to-page index, metadata and
// heuristic sections. Parsing never fails; a broken file yields an empty
// document with whatever metadata could still be read.

use lopdf::{Dictionary, Object};
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, error, warn};

use crate::models::{Document, PdfMetadata, Section};
use crate::utils::text_clean::{clean_pdf_text, word_count};

/// Returns true if given content-type or head indicates a PDF file.
/// - Content-Type: application/pdf (case-insensitive, substring match)
/// - Magic bytes: %PDF-
pub fn is_pdf(content_type: Option<&str>, head: &[u8]) -> bool {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    ct.contains("application/pdf") || head.starts_with(b"%PDF-")
}

/// Extracts the text of every page, in page order.
///
/// pdf-extract panics on some malformed files, so the panic is caught and
/// reported like any other extraction error.
pub fn extract_page_texts(bytes: &[u8]) -> Result<Vec<String>, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(format!("failed to extract text from PDF bytes: {}", e)),
        Err(payload) => Err(format!("PDF text extraction panicked: {}", panic_reason(&*payload))),
    }
}

/// Message carried by a caught panic, when it has one.
pub fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Maps each zero-based line of the concatenated page text to the zero-based
/// page it came from. Page values never decrease as the line index grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinePageIndex {
    pages: Vec<usize>,
}

impl LinePageIndex {
    pub fn page_of(&self, line: usize) -> Option<usize> {
        self.pages.get(line).copied()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Page of the last extracted line.
    pub fn last_page(&self) -> Option<usize> {
        self.pages.last().copied()
    }
}

/// Joins page texts line by line and records which page produced each line.
///
/// Lines are split on `\n`, so the returned text has exactly `index.len()`
/// lines whenever at least one page exists.
pub fn index_pages(pages: &[String]) -> (String, LinePageIndex) {
    let mut lines: Vec<&str> = Vec::new();
    let mut index = LinePageIndex::default();

    for (page_number, page_text) in pages.iter().enumerate() {
        for line in page_text.split('\n') {
            lines.push(line);
            index.pages.push(page_number);
        }
    }

    (lines.join("\n"), index)
}

/// Structural pattern that made a line a header candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// "Chapter 3: Results", "SECTION 2. Scope"
    Chapter,
    /// "1.1 Background"
    Outline,
    /// "1. Introduction"
    Numbered,
    /// "EXECUTIVE SUMMARY"
    AllCaps,
    /// "IV. Discussion"
    Roman,
}

// Order matters: the first matching pattern wins.
static HEADER_PATTERNS: Lazy<Vec<(HeaderKind, Regex)>> = Lazy::new(|| {
    [
        (
            HeaderKind::Chapter,
            r"^(?:CHAPTER|Chapter|SECTION|Section)\s+\d+[.:]\s*(.+)$",
        ),
        (HeaderKind::Outline, r"^\d+\.\d+\s+(.+)$"),
        (HeaderKind::Numbered, r"^\d+\.\s+(.+)$"),
        (HeaderKind::AllCaps, r"^[A-Z][A-Z\s]+[A-Z]$"),
        (HeaderKind::Roman, r"^[IVX]+\.\s+(.+)$"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("valid header pattern")))
    .collect()
});

/// Classifies a single line as a header candidate.
pub fn detect_header(line: &str) -> Option<HeaderKind> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    HEADER_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(line))
        .map(|(kind, _)| *kind)
}

/// Inclusive line range of one section and the header that opened it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBoundary {
    pub start: usize,
    pub end: usize,
    pub header: Option<String>,
}

/// Splits text into sections at header candidates.
///
/// Section i spans from header i up to the line before header i+1; the last
/// one runs to the end. Without headers the whole text is one untitled section.
pub fn section_boundaries(text: &str) -> Vec<SectionBoundary> {
    let lines: Vec<&str> = text.split('\n').collect();
    let last_line = lines.len() - 1;

    let starts: Vec<(usize, &str)> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| detect_header(line).is_some())
        .map(|(i, line)| (i, line.trim()))
        .collect();

    if starts.is_empty() {
        return vec![SectionBoundary {
            start: 0,
            end: last_line,
            header: None,
        }];
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, (start, header))| SectionBoundary {
            start: *start,
            end: starts.get(i + 1).map(|(next, _)| next - 1).unwrap_or(last_line),
            header: Some(header.to_string()),
        })
        .collect()
}

/// Builds cleaned sections with page numbers from uncleaned text.
pub fn identify_sections(text: &str, index: &LinePageIndex) -> Vec<Section> {
    let lines: Vec<&str> = text.split('\n').collect();

    section_boundaries(text)
        .into_iter()
        .map(|boundary| {
            let content = lines[boundary.start..=boundary.end].join("\n");
            let level = u8::from(boundary.header.is_some());
            Section {
                title: boundary.header,
                content: clean_pdf_text(&content),
                page_number: index.page_of(boundary.start).unwrap_or(0),
                level,
            }
        })
        .collect()
}

/// Decodes a PDF text string: UTF-16BE when it carries a BOM, otherwise
/// PDFDocEncoding, which matches Windows-1252 for printable text.
fn decode_pdf_string(bytes: &[u8]) -> String {
    let decoded = if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        encoding_rs::UTF_16BE.decode_without_bom_handling(rest).0
    } else {
        encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes).0
    };
    decoded.trim_matches(char::from(0)).trim().to_string()
}

fn info_string(info: &Dictionary, key: &[u8]) -> Option<String> {
    let value = match info.get(key).ok()? {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
        _ => return None,
    };
    Some(value).filter(|value| !value.is_empty())
}

/// Reads the Info dictionary and page count. `word_count` is left at 0.
pub fn read_metadata(bytes: &[u8]) -> Result<PdfMetadata, lopdf::Error> {
    let doc = lopdf::Document::load_mem(bytes)?;

    let mut metadata = PdfMetadata {
        page_count: doc.get_pages().len(),
        ..PdfMetadata::default()
    };

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    if let Some(info) = info {
        metadata.title = info_string(info, b"Title");
        metadata.author = info_string(info, b"Author");
        metadata.subject = info_string(info, b"Subject");
        metadata.keywords = info_string(info, b"Keywords")
            .map(|keywords| {
                keywords
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect::<BTreeSet<_>>()
            })
            .unwrap_or_default();
        metadata.creation_date = info_string(info, b"CreationDate");
        metadata.modification_date = info_string(info, b"ModDate");
    }

    Ok(metadata)
}

/// Stateless PDF parser. Safe to share across concurrent requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses a PDF on disk. An unreadable file yields an empty document.
    pub fn parse_file(&self, path: &Path, filename: &str) -> Document {
        match std::fs::read(path) {
            Ok(bytes) => self.parse_bytes(&bytes, filename),
            Err(e) => {
                error!(target: "pdf", path = %path.display(), "Failed to read PDF file: {}", e);
                assemble(filename, &[], PdfMetadata::default())
            }
        }
    }

    /// Parses PDF bytes into a [`Document`], degrading instead of failing.
    pub fn parse_bytes(&self, bytes: &[u8], filename: &str) -> Document {
        let pages = extract_page_texts(bytes).unwrap_or_else(|e| {
            error!(target: "pdf", filename = filename, "Error extracting text with page tracking: {}", e);
            Vec::new()
        });

        // lopdf can panic on corrupt object streams as well
        let mut metadata = match panic::catch_unwind(AssertUnwindSafe(|| read_metadata(bytes))) {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(e)) => {
                error!(target: "pdf", filename = filename, "Error extracting PDF metadata: {}", e);
                PdfMetadata::default()
            }
            Err(payload) => {
                error!(target: "pdf", filename = filename, "PDF metadata extraction panicked: {}", panic_reason(&*payload));
                PdfMetadata::default()
            }
        };

        if metadata.page_count == 0 && !pages.is_empty() {
            warn!(target: "pdf", filename = filename, pages = pages.len(), "Page tree unreadable; using extracted page count");
            metadata.page_count = pages.len();
        }

        assemble(filename, &pages, metadata)
    }
}

/// Builds the document model from extracted page texts and metadata.
pub fn assemble(filename: &str, pages: &[String], mut metadata: PdfMetadata) -> Document {
    let (text, index) = index_pages(pages);
    metadata.word_count = word_count(&text);

    let sections = identify_sections(&text, &index);
    if index.is_empty() || text.trim().is_empty() {
        warn!(target: "pdf", filename = filename, pages = metadata.page_count, "No extractable text in PDF");
    }
    debug!(
        target: "pdf",
        filename = filename,
        pages = metadata.page_count,
        lines = index.len(),
        last_page = index.last_page().unwrap_or(0),
        sections = sections.len(),
        "PDF parsed"
    );

    Document {
        filename: filename.to_string(),
        metadata,
        sections,
        raw_text: clean_pdf_text(&text),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Builds a minimal PDF with one Helvetica text line per entry of `pages`.
    pub fn build_pdf(pages: &[&str], title: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encodable content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if let Some(title) = title {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal(title),
                "Author" => Object::string_literal("Jane Analyst"),
                "Keywords" => Object::string_literal("finance, quarterly ,, report"),
            });
            doc.trailer.set("Info", info_id);
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serializable PDF");
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::build_pdf;
    use super::*;

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn detects_headers_in_pattern_order() {
        assert_eq!(detect_header("Chapter 3: Results"), Some(HeaderKind::Chapter));
        assert_eq!(detect_header("1.1 Background"), Some(HeaderKind::Outline));
        assert_eq!(detect_header("  1. Introduction  "), Some(HeaderKind::Numbered));
        assert_eq!(detect_header("EXECUTIVE SUMMARY"), Some(HeaderKind::AllCaps));
        assert_eq!(detect_header("IV. Discussion"), Some(HeaderKind::Roman));
        assert_eq!(detect_header("Just a sentence."), None);
        assert_eq!(detect_header("   "), None);
        assert_eq!(detect_header("A"), None);
    }

    #[test]
    fn line_index_tracks_pages() {
        let (text, index) = index_pages(&pages(&["a\nb", "c", "d\ne\n"]));
        assert_eq!(text, "a\nb\nc\nd\ne\n");
        assert_eq!(index.len(), text.split('\n').count());
        let values: Vec<usize> = (0..index.len()).filter_map(|line| index.page_of(line)).collect();
        assert_eq!(values, vec![0, 0, 1, 2, 2, 2]);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(index.page_of(2), Some(1));
        assert_eq!(index.page_of(99), None);
        assert_eq!(index.last_page(), Some(2));
    }

    #[test]
    fn line_index_is_empty_without_pages() {
        let (text, index) = index_pages(&[]);
        assert_eq!(text, "");
        assert!(index.is_empty());
    }

    #[test]
    fn headerless_text_is_one_section() {
        let text = "just some text\nwith lines\nand more";
        assert_eq!(
            section_boundaries(text),
            vec![SectionBoundary {
                start: 0,
                end: 2,
                header: None
            }]
        );
    }

    #[test]
    fn headers_split_sections() {
        let text = "preamble\n1. Introduction\nintro body\n\n2. Methods\nmethod body\nSUMMARY\nend";
        let boundaries = section_boundaries(text);
        let spans: Vec<(usize, usize)> = boundaries.iter().map(|b| (b.start, b.end)).collect();
        assert_eq!(spans, vec![(1, 3), (4, 5), (6, 7)]);
        assert_eq!(boundaries[0].header.as_deref(), Some("1. Introduction"));
        assert_eq!(boundaries[2].header.as_deref(), Some("SUMMARY"));
    }

    #[test]
    fn sections_get_pages_and_clean_content() {
        let (text, index) = index_pages(&pages(&[
            "1. Introduction\nexam-\nple   text",
            "2. Methods\nbody",
        ]));
        let sections = identify_sections(&text, &index);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title.as_deref(), Some("1. Introduction"));
        assert_eq!(sections[0].content, "1. Introduction\nexample text");
        assert_eq!(sections[0].page_number, 0);
        assert_eq!(sections[0].level, 1);
        assert_eq!(sections[1].page_number, 1);
    }

    #[test]
    fn assemble_without_text_yields_one_empty_section() {
        let metadata = PdfMetadata {
            page_count: 2,
            ..PdfMetadata::default()
        };
        let doc = assemble("blank.pdf", &[], metadata);
        assert_eq!(doc.raw_text, "");
        assert_eq!(doc.metadata.page_count, 2);
        assert_eq!(doc.metadata.word_count, 0);
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, None);
        assert_eq!(doc.sections[0].content, "");
        assert_eq!(doc.sections[0].level, 0);
    }

    #[test]
    fn garbage_bytes_degrade_to_empty_document() {
        let doc = PdfParser::new().parse_bytes(b"This is not a PDF", "bogus.pdf");
        assert_eq!(doc.filename, "bogus.pdf");
        assert_eq!(doc.raw_text, "");
        assert_eq!(doc.metadata, PdfMetadata::default());
        assert_eq!(doc.sections.len(), 1);
    }

    #[test]
    fn missing_file_degrades_to_empty_document() {
        let doc = PdfParser::new().parse_file(Path::new("/nonexistent/report.pdf"), "report.pdf");
        assert_eq!(doc.metadata.page_count, 0);
        assert_eq!(doc.raw_text, "");
    }

    #[test]
    fn parses_three_page_pdf_without_headers() {
        let first = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu";
        let second = "xi omicron pi rho sigma tau upsilon phi chi psi omega one two";
        let third = "three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen sixteen";
        let bytes = build_pdf(&[first, second, third], None);
        let doc = PdfParser::new().parse_bytes(&bytes, "greek.pdf");

        assert_eq!(doc.metadata.page_count, 3);
        assert_eq!(doc.metadata.word_count, 40);
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, None);
    }

    #[test]
    fn reads_info_dictionary() {
        let bytes = build_pdf(&["hello world"], Some("Quarterly Report"));
        let metadata = read_metadata(&bytes).expect("metadata");
        assert_eq!(metadata.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(metadata.author.as_deref(), Some("Jane Analyst"));
        let keywords: Vec<&str> = metadata.keywords.iter().map(String::as_str).collect();
        assert_eq!(keywords, vec!["finance", "quarterly", "report"]);
        assert_eq!(metadata.page_count, 1);
    }

    #[test]
    fn is_pdf_checks_type_and_magic() {
        assert!(is_pdf(Some("Application/PDF"), b""));
        assert!(is_pdf(None, b"%PDF-1.7"));
        assert!(!is_pdf(Some("text/html"), b"<html>"));
    }
}
