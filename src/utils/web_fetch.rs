use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::borrow::Cow;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::FetchError;
use crate::utils::content_guard::{detect_binary, BinaryDetection};
use crate::utils::pdf::{is_pdf, PdfParser};
use crate::utils::text_clean::{clean_html_text, word_count};

// Firefox ESR User-Agent string to reduce server-side variance
pub const FIREFOX_UA: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:115.0) Gecko/20100101 Firefox/115.0";

/// Cleaned text of a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebContent {
    pub content: String,
    pub title: Option<String>,
    pub word_count: usize,
}

impl WebContent {
    fn new(content: String, title: Option<String>) -> Self {
        Self {
            word_count: word_count(&content),
            content,
            title,
        }
    }
}

#[async_trait]
pub trait WebFetcher: Send + Sync {
    async fn fetch_and_extract(&self, url: &str) -> Result<WebContent, FetchError>;
}

// Shared connection pool; the timeout is applied per request.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .build()
        .expect("Failed to create HTTP client")
});

/// Fetches pages over HTTP and reduces them to their main textual content.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
    pdf_parser: PdfParser,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pdf_parser: PdfParser::new(),
        }
    }
}

fn client_error(url: &str, reason: impl Into<String>) -> FetchError {
    FetchError::Client {
        url: url.to_string(),
        reason: reason.into(),
    }
}

fn server_error(url: &str, reason: impl Into<String>) -> FetchError {
    FetchError::Server {
        url: url.to_string(),
        reason: reason.into(),
    }
}

fn transport_error(url: &str, e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        client_error(url, e.to_string())
    }
}

/// 4xx is the caller's problem, 5xx the remote server's.
fn classify_status(url: &str, status: StatusCode) -> Option<FetchError> {
    let reason = format!(
        "HTTP error {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown error")
    );
    if status.is_server_error() {
        Some(server_error(url, reason))
    } else if !status.is_success() {
        Some(client_error(url, reason))
    } else {
        None
    }
}

#[async_trait]
impl WebFetcher for HttpFetcher {
    async fn fetch_and_extract(&self, url: &str) -> Result<WebContent, FetchError> {
        let parsed = url::Url::parse(url).map_err(|e| client_error(url, format!("Invalid URL: {}", e)))?;

        info!(target: "web_fetch", url = %parsed, "Starting HTTP fetch");

        let response = HTTP_CLIENT
            .get(parsed.as_str())
            .header("User-Agent", FIREFOX_UA)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "web_fetch", url = %parsed, "HTTP transport error: {}", e);
                transport_error(url, &e)
            })?;

        if let Some(err) = classify_status(url, response.status()) {
            warn!(target: "web_fetch", url = %parsed, status = response.status().as_u16(), "HTTP non-success status");
            return Err(err);
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_string());

        let body = response.bytes().await.map_err(|e| {
            warn!(target: "web_fetch", url = %parsed, "Body read failed: {}", e);
            if e.is_timeout() {
                transport_error(url, &e)
            } else {
                server_error(url, format!("Failed to read HTTP response body: {}", e))
            }
        })?;
        info!(target: "web_fetch", url = %parsed, size = body.len(), ct = ?content_type, "HTTP fetch completed");

        let head = &body[..body.len().min(512)];

        if is_pdf(content_type.as_deref(), head) {
            let parser = self.pdf_parser;
            let filename = parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
                .unwrap_or("document.pdf")
                .to_string();
            let bytes = body.to_vec();
            let document = tokio::task::spawn_blocking(move || parser.parse_bytes(&bytes, &filename))
                .await
                .map_err(|e| server_error(url, format!("PDF parsing task failed: {}", e)))?;

            if document.raw_text.is_empty() {
                return Err(server_error(url, "PDF contains no extractable text"));
            }
            let title = document.metadata.title.clone().or_else(|| Some(url.to_string()));
            return Ok(WebContent::new(document.raw_text, title));
        }

        if let BinaryDetection::Binary { content_type: detected } =
            detect_binary(content_type.as_deref(), head)
        {
            let effective = detected
                .or(content_type.clone())
                .unwrap_or_else(|| "unknown".to_string());
            info!(target: "web_fetch", url = %parsed, ct = %effective, "Binary content detected; refusing");
            return Err(client_error(
                url,
                format!("Unsupported binary content type: {}", effective),
            ));
        }

        let decoded = decode_to_utf8(&body, content_type.as_deref()).map_err(|e| {
            warn!(target: "web_fetch", url = %parsed, "Decoding failed: {}", e);
            server_error(url, format!("Failed to decode textual content to UTF-8: {}", e))
        })?;

        if !is_html(content_type.as_deref(), &decoded) {
            return Ok(WebContent::new(clean_html_text(&decoded), None));
        }

        let started = Instant::now();
        let title = extract_title(&decoded).or_else(|| Some(url.to_string()));
        let source_html = match extract_main_content_fragment(&decoded) {
            Some(SelectedHtml::Main(fragment)) => Cow::Owned(fragment),
            Some(SelectedHtml::Body(body_html)) => {
                warn!(target: "web_fetch", url = %parsed, "Main content fragment not found; using <body> as fallback");
                Cow::Owned(body_html)
            }
            None => Cow::Borrowed(decoded.as_str()),
        };

        let text = html2text::from_read(source_html.as_bytes(), 120).map_err(|e| {
            warn!(target: "web_fetch", url = %parsed, "html2text conversion failed: {}", e);
            server_error(url, format!("Failed to convert HTML content to text: {}", e))
        })?;

        let content = clean_html_text(&text);
        info!(target: "web_fetch", url = %parsed, elapsed_ms = started.elapsed().as_millis() as u64, len = content.len(), "HTML content extracted");
        Ok(WebContent::new(content, title))
    }
}

fn is_html(content_type: Option<&str>, decoded: &str) -> bool {
    match content_type {
        Some(ct) => {
            let main = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            main == "text/html" || main == "application/xhtml+xml"
        }
        None => {
            let head: String = decoded.chars().take(256).collect::<String>().to_ascii_lowercase();
            head.contains("<html") || head.contains("<!doctype html")
        }
    }
}

/// Decode bytes into UTF-8 String using charset from Content-Type or chardetng fallback.
/// Returns error if decoding performed replacements (considered data corruption for our purposes).
fn decode_to_utf8(bytes: &[u8], content_type: Option<&str>) -> Result<String> {
    if let Some((enc, offset)) = encoding_rs::Encoding::for_bom(bytes) {
        let (cow, _used, had_errors) = enc.decode(&bytes[offset..]);
        if had_errors {
            anyhow::bail!("decoding had errors after BOM sniff");
        }
        return Ok(cow.into_owned());
    }

    if let Some(label) = extract_charset_label(content_type) {
        if let Some(enc) = encoding_rs::Encoding::for_label_no_replacement(label.as_bytes()) {
            let (cow, _used, had_errors) = enc.decode(bytes);
            if !had_errors {
                return Ok(cow.into_owned());
            }
            anyhow::bail!("decoding with declared charset '{}' produced errors", label);
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    let (cow, _used, had_errors) = enc.decode(bytes);
    if had_errors {
        anyhow::bail!("decoding with detected charset '{}' produced errors", enc.name());
    }
    Ok(cow.into_owned())
}

/// Extracts charset=... value from Content-Type header (case-insensitive) if present.
fn extract_charset_label(content_type: Option<&str>) -> Option<String> {
    let ct = content_type?;
    for part in ct.split(';').skip(1) {
        let kv = part.trim();
        if kv.to_ascii_lowercase().starts_with("charset=") {
            let v = kv[8..].trim().trim_matches('"').trim_matches('\'');
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }
    None
}

fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

static POSITIVE_CLASS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)article|body|content|entry|hentry|h-entry|main|page|post|text|blog|story|paragraph").expect("valid positive regex")
});

static NEGATIVE_CLASS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)hidden|banner|breadcrumb|combx|comment|contact|foot|footer|footnote|masthead|meta|promo|related|share|sidebar|sponsor|tags|widget|subscribe|nav|byline").expect("valid negative regex")
});

const MIN_DYNAMIC_TEXT_CHARS: usize = 180;

#[derive(Debug)]
enum SelectedHtml {
    Main(String),
    Body(String),
}

fn extract_main_content_fragment(html: &str) -> Option<SelectedHtml> {
    const MAIN_SELECTORS: &[&str] = &[
        "article",
        "main",
        "#main",
        "#main-content",
        "#content",
        "#article-body",
        "[role=\"main\"]",
        "[role=\"article\"]",
        ".main-content",
        ".page-content",
        ".content-body",
        ".article-content",
        ".article-body",
        ".article__body",
        ".story-body",
        ".post-content",
        ".post-body",
        ".entry-content",
        ".blog-post",
        ".rich-text",
        ".prose",
        ".markdown-body",
        ".mw-parser-output",
    ];

    if html.trim().is_empty() {
        return None;
    }

    let document = Html::parse_document(html);

    for selector_str in MAIN_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = element.text().collect::<String>();
                if text.trim().is_empty() {
                    continue;
                }
                return Some(SelectedHtml::Main(element.html()));
            }
        }
    }

    if let Some(fragment) = select_by_positive_regex(&document) {
        return Some(SelectedHtml::Main(fragment));
    }

    if let Ok(body_selector) = Selector::parse("body") {
        if let Some(body) = document.select(&body_selector).next() {
            let text = body.text().collect::<String>();
            if !text.trim().is_empty() {
                return Some(SelectedHtml::Body(body.html()));
            }
        }
    }

    None
}

/// Picks the longest positively-named element when no known selector matched.
fn select_by_positive_regex(document: &Html) -> Option<String> {
    let selector = Selector::parse("[class],[id]").ok()?;
    let mut best: Option<(String, usize)> = None;

    for element in document.select(&selector) {
        let attr_tokens = [element.value().attr("class"), element.value().attr("id")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        if attr_tokens.is_empty() || !POSITIVE_CLASS_REGEX.is_match(&attr_tokens) {
            continue;
        }
        if NEGATIVE_CLASS_REGEX.is_match(&attr_tokens) && !attr_tokens.contains("content") {
            continue;
        }

        let text_len = element.text().collect::<String>().trim().chars().count();
        if text_len < MIN_DYNAMIC_TEXT_CHARS {
            continue;
        }

        if best
            .as_ref()
            .map(|(_, current_len)| text_len > *current_len)
            .unwrap_or(true)
        {
            best = Some((element.html(), text_len));
        }
    }

    best.map(|(html, _)| html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_article_fragment() {
        let html = r#"<html><body><header>Header</header><article><h1>Title</h1><p>Important text.</p></article></body></html>"#;
        match extract_main_content_fragment(html).expect("fragment expected") {
            SelectedHtml::Main(inner) => {
                assert!(inner.contains("<h1>Title</h1>"));
                assert!(inner.contains("Important text."));
                assert!(!inner.contains("Header"));
            }
            SelectedHtml::Body(_) => panic!("expected article fragment"),
        }
    }

    #[test]
    fn falls_back_to_body_fragment() {
        let html = r#"<html><body><div class="wrapper"><p>Some text</p></div></body></html>"#;
        match extract_main_content_fragment(html).expect("fragment expected") {
            SelectedHtml::Main(_) => panic!("expected body fallback"),
            SelectedHtml::Body(inner) => assert!(inner.contains("Some text")),
        }
    }

    #[test]
    fn returns_none_for_empty_html() {
        assert!(extract_main_content_fragment("").is_none());
    }

    #[test]
    fn detects_positive_regex_fragment() {
        let body = "This is the main article segment. ".repeat(10);
        let html = format!(
            "<html><body><div class=\"story-text\"><p>{}</p></div><aside class=\"sidebar\">Sidebar</aside></body></html>",
            body
        );
        match extract_main_content_fragment(&html).expect("fragment expected") {
            SelectedHtml::Main(inner) => {
                assert!(inner.contains("story-text"));
                assert!(!inner.contains("Sidebar"));
            }
            SelectedHtml::Body(_) => panic!("expected main fragment from positive regex"),
        }
    }

    #[test]
    fn title_comes_from_title_element() {
        let html = "<html><head><title>  Quarterly Results </title></head><body></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Quarterly Results"));
        assert_eq!(extract_title("<html><body>none</body></html>"), None);
    }

    #[test]
    fn charset_label_parsing() {
        assert_eq!(
            extract_charset_label(Some("text/html; Charset=\"ISO-8859-1\"")).as_deref(),
            Some("ISO-8859-1")
        );
        assert_eq!(extract_charset_label(Some("text/html")), None);
    }

    #[test]
    fn declared_charset_is_honored() {
        let bytes = [0x63, 0x61, 0x66, 0xE9];
        let decoded = decode_to_utf8(&bytes, Some("text/plain; charset=windows-1252")).unwrap();
        assert_eq!(decoded, "café");
    }

    #[test]
    fn status_codes_split_by_fault() {
        let url = "https://example.com/missing";
        assert!(matches!(
            classify_status(url, StatusCode::NOT_FOUND),
            Some(FetchError::Client { .. })
        ));
        assert!(matches!(
            classify_status(url, StatusCode::BAD_GATEWAY),
            Some(FetchError::Server { .. })
        ));
        assert_eq!(classify_status(url, StatusCode::OK), None);
    }

    #[tokio::test]
    async fn invalid_url_is_client_error() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1));
        let err = fetcher.fetch_and_extract("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Client { .. }));
        assert_eq!(err.code(), "ERR_FETCH_CLIENT");
    }

    #[test]
    fn html_detection_without_header() {
        assert!(is_html(None, "<!DOCTYPE html><html><body>x</body></html>"));
        assert!(!is_html(None, "plain words"));
        assert!(is_html(Some("text/html; charset=utf-8"), ""));
    }
}
