use serde_json::{json, Value};

/// Result of binary detection based on Content-Type and magic bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryDetection {
    /// Content is binary; the MIME type is given when the header named one
    Binary { content_type: Option<String> },
    Text,
}

const TEXTUAL_APPLICATION_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/javascript",
    "application/xhtml+xml",
    "application/rss+xml",
    "application/atom+xml",
];

const BINARY_APPLICATION_TYPES: &[&str] = &[
    "application/pdf",
    "application/zip",
    "application/gzip",
    "application/octet-stream",
    "application/msword",
];

// Magic signatures checked against the first body bytes.
const MAGIC_SIGNATURES: &[&[u8]] = &[
    b"%PDF-",
    &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
    &[0xFF, 0xD8, 0xFF],
    b"GIF8",
    &[0x50, 0x4B, 0x03, 0x04],
    &[0x1F, 0x8B],
    b"Rar!",
    &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C],
];

fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Decides whether a fetched body can be treated as text.
///
/// A textual MIME type is trusted outright. An explicitly binary one is
/// refused. Anything else is judged by magic bytes in `head` (~512 bytes).
pub fn detect_binary(content_type: Option<&str>, head: &[u8]) -> BinaryDetection {
    if let Some(ct) = content_type {
        let mime = mime_essence(ct);

        if mime.starts_with("text/") || TEXTUAL_APPLICATION_TYPES.contains(&mime.as_str()) {
            return BinaryDetection::Text;
        }

        let is_binary_family = ["image/", "audio/", "video/", "font/", "application/vnd.", "application/x-"]
            .iter()
            .any(|prefix| mime.starts_with(prefix));
        if is_binary_family || BINARY_APPLICATION_TYPES.contains(&mime.as_str()) {
            return BinaryDetection::Binary {
                content_type: Some(mime),
            };
        }
    }

    let riff_webp = head.starts_with(b"RIFF") && head.get(8..12) == Some(b"WEBP".as_slice());
    if riff_webp || MAGIC_SIGNATURES.iter().any(|magic| head.starts_with(magic)) {
        return BinaryDetection::Binary { content_type: None };
    }

    BinaryDetection::Text
}

/// Builds the textual body of a tool error: a human-readable first line,
/// then a JSON object with `code`, `message` and `details`.
pub fn build_error_payload(code: &str, message: &str, details: Value) -> String {
    let obj = json!({
        "code": code,
        "message": message,
        "details": details,
    });
    format!("{}\n{}", message, obj)
}
