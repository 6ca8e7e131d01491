// Provenance-specific text normalizers.
// Plain, PDF and HTML text each get their own cleaner; the heuristics differ
// and each one is tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;

static HORIZONTAL_WS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+").expect("valid horizontal whitespace regex"));

static WS_AFTER_NEWLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]+").expect("valid leading whitespace regex"));

static WS_BEFORE_NEWLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+\n").expect("valid trailing whitespace regex"));

static THREE_OR_MORE_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid paragraph regex"));

static TWO_OR_MORE_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{2,}").expect("valid newline regex"));

static HYPHENATED_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)-\s*\n\s*(\w+)").expect("valid hyphenation regex"));

static LEADING_INDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^( {1,4})").expect("valid indent regex"));

static DASH_SPACING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*-[ \t]*").expect("valid dash regex"));

/// Counts whitespace-separated tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Collapses spaces/tabs and strips them at line boundaries.
fn squeeze_horizontal(text: &str) -> String {
    let text = HORIZONTAL_WS.replace_all(text, " ");
    let text = WS_AFTER_NEWLINE.replace_all(&text, "\n");
    WS_BEFORE_NEWLINE.replace_all(&text, "\n").into_owned()
}

/// Cleans plain text (user input, text files) for prompting.
///
/// Paragraph breaks survive as a single blank line; every other run of
/// horizontal whitespace becomes one space.
pub fn clean_text(text: &str) -> String {
    let text = squeeze_horizontal(text);
    let text = THREE_OR_MORE_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Cleans text extracted from PDF pages.
///
/// Page breaks become paragraph breaks, words hyphenated across a line break
/// are rejoined, and up to four leading spaces of indentation are kept.
pub fn clean_pdf_text(text: &str) -> String {
    let mut text = text.replace('\u{000C}', "\n\n");

    // "a-\nb-\nc" needs two passes since matches cannot overlap
    while HYPHENATED_BREAK.is_match(&text) {
        text = HYPHENATED_BREAK.replace_all(&text, "${1}${2}").into_owned();
    }

    let text = THREE_OR_MORE_NEWLINES.replace_all(&text, "\n\n");

    let lines: Vec<String> = text
        .split('\n')
        .map(|line| match LEADING_INDENT.find(line) {
            Some(indent) => {
                let rest = HORIZONTAL_WS.replace_all(&line[indent.end()..], " ");
                format!("{}{}", indent.as_str(), rest)
            }
            None => HORIZONTAL_WS.replace_all(line, " ").into_owned(),
        })
        .collect();

    lines.join("\n").trim().to_string()
}

/// Cleans text converted from HTML pages.
///
/// HTML conversion emits many blank lines, so every run of newlines becomes
/// one. Bullet glyphs turn into dashes and stray `&nbsp;` entities into spaces.
pub fn clean_html_text(text: &str) -> String {
    let text = text.replace('•', "- ").replace("&nbsp;", " ");
    let text = squeeze_horizontal(&text);
    let text = TWO_OR_MORE_NEWLINES.replace_all(&text, "\n");
    let text = DASH_SPACING.replace_all(&text, " - ");
    text.trim().to_string()
}

/// Title and word count derived from plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMetadata {
    pub title: Option<String>,
    pub word_count: usize,
}

/// Maximum length, in characters, of a line treated as a plain-text title.
const MAX_TITLE_CHARS: usize = 50;

/// Derives metadata from already-cleaned text: the first non-empty line
/// shorter than 50 characters serves as the title.
pub fn text_metadata(cleaned: &str) -> TextMetadata {
    let title = cleaned
        .split('\n')
        .map(str::trim)
        .find(|line| !line.is_empty() && line.chars().count() < MAX_TITLE_CHARS)
        .map(str::to_string);

    TextMetadata {
        title,
        word_count: word_count(cleaned),
    }
}
