//! Approximate reading length of textual resources
//!
//! This is a regex pipeline, not an HTML parser. Malformed markup is tolerated
//! and only skews the count.

use std::{io::Read, sync::LazyLock};

use regex::Regex;

use crate::{error::EpubError, utils::DecodeBytes};

/// Media types whose resources are counted
pub const TEXT_MEDIA_TYPES: [&str; 2] = ["application/xhtml+xml", "text/html"];

/// Matches any tag, including tags spanning lines
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[\s\S]+?>").unwrap());

/// Matches an opening body tag, once tags are lower-cased
static BODY_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<body(\s[^>]*)?>").unwrap());

static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<style[\s\S]*?</style\s*>").unwrap());

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<script[\s\S]*?</script\s*>").unwrap());

/// Matches runs of ASCII whitespace; ideographic spaces and NBSP are content
static WHITESPACE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\t\n\x0C\r ]{2,}").unwrap());

/// Returns `true` if resources of this media type are counted
pub fn is_text_content(mime: &str) -> bool {
    TEXT_MEDIA_TYPES.contains(&mime.trim())
}

/// Reduces an (X)HTML document to its visible text
///
/// Tags are replaced by line breaks first, so adjacent blocks do not merge
/// words, and the line breaks are removed at the end.
pub fn strip_markup(source: &str) -> String {
    let source = TAG_RE.replace_all(source, |caps: &regex::Captures| caps[0].to_lowercase());

    let body = match (BODY_OPEN_RE.find(&source), source.find("</body>")) {
        (Some(open), Some(close)) if close >= open.end() => &source[open.end()..close],
        _ => &source[..],
    };

    let text = STYLE_RE.replace_all(body, "");
    let text = SCRIPT_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, "\n");
    let text = WHITESPACE_RUN_RE.replace_all(&text, "\n");

    text.replace('\n', "").trim().to_string()
}

/// Counts the visible characters of a markup stream
///
/// Characters are counted after decoding, so a multi-byte character counts once.
pub fn visible_char_count<R: Read>(mut reader: R) -> Result<usize, EpubError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;

    let source = match data.decode() {
        Ok(source) => source,
        // Too short to carry a BOM, nothing to detect
        Err(EpubError::EmptyDataError) => String::from_utf8_lossy(&data).to_string(),
        Err(err) => return Err(err),
    };

    Ok(strip_markup(&source).chars().count())
}
