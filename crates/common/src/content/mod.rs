//! Text extraction from stored paper files
//!
//! PDF text comes from the `BT`/`ET` text objects of each page's content
//! stream via lopdf. Text types are decoded as UTF-8.

use crate::errors::{AppError, Result};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::{debug, warn};

/// Extract readable text from a stored file
pub fn extract_text(media_type: &str, bytes: &[u8]) -> Result<String> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/pdf" => extract_pdf_text(bytes),
        t if t.starts_with("text/") => Ok(clean_text(&String::from_utf8_lossy(bytes))),
        _ => Err(AppError::UnsupportedMediaType {
            media_type: media_type.to_string(),
        }),
    }
}

/// First chunk of `text` no longer than `max_chars`, split on semantic boundaries
pub fn excerpt(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let splitter = TextSplitter::new(ChunkConfig::new(max_chars));
    let first = splitter.chunks(text).next().map(str::to_string).unwrap_or_default();
    first
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| AppError::InvalidFormat {
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for (page_num, page_id) in pages {
        match doc.get_page_content(page_id) {
            Ok(content) => {
                text.push_str(&extract_text_from_content(&content));
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to read page content, skipping");
            }
        }
    }

    Ok(clean_text(&text))
}

/// Collect the strings shown inside text objects of a content stream
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content_str.lines() {
        match line.trim() {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                text.push(' ');
            }
            op if in_text_block => {
                if let Some(shown) = extract_text_from_operator(op) {
                    text.push_str(&shown);
                }
            }
            _ => {}
        }
    }

    text
}

/// Text of a `Tj`, `'`, `"` or `TJ` operator line
fn extract_text_from_operator(line: &str) -> Option<String> {
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut current = String::new();
        let mut in_paren = false;

        for ch in line.chars() {
            match ch {
                '(' if !in_paren => in_paren = true,
                ')' if in_paren && !current.ends_with('\\') => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => current.push(ch),
                _ => {}
            }
        }
        return (!result.is_empty()).then_some(result);
    }

    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        let start = line.find('(')?;
        let end = line.rfind(')')?;
        if end > start {
            return Some(decode_pdf_string(&line[start + 1..end]));
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some(c) => result.push(c),
            None => {}
        }
    }

    result
}

/// Collapse whitespace and drop byte-order marks
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_normalized() {
        let text = extract_text("text/plain; charset=utf-8", b"Hello   World\n\nTest").unwrap();
        assert_eq!(text, "Hello World Test");
    }

    #[test]
    fn test_unsupported_type() {
        assert!(matches!(
            extract_text("image/png", b"\x89PNG"),
            Err(AppError::UnsupportedMediaType { .. })
        ));
    }

    #[test]
    fn test_corrupt_pdf() {
        assert!(matches!(
            extract_text("application/pdf", b"not a pdf"),
            Err(AppError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_content_stream_text() {
        let stream = b"BT\n/F1 12 Tf\n(Distributed) Tj\nET\nBT\n[(led) -20 (gers)] TJ\nET\n";
        assert_eq!(
            clean_text(&extract_text_from_content(stream)),
            "Distributed ledgers"
        );
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string("Hello\\nWorld"), "Hello\nWorld");
        assert_eq!(decode_pdf_string("Test\\(paren\\)"), "Test(paren)");
    }

    #[test]
    fn test_excerpt_respects_limit() {
        let text = "First sentence here. Second sentence follows. Third one ends it.";
        let short = excerpt(text, 25);
        assert!(!short.is_empty());
        assert!(short.chars().count() <= 25);
        assert!(text.starts_with(&short));

        assert_eq!(excerpt(text, 1000), text);
        assert_eq!(excerpt(text, 0), "");
    }
}
