//! HTML parsers for hanime1.me
//!
//! Contains modules for parsing different page types. Every selector and
//! pattern that encodes an assumption about the site's markup lives in these
//! modules and nowhere else.

pub mod detail;
pub mod listing;
mod payload;
pub mod taxonomy;
pub mod text;

pub use detail::parse_detail;
pub use listing::parse_listing;
pub use taxonomy::{parse_category_list, parse_tag_list};

use scraper::ElementRef;

use crate::error::ParseError;

/// Rejects payloads that are not site pages at all
///
/// An empty body or an anti-bot interstitial would otherwise be reported as
/// a layout change.
pub(crate) fn ensure_recognizable(html: &str) -> Result<(), ParseError> {
    if html.trim().is_empty() {
        return Err(ParseError::Unrecognized("empty body".to_string()));
    }

    let head = &html[..floor_char_boundary(html, 4096)];
    if head.contains("cf-challenge")
        || head.contains("challenge-platform")
        || head.contains("<title>Just a moment")
    {
        return Err(ParseError::Unrecognized("anti-bot challenge page".to_string()));
    }

    Ok(())
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// Whitespace-normalized text content of an element
pub(crate) fn element_text(element: &ElementRef) -> String {
    text::clean_text(&element.text().collect::<String>())
}

/// Normalizes an image or link URL found in markup
///
/// Protocol-relative URLs get `https:`; empty values and inline `data:`
/// URIs are dropped.
pub(crate) fn normalize_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() || url.starts_with("data:") {
        return None;
    }
    if let Some(rest) = url.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    Some(url.replace("&amp;", "&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_recognizable() {
        assert!(ensure_recognizable("<html><body></body></html>").is_ok());
        assert_eq!(
            ensure_recognizable("   \n"),
            Err(ParseError::Unrecognized("empty body".to_string()))
        );
        assert!(matches!(
            ensure_recognizable("<html><head><title>Just a moment...</title></head></html>"),
            Err(ParseError::Unrecognized(_))
        ));
    }

    #[test]
    fn test_ensure_recognizable_multibyte_head() {
        let html = "觀".repeat(3000);
        assert!(ensure_recognizable(&html).is_ok());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("//img.example/a.jpg"),
            Some("https://img.example/a.jpg".to_string())
        );
        assert_eq!(
            normalize_url(" https://img.example/a.jpg?x=1&amp;y=2 "),
            Some("https://img.example/a.jpg?x=1&y=2".to_string())
        );
        assert_eq!(normalize_url("data:image/gif;base64,R0lGOD"), None);
        assert_eq!(normalize_url(""), None);
    }
}
