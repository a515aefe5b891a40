//! Text normalization for corpus records and display.
//!
//! Raw reviews are cleaned before they are embedded:
//! 1. Replace HTML tags with a space
//! 2. Collapse whitespace runs
//! 3. Trim, and drop the record if nothing is left

use once_cell::sync::Lazy;
use regex::Regex;

/// Ellipsis suffix when content is truncated
const TRUNCATION_SUFFIX: &str = "...";

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*?>").expect("valid tag regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Clean a raw review. Returns `None` if nothing but markup and whitespace remains.
pub fn clean_text(raw: &str) -> Option<String> {
    let without_tags = HTML_TAG.replace_all(raw, " ");
    let collapsed = WHITESPACE.replace_all(&without_tags, " ");
    let cleaned = collapsed.trim();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Cut `text` to at most `max_chars` characters, appending an ellipsis if cut.
///
/// Counts characters, not bytes, so multi-byte text is never split.
pub fn snippet(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        None => (text.to_string(), false),
        Some((byte_pos, _)) => (format!("{}{}", &text[..byte_pos], TRUNCATION_SUFFIX), true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tags() {
        assert_eq!(
            clean_text("Great <b>movie</b>!<br/>Loved it"),
            Some("Great movie ! Loved it".to_string())
        );
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(
            clean_text("  too \n\n many\t\tspaces  "),
            Some("too many spaces".to_string())
        );
    }

    #[test]
    fn test_empty_after_cleaning() {
        assert!(clean_text("").is_none());
        assert!(clean_text("   \n\t").is_none());
        assert!(clean_text("<p></p> <br>").is_none());
    }

    #[test]
    fn test_keeps_comparison_signs() {
        assert_eq!(clean_text("5 > 3 and 2 < 4"), Some("5 > 3 and 2 < 4".to_string()));
    }

    #[test]
    fn test_snippet_short_text_untouched() {
        assert_eq!(snippet("short", 200), ("short".to_string(), false));
        assert_eq!(snippet("exact", 5), ("exact".to_string(), false));
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let (cut, truncated) = snippet("éèàùç", 3);
        assert!(truncated);
        assert_eq!(cut, "éèà...");
    }
}
