//! Character-bounded truncation for content embedded in prompts.

use std::borrow::Cow;

/// Appended to content that was cut at the character cap.
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Cap `content` at `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was dropped. Counts chars, never splits a UTF-8 sequence.
pub fn truncate_chars(content: &str, max_chars: usize) -> (Cow<'_, str>, bool) {
    match content.char_indices().nth(max_chars) {
        None => (Cow::Borrowed(content), false),
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + TRUNCATION_MARKER.len());
            out.push_str(&content[..byte_idx]);
            out.push_str(TRUNCATION_MARKER);
            (Cow::Owned(out), true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_borrowed_unchanged() {
        let (out, truncated) = truncate_chars("hello", 1000);
        assert!(!truncated);
        assert!(matches!(out, Cow::Borrowed("hello")));
    }

    #[test]
    fn content_at_cap_is_not_marked() {
        let content = "x".repeat(1000);
        let (out, truncated) = truncate_chars(&content, 1000);
        assert!(!truncated);
        assert_eq!(out.len(), 1000);
    }

    #[test]
    fn long_content_is_cut_and_marked() {
        let content = "y".repeat(1500);
        let (out, truncated) = truncate_chars(&content, 1000);
        assert!(truncated);
        assert_eq!(out, format!("{}{}", "y".repeat(1000), TRUNCATION_MARKER));
    }

    #[test]
    fn multibyte_chars_are_counted_not_bytes() {
        let content = "é".repeat(5);
        let (out, truncated) = truncate_chars(&content, 3);
        assert!(truncated);
        assert!(out.starts_with("ééé"));
        assert!(!out.starts_with("éééé"));
    }
}
