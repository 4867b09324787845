//! Text helpers for prompt building and message formatting.

/// Returns the first `max_chars` characters of `text`.
///
/// Cuts on a character boundary, never inside a multi-byte sequence.
#[must_use]
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_prefix_short_text_is_unchanged() {
        assert_eq!(char_prefix("abc", 10), "abc");
        assert_eq!(char_prefix("", 3), "");
    }

    #[test]
    fn test_char_prefix_cuts_at_limit() {
        assert_eq!(char_prefix("abcdef", 3), "abc");
        assert_eq!(char_prefix("abc", 0), "");
    }

    #[test]
    fn test_char_prefix_respects_multibyte_boundaries() {
        let text = "привет мир";
        assert_eq!(char_prefix(text, 6), "привет");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b & c > d"), "a &lt; b &amp; c &gt; d");
        assert_eq!(escape_html("plain"), "plain");
    }
}
