//! Text processing utilities.

/// First `max_chars` characters of the text plus an ellipsis marker.
///
/// Counts characters, not bytes, so multi-byte content never splits mid
/// code point. The marker is appended unconditionally, also when nothing
/// was cut off.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Check if extracted text has any usable content after trimming.
pub fn has_usable_text(text: &str) -> bool {
    !text.trim().is_empty()
}
