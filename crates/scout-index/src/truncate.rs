//! Input cap applied before every embedding call.
//!
//! Only a prefix of each file is embedded while the full content is stored.
//! Retrieval therefore leans on early-file signal such as imports and headers.

/// Default number of characters embedded per file.
pub const DEFAULT_MAX_EMBED_CHARS: usize = 500;

/// Longest prefix of `text` holding at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
