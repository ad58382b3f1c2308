//! Content preprocessing for embedding generation.
//!
//! Prepares a note's text fields for embedding:
//! 1. Trim whitespace
//! 2. Skip empty fields, and the note if every field is empty
//! 3. Concatenate title, summary and transcript with a separator
//! 4. Truncate to max length with ellipsis

use sha2::{Digest, Sha256};

use crate::notes::Note;

/// Separator placed between non-empty fields
const FIELD_SEPARATOR: &str = " - ";

/// Ellipsis suffix when content is truncated
const TRUNCATION_SUFFIX: &str = "...";

/// Build the embedding input for a note.
///
/// Returns `None` if the note has no non-empty text field.
pub fn note_content(note: &Note, max_length: usize) -> Option<String> {
    let parts: Vec<&str> = [&note.title, &note.summary, &note.transcript]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect();

    if parts.is_empty() {
        return None;
    }

    Some(truncate_content(&parts.join(FIELD_SEPARATOR), max_length))
}

/// Truncate content to `max_length` characters, adding ellipsis if truncated.
fn truncate_content(content: &str, max_length: usize) -> String {
    if content.chars().count() <= max_length {
        return content.to_string();
    }

    let max_chars = max_length.saturating_sub(TRUNCATION_SUFFIX.len());
    let truncated: String = content.chars().take(max_chars).collect();

    format!("{}{}", truncated, TRUNCATION_SUFFIX)
}

/// SHA-256 of the embedding input, hex encoded.
/// Used to determine if a note needs re-embedding.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
