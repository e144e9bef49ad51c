//! Lexical helpers shared by the classifier, the sufficiency checker, the
//! merge step, and the in-memory index.
//!
//! All matching in this crate is done over the same token stream: the input
//! is lowercased and split on every non-alphanumeric character, so
//! `"State-of-the-Art"` yields `["state", "of", "the", "art"]`.

/// Split text into lowercase alphanumeric tokens.
pub fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Normalize a title for duplicate detection.
///
/// Lowercases, replaces every run of non-alphanumeric characters with a
/// single space, and trims. `"Attention Is All You Need."` and
/// `"attention is all  you need"` normalize to the same key.
pub fn normalize_title(title: &str) -> String {
    tokens(title).join(" ")
}

/// Collapse internal whitespace (including newlines) to single spaces.
///
/// Provider feeds such as arXiv wrap long titles across lines.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True if `needle` (already tokenized) occurs as a contiguous run in `haystack`.
pub fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
