//! Token boundary cleanup.

/// Characters removed from both ends of a token before matching.
///
/// Periods, hyphens, slashes, `+` and `@` are kept since they carry meaning
/// in initials, dates, phone numbers and email addresses.
const BOUNDARY_CHARS: &[char] = &[
    ',', ';', ':', '!', '?', '"', '\'', '(', ')', '[', ']', '{', '}', '<', '>', '|', '`',
];

fn is_boundary(c: char) -> bool {
    c.is_whitespace() || BOUNDARY_CHARS.contains(&c)
}

/// Strip incidental punctuation and whitespace from both ends of a token.
pub fn normalize_token(text: &str) -> &str {
    text.trim_matches(is_boundary)
}

/// Normalize, then also drop sentence-final periods and any punctuation they
/// were hiding, e.g. `(jane@example.com).` becomes `jane@example.com`.
pub fn strip_sentence_end(text: &str) -> &str {
    normalize_token(normalize_token(text).trim_end_matches('.'))
}

/// True when nothing survives normalization.
pub fn is_punctuation_only(text: &str) -> bool {
    normalize_token(text).is_empty()
}
