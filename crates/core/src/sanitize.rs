pub const DEFAULT_MAX_NAME_LEN: usize = 50;

/// Turns free-form description text into a lower-case, hyphen-separated fragment
/// made of `[a-z0-9-]` only, cut to at most `max_len` characters.
pub fn sanitize_description(value: &str, max_len: usize) -> String {
    value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .take(max_len)
        .collect()
}

/// Keeps at most `max_words` whitespace-separated words, joined by single spaces.
pub fn truncate_words(value: &str, max_words: usize) -> String {
    value
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}
