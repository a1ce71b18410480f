pub const PLACEHOLDER: char = '_';

/// Replaces characters that are illegal in common file systems with `_`
/// and trims surrounding whitespace. Never returns an empty string.
pub fn sanitize_filename(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|ch| {
            if is_disallowed_char(ch) {
                PLACEHOLDER
            } else {
                ch
            }
        })
        .collect();

    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        return PLACEHOLDER.to_string();
    }
    trimmed.to_string()
}

pub fn is_disallowed_char(ch: char) -> bool {
    matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || ch.is_control()
}
