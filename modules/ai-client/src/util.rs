/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip a surrounding markdown code fence, including any language tag on the
/// opening fence.
pub fn strip_code_blocks(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag ("json", "text", ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) if !rest[..idx].contains(char::is_whitespace) => &rest[idx + 1..],
        _ => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Reduce a one-value model answer to the bare value: code fences, quotes,
/// angle brackets and trailing sentence punctuation removed.
pub fn strip_wrapping(response: &str) -> &str {
    let mut value = strip_code_blocks(response);
    loop {
        let next = value
            .trim()
            .trim_end_matches(['.', ',', ';'])
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '<' || c == '>');
        if next == value {
            return value;
        }
        value = next;
    }
}
