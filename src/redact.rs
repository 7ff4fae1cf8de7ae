use std::borrow::Cow;

const JSON_SECRET_FIELDS: [&str; 4] = ["accessToken", "refreshToken", "token", "password"];

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();
    if nee.is_empty() {
        return Some(0);
    }
    if nee.len() > hay.len() {
        return None;
    }

    (0..=hay.len() - nee.len()).find(|&i| {
        hay[i..i + nee.len()]
            .iter()
            .zip(nee)
            .all(|(a, b)| a.to_ascii_lowercase() == b.to_ascii_lowercase())
    })
}

/// Replaces whatever follows `Bearer ` up to the next whitespace, quote or comma.
fn redact_bearer(text: String) -> String {
    const MARKER: &str = "bearer ";
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    loop {
        let Some(idx) = find_ascii_case_insensitive(rest, MARKER) else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..idx + MARKER.len()]);
        rest = &rest[idx + MARKER.len()..];

        let mut consumed = 0;
        for ch in rest.chars() {
            if ch.is_whitespace() || ch == '"' || ch == '\'' || ch == ',' {
                break;
            }
            consumed += ch.len_utf8();
        }
        if consumed > 0 {
            out.push_str("REDACTED");
        }
        rest = &rest[consumed..];
    }
    out
}

/// Replaces the string value of `"field": "..."` pairs.
fn redact_json_field(text: String, field: &str) -> String {
    let needle = format!("\"{field}\"");
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(idx) = rest.find(&needle) {
        out.push_str(&rest[..idx + needle.len()]);
        rest = &rest[idx + needle.len()..];

        let trimmed = rest.trim_start();
        let Some(after_colon) = trimmed.strip_prefix(':') else {
            continue;
        };
        let value = after_colon.trim_start();
        let Some(value_body) = value.strip_prefix('"') else {
            continue;
        };
        let Some(end) = value_body.find('"') else {
            continue;
        };

        out.push_str(&rest[..rest.len() - value_body.len()]);
        out.push_str("REDACTED\"");
        rest = &value_body[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Scrubs bearer credentials and token-bearing JSON fields from text that is
/// about to be logged or surfaced in an error.
pub fn redact_secrets(input: &str) -> Cow<'_, str> {
    let mut value = redact_bearer(input.to_string());
    for field in JSON_SECRET_FIELDS {
        if value.contains(field) {
            value = redact_json_field(value, field);
        }
    }

    if value == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(value)
    }
}
