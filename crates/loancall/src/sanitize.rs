//! Helpers for sanitizing data before it enters logs and span attributes.
//!
//! Artifact URLs may carry signed-URL tokens and provider error bodies may
//! echo request content; neither should reach the logs verbatim.

/// Longest provider response body kept in an error message.
pub const MAX_BODY_CHARS: usize = 200;

/// Strips userinfo and the query string from a URL.
///
/// - `https://user:pw@host/a.wav?token=x` → `https://****@host/a.wav`
/// - `calls/1.wav` → `calls/1.wav` (no change)
pub fn redact_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);

    if let Some(scheme_end) = without_query.find("://") {
        let scheme = &without_query[..scheme_end + 3];
        let after_scheme = &without_query[scheme_end + 3..];
        let authority_end = after_scheme.find('/').unwrap_or(after_scheme.len());
        if let Some(at_pos) = after_scheme[..authority_end].rfind('@') {
            return format!("{}****@{}", scheme, &after_scheme[at_pos + 1..]);
        }
    }

    without_query.to_string()
}

/// Truncates a response body to [`MAX_BODY_CHARS`] characters.
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_CHARS {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(MAX_BODY_CHARS).collect();
    format!("{}…", head)
}
