//! # Text Processing Utilities
//!
//! Redaction of secret-looking values before they reach logs or error messages.

use once_cell::sync::Lazy;
use regex::Regex;

static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization:\s*)(bearer\s+)?([\w\-\.=:/+]+)",
        r"(?i)([A-Z0-9_]*?(?:KEY|TOKEN|SECRET|PASSWORD)=)([^\s&]+)",
        r#"(?i)("(?:api_?key|token|secret|password|access_token)"\s*:\s*)"[^"]*""#,
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Redacts values that look like secrets in a string.
///
/// Key names are preserved so the output stays useful for debugging.
///
/// # Example
/// ```rust
/// use lister_util::redact_sensitive;
///
/// assert_eq!(redact_sensitive("API_KEY=abc123 other"), "API_KEY=[REDACTED] other");
/// assert_eq!(redact_sensitive("Authorization: Bearer secret123"), "Authorization: [REDACTED]");
/// assert_eq!(redact_sensitive(r#"{"token": "abc"}"#), r#"{"token": "[REDACTED]"}"#);
/// ```
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for (index, pattern) in REDACT_PATTERNS.iter().enumerate() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                if index == 2 {
                    format!("{prefix}\"[REDACTED]\"")
                } else {
                    format!("{prefix}[REDACTED]")
                }
            })
            .to_string();
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(redact_sensitive("no secrets here"), "no secrets here");
    }

    #[test]
    fn redacts_query_string_tokens() {
        assert_eq!(redact_sensitive("GET /x?ACCESS_TOKEN=abc&page=2"), "GET /x?ACCESS_TOKEN=[REDACTED]&page=2");
    }
}
