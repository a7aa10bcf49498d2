//! # List response parsing
//!
//! Strict JSON parsing for list endpoint responses. Failures name the request
//! that produced the body and carry a short, redacted preview of it.

use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::redact_sensitive;

const PREVIEW_LIMIT: usize = 200;

/// Return a user-friendly error message for common HTTP status codes.
///
/// # Example
/// ```rust
/// use lister_util::http::status_error_message;
///
/// let error_401 = status_error_message(401).unwrap();
/// assert!(error_401.contains("LISTER_API_TOKEN"));
///
/// assert!(status_error_message(404).is_none());
/// ```
pub fn status_error_message(status_code: u16) -> Option<String> {
    match status_code {
        401 => Some("Unauthorized (401). Hint: set LISTER_API_TOKEN=...".into()),
        403 => Some("Forbidden (403). Hint: check the token's access to this list endpoint".into()),
        _ => None,
    }
}

/// The list request a response body belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOrigin {
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
}

impl ResponseOrigin {
    pub fn new(method: Method, path: impl Into<String>, status: StatusCode) -> Self {
        Self {
            method,
            path: path.into(),
            status,
        }
    }
}

/// Parse a list response body into JSON.
///
/// # Errors
/// Returns a [`ListResponseParseError`] naming the request, the status and up
/// to 200 characters of the body with whitespace collapsed and secrets masked.
///
/// # Example
/// ```rust
/// use lister_util::http::{ResponseOrigin, parse_list_response};
/// use reqwest::{Method, StatusCode};
///
/// let origin = ResponseOrigin::new(Method::GET, "/users", StatusCode::OK);
/// assert!(parse_list_response("[1, 2]", &origin).is_ok());
///
/// let error = parse_list_response("<html>", &origin).unwrap_err();
/// assert!(error.to_string().contains("GET /users"));
/// ```
pub fn parse_list_response(text: &str, origin: &ResponseOrigin) -> Result<Value, ListResponseParseError> {
    serde_json::from_str::<Value>(text).map_err(|source| ListResponseParseError {
        origin: origin.clone(),
        source,
        body_preview: response_preview(text, PREVIEW_LIMIT),
    })
}

fn response_preview(text: &str, limit: usize) -> String {
    if text.trim().is_empty() {
        return "<empty>".to_string();
    }

    let mut preview = String::new();
    for (count, ch) in text.chars().enumerate() {
        if count >= limit {
            preview.push_str("...");
            break;
        }
        if ch.is_whitespace() {
            if !preview.ends_with(' ') {
                preview.push(' ');
            }
        } else {
            preview.push(ch);
        }
    }

    redact_sensitive(preview.trim())
}

/// A list endpoint answered with a body that is not JSON.
#[derive(Debug, Error)]
#[error(
    "{} {} returned a non-JSON body (status {}): {source}. body preview: {body_preview}",
    .origin.method,
    .origin.path,
    .origin.status
)]
pub struct ListResponseParseError {
    origin: ResponseOrigin,
    #[source]
    source: serde_json::Error,
    body_preview: String,
}

impl ListResponseParseError {
    pub fn origin(&self) -> &ResponseOrigin {
        &self.origin
    }

    pub fn body_preview(&self) -> &str {
        &self.body_preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> ResponseOrigin {
        ResponseOrigin::new(Method::POST, "/projects/7/members", StatusCode::OK)
    }

    #[test]
    fn parse_error_names_the_request_and_collapses_whitespace() {
        let error = parse_list_response("{\n\t\"broken\": ", &origin()).expect_err("invalid json");
        let message = error.to_string();
        assert!(message.starts_with("POST /projects/7/members returned a non-JSON body (status 200 OK)"), "{message}");
        assert_eq!(error.body_preview(), "{ \"broken\":");
        assert_eq!(error.origin().path, "/projects/7/members");
    }

    #[test]
    fn preview_masks_secrets_and_truncates() {
        let error = parse_list_response("<p>api_token=abc123 denied</p>", &origin()).expect_err("invalid json");
        assert_eq!(error.body_preview(), "<p>api_token=[REDACTED] denied</p>");

        let long = "x".repeat(300);
        assert_eq!(response_preview(&long, 10), "xxxxxxxxxx...");
        assert_eq!(response_preview("   ", 10), "<empty>");
    }
}
