//! Error taxonomy for fetches and definition handling.
//!
//! Fetch errors are `Clone` so a single failed request can be handed to every
//! caller that joined the same in-flight fetch.

use lister_util::http::HttpRequestError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListerError {
    /// Network or transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    /// The response body could not be parsed.
    #[error("response parse error: {0}")]
    Parse(String),
    /// Neither the selector nor the collection heuristics produced a row array.
    #[error("response for '{definition_id}' does not contain a row array")]
    Selector { definition_id: String },
    /// A definition is unusable (for example, a registered base without `optionValue`).
    #[error("invalid definition '{id}': {reason}")]
    InvalidDefinition { id: String, reason: String },
}

impl From<HttpRequestError> for ListerError {
    fn from(error: HttpRequestError) -> Self {
        match error {
            HttpRequestError::Status { status, message } => Self::Status { status, message },
            HttpRequestError::Parse(parse_error) => Self::Parse(parse_error.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}
