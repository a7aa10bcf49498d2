//! HTTP execution helpers for list endpoints.
//!
//! This module turns a transport-neutral [`ListRequest`] into a `reqwest`
//! call, parses the response strictly, and provides the collection
//! extraction heuristics used when a definition has no selector.

use lister_api::ListerClient;
use lister_types::ListRequest;
use reqwest::Method;
use serde_json::{Map, Value};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use crate::http::{ListResponseParseError, ResponseOrigin, build_path, parse_list_response, status_error_message};
use crate::merge::value_at_path;

const RESPONSE_ARRAY_PRIORITY_KEYS: &[&str] = &[
    "items", "results", "data", "values", "entries", "list", "rows", "records", "options", "nodes",
];

/// Failure while executing a list request.
#[derive(Debug, Error)]
pub enum HttpRequestError {
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
    #[error("network error: {0}. Hint: check connection/proxy and LISTER_API_BASE")]
    Network(String),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Parse(#[from] ListResponseParseError),
}

/// Execute a list request and parse the response payload.
///
/// # Arguments
/// - `client`: Preconfigured HTTP client with base URL and headers.
/// - `request`: Endpoint, optional method, parameters and optional body.
/// - `default_method`: Method used when the request does not name one.
///
/// # Returns
/// The parsed JSON payload for a successful response, `Value::Null` for empty
/// bodies, or an error if the request or JSON parsing fails.
///
/// Parameters fill `{placeholder}` path segments first. The rest travel as
/// query pairs for GET/DELETE, or as the JSON body otherwise (unless the
/// request carries an explicit body).
pub async fn execute_list_request(client: &ListerClient, request: &ListRequest, default_method: &Method) -> Result<Value, HttpRequestError> {
    let start = Instant::now();
    let method = match request.method.as_deref() {
        Some(name) => Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| HttpRequestError::InvalidMethod(name.to_string()))?,
        None => default_method.clone(),
    };
    let (request_path, params) = build_path(&request.endpoint, request.params.clone());
    debug!(
        method = %method,
        path = %request_path,
        parameter_count = params.len(),
        has_body = request.body.is_some(),
        "http request started"
    );

    let mut request_builder = client.request(method.clone(), &request_path);
    match method {
        Method::GET | Method::DELETE => {
            if !params.is_empty() {
                request_builder = request_builder.query(&build_query_pairs(params));
            }
            if let Some(body) = &request.body {
                request_builder = request_builder.json(body);
            }
        }
        _ => {
            let body = request.body.clone().unwrap_or(Value::Object(params));
            request_builder = request_builder.json(&body);
        }
    }

    let response = request_builder
        .send()
        .await
        .map_err(|error| HttpRequestError::Network(error.to_string()))?;
    let status = response.status();
    let body_text = response
        .text()
        .await
        .map_err(|error| HttpRequestError::Network(error.to_string()))?;

    if !status.is_success() {
        let message = status_error_message(status.as_u16()).unwrap_or_else(|| crate::redact_sensitive(body_text.trim()));
        warn!(
            method = %method,
            path = %request_path,
            status = %status,
            duration_ms = start.elapsed().as_millis(),
            "http request failed"
        );
        return Err(HttpRequestError::Status {
            status: status.as_u16(),
            message,
        });
    }

    if body_text.trim().is_empty() {
        debug!(
            method = %method,
            path = %request_path,
            status = %status,
            duration_ms = start.elapsed().as_millis(),
            "http request completed with empty response"
        );
        return Ok(Value::Null);
    }

    let origin = ResponseOrigin::new(method.clone(), request_path.clone(), status);
    let parsed = parse_list_response(&body_text, &origin).inspect_err(|error| {
        warn!(
            method = %method,
            path = %request_path,
            status = %status,
            body_len = body_text.len(),
            error = %error,
            "http response JSON parse failed"
        );
    })?;
    debug!(
        method = %method,
        path = %request_path,
        status = %status,
        duration_ms = start.elapsed().as_millis(),
        "http request completed"
    );
    Ok(parsed)
}

fn build_query_pairs(query_parameters: Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in query_parameters {
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push((key.clone(), query_value_to_string(item)));
                }
            }
            Value::Null => {}
            other => pairs.push((key, query_value_to_string(other))),
        }
    }
    pairs
}

fn query_value_to_string(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Extract list-like collection items from payloads.
///
/// Extraction order:
/// 1. Use the explicit `path` if provided (a dotted path; `"."` is the root).
/// 2. Use a top-level array payload directly.
/// 3. Apply deterministic wrapper-key heuristics.
/// 4. Fall back to a single array-valued field in wrapper objects.
pub fn extract_collection_items(payload: &Value, path: Option<&str>) -> Option<Vec<Value>> {
    if let Some(path) = path {
        return value_at_path(payload, path).and_then(Value::as_array).cloned();
    }

    match payload {
        Value::Array(items) => Some(items.clone()),
        Value::Object(map) => {
            for key in RESPONSE_ARRAY_PRIORITY_KEYS {
                if let Some(Value::Array(items)) = map.get(*key) {
                    return Some(items.clone());
                }
            }

            let mut arrays = map.values().filter_map(|value| match value {
                Value::Array(items) => Some(items.clone()),
                _ => None,
            });
            let first = arrays.next()?;
            if arrays.next().is_none() {
                return Some(first);
            }
            None
        }
        _ => None,
    }
}
