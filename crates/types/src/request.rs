//! Transport-neutral description of a list request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Search text and the remote column it targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchQuery {
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl FetchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            target: None,
        }
    }

    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    /// Empty (or whitespace-only) search text means "no filtering".
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty()
    }
}

/// A request handed to a transport.
///
/// `method` stays `None` unless the definition named one; transports apply
/// their own default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ListRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: Option<String>) -> Self {
        self.method = method;
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Stable cache identity: endpoint, method and serialized parameters.
    ///
    /// `serde_json::Map` keeps keys sorted, so equal parameter sets always
    /// serialize identically.
    pub fn cache_key(&self) -> String {
        let method = self.method.as_deref().map(str::to_ascii_uppercase).unwrap_or_else(|| "-".to_string());
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        let body = self
            .body
            .as_ref()
            .and_then(|body| serde_json::to_string(body).ok())
            .unwrap_or_default();
        format!("{method} {} {params} {body}", self.endpoint)
    }
}
