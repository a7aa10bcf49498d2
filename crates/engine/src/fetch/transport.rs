use async_trait::async_trait;
use lister_api::ListerClient;
use lister_types::ListRequest;
use lister_util::http::execute_list_request;
use reqwest::Method;
use serde_json::Value;

use crate::error::ListerError;

/// Sends list requests to a backend and returns the raw response payload.
///
/// The engine depends only on this seam; hosts can plug in any client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ListRequest) -> Result<Value, ListerError>;
}

/// `reqwest`-backed transport. Requests without a method use GET.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ListerClient,
    default_method: Method,
}

impl HttpTransport {
    pub fn new(client: ListerClient) -> Self {
        Self {
            client,
            default_method: Method::GET,
        }
    }

    /// Build a transport from `LISTER_API_BASE`/`LISTER_API_TOKEN`, optionally
    /// overriding the base URL.
    pub fn from_env(base_override: Option<&str>) -> anyhow::Result<Self> {
        Ok(Self::new(ListerClient::from_env(base_override)?))
    }

    pub fn with_default_method(mut self, method: Method) -> Self {
        self.default_method = method;
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ListRequest) -> Result<Value, ListerError> {
        execute_list_request(&self.client, request, &self.default_method)
            .await
            .map_err(ListerError::from)
    }
}

/// Transport that answers every request with an empty list.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn send(&self, _request: &ListRequest) -> Result<Value, ListerError> {
        Ok(Value::Array(Vec::new()))
    }
}
