//! HTTP client utilities for list endpoints.
//!
//! This crate provides a lightweight client used by the Lister transport:
//!
//! - Constructing an HTTP client with sensible defaults
//! - Discovering the base URL from `LISTER_API_BASE` and a bearer token from `LISTER_API_TOKEN`
//! - Validating the base URL for safety
//! - Building requests with a consistent User-Agent and Accept headers
//!
//! # Example
//!
//! ```ignore
//! use lister_api::ListerClient;
//!
//! let client = ListerClient::from_env(None)?;
//! let response = client.request(reqwest::Method::GET, "/users").send().await?;
//! println!("status: {}", response.status());
//! ```

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use reqwest::{Client, RequestBuilder, Url, header};
use tracing::debug;

/// Environment variable holding the API base URL.
pub const API_BASE_ENV: &str = "LISTER_API_BASE";
/// Environment variable holding a bearer token sent with every request.
pub const API_TOKEN_ENV: &str = "LISTER_API_TOKEN";
/// Base URL used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Hostnames allowed to use plain HTTP.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1", "[::1]"];

#[derive(Debug, Clone)]
/// Thin wrapper around a configured `reqwest::Client`.
///
/// The client pre-configures default headers and resolves request paths
/// against a validated base URL. Absolute URLs bypass the base URL.
pub struct ListerClient {
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl ListerClient {
    /// Build a client for `base_url` sending `headers` with every request.
    pub fn new(base_url: &str, headers: &IndexMap<String, String>) -> Result<Self> {
        validate_base_url(base_url)?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        for (name, value) in headers {
            let header_name = header::HeaderName::from_bytes(name.as_bytes()).with_context(|| format!("invalid header name '{name}'"))?;
            let header_value = header::HeaderValue::from_str(value).with_context(|| format!("invalid value for header '{name}'"))?;
            default_headers.insert(header_name, header_value);
        }

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            user_agent: format!("lister/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    /// Construct a client from `LISTER_API_BASE` and `LISTER_API_TOKEN`.
    ///
    /// `base_override` wins over the environment when provided.
    pub fn from_env(base_override: Option<&str>) -> Result<Self> {
        let base_url = base_override
            .map(str::to_string)
            .or_else(|| env::var(API_BASE_ENV).ok())
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut headers = IndexMap::new();
        if let Ok(token) = env::var(API_TOKEN_ENV)
            && !token.trim().is_empty()
        {
            headers.insert(header::AUTHORIZATION.as_str().to_string(), format!("Bearer {}", token.trim()));
        }
        Self::new(&base_url, &headers)
    }

    /// Build a `reqwest::RequestBuilder` for a method and an API-relative path.
    pub fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = self.resolve_url(path);
        debug!(%url, %method, "building request");

        self.http.request(method, url).header(header::USER_AGENT, &self.user_agent)
    }

    fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost`, `127.0.0.1` or `[::1]`: `http` or `https`
/// - otherwise: scheme must be HTTPS
fn validate_base_url(base: &str) -> Result<()> {
    let parsed_base_url = Url::parse(base).map_err(|e| anyhow!("Invalid {} URL '{}': {}", API_BASE_ENV, base, e))?;

    let host_name = parsed_base_url
        .host_str()
        .ok_or_else(|| anyhow!("{} must include a host", API_BASE_ENV))?;

    let scheme = parsed_base_url.scheme();
    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        if scheme == "http" || scheme == "https" {
            return Ok(());
        }
        return Err(anyhow!("{} must use http or https; got '{}://'", API_BASE_ENV, scheme));
    }

    if scheme != "https" {
        return Err(anyhow!(
            "{} must use https for non-localhost hosts; got '{}://'",
            API_BASE_ENV,
            scheme
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_base_url_rules() {
        assert!(validate_base_url("http://localhost:8080").is_ok());
        assert!(validate_base_url("https://api.example.com").is_ok());
        assert!(validate_base_url("http://api.example.com").is_err());
        assert!(validate_base_url("ftp://localhost").is_err());
        assert!(validate_base_url("not a url").is_err());
    }

    #[test]
    fn resolve_url_joins_relative_paths_and_keeps_absolute_urls() {
        let client = ListerClient::new("https://api.example.com/", &IndexMap::new()).expect("client");
        assert_eq!(client.resolve_url("/users"), "https://api.example.com/users");
        assert_eq!(client.resolve_url("users"), "https://api.example.com/users");
        assert_eq!(client.resolve_url("https://other.example.com/x"), "https://other.example.com/x");
    }

    #[test]
    fn from_env_prefers_override_then_environment() {
        temp_env::with_vars(
            [(API_BASE_ENV, Some("https://env.example.com")), (API_TOKEN_ENV, Some("secret-token"))],
            || {
                let client = ListerClient::from_env(None).expect("client from env");
                assert_eq!(client.base_url, "https://env.example.com");

                let overridden = ListerClient::from_env(Some("http://localhost:9000")).expect("client with override");
                assert_eq!(overridden.base_url, "http://localhost:9000");
            },
        );
    }

    #[test]
    fn invalid_header_names_are_rejected() {
        let mut headers = IndexMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        assert!(ListerClient::new("http://localhost", &headers).is_err());
    }
}
