//! # HTTP Retrieval Utilities
//!
//! This module provides an asynchronous API client wrapper around `reqwest`.
//! It includes middleware support for exponential backoff retries and keeps
//! the raw response status next to the decoded body, so that API-specific
//! clients can interpret error envelopes themselves.

use std::time::Duration;

use reqwest::{header::HeaderMap, Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;

/// A standardized container for API responses.
///
/// Wraps the deserialized data along with metadata about the HTTP
/// transaction. Non-2xx responses are not errors at this layer.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if the request succeeded.
    pub data: Option<T>,
    /// The raw body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`, it handles base URLs, query
/// parameters that must accompany every request (API keys) and automatic
/// retries of transient failures.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    /// Query parameters appended to every request.
    default_query: Vec<(String, String)>,
}

impl ApiClient {
    /// Creates a new `ApiClient` with a retry policy of 3 attempts.
    ///
    /// # Arguments
    /// * `base_url` - The absolute base URL, ending in `/` (e.g. "https://api.example.com/2.3/").
    /// * `default_query` - Parameters sent with every request.
    ///
    /// # Errors
    /// Fails if `base_url` is not an absolute URL or the TLS backend cannot be initialised.
    pub fn new(base_url: &str, default_query: Vec<(String, String)>) -> anyhow::Result<Self> {
        let url = Url::parse(base_url)?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("stackwatch/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;

        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
            default_query,
        })
    }

    /// The base URL all request paths are joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Performs an HTTP request and decodes a JSON body on success.
    ///
    /// # Arguments
    /// * `method` - The HTTP verb.
    /// * `path` - The relative path to append to the base URL.
    /// * `query` - Request-specific query parameters.
    /// * `headers` - Optional additional headers for this request.
    ///
    /// # Errors
    /// Returns an `anyhow::Error` wrapping the transport error when the
    /// request cannot be executed, or a `serde_json::Error` when a 2xx body
    /// cannot be decoded into `T`.
    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        headers: Option<HeaderMap>,
    ) -> anyhow::Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
    {
        let full_url = self.base_url.join(path)?;
        let mut req = self.inner.request(method, full_url);

        if !self.default_query.is_empty() {
            req = req.query(&self.default_query);
        }
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(h) = headers {
            req = req.headers(h);
        }

        let response: reqwest::Response = req.send().await?;
        let status = response.status();
        let resp_headers = response.headers().clone();
        let success = status.is_success();
        let text = response.text().await?;

        if success {
            log::trace!("Decoding response from {}: {}", path, text);
            let data = serde_json::from_str::<T>(&text)?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers: resp_headers,
            })
        } else {
            Ok(ApiResponse {
                data: None,
                error_body: Some(text),
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            })
        }
    }
}
