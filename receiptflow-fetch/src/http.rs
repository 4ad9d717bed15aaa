//! HTTP client with tracing and endpoint helpers.
//!
//! This module provides a wrapped HTTP client that adds:
//! - Request/response tracing
//! - Optional bearer authentication
//! - Endpoint resolution against a configured base URL
//! - Event-stream requests for incrementally delivered responses

use reqwest::{Client, Response, header};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::HttpError;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connect timeout for streamed requests.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Longest response body kept in a status error.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// User agent string for ReceiptFlow.
const USER_AGENT: &str = concat!("ReceiptFlow/", env!("CARGO_PKG_VERSION"));

/// MIME type of a server-sent event stream.
pub const EVENT_STREAM_MIME: &str = "text/event-stream";

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    bearer: Option<String>,
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with a total request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            inner: client,
            bearer: None,
        })
    }

    /// Creates a client for long-lived streamed responses.
    ///
    /// Only the connect phase is bounded; the body may take as long as the
    /// server keeps producing events.
    pub fn streaming() -> Result<Self, HttpError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            inner: client,
            bearer: None,
        })
    }

    /// Attaches a bearer credential sent with every request.
    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Resolves `path` against `base_url`.
    pub fn endpoint(base_url: &str, path: &str) -> Result<Url, HttpError> {
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)
        } else {
            Url::parse(&format!("{base_url}/"))
        }
        .map_err(|e| HttpError::InvalidUrl(format!("{base_url}: {e}")))?;

        base.join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::InvalidUrl(format!("{path}: {e}")))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Performs a POST request with form data.
    #[instrument(skip(self, form), fields(url = %url))]
    pub async fn post_form<T: serde::Serialize + ?Sized>(
        &self,
        url: &Url,
        form: &T,
    ) -> Result<Response, HttpError> {
        debug!("POST request with form data");

        let response = self
            .authorize(self.inner.post(url.clone()))
            .form(form)
            .send()
            .await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a POST request with a JSON body.
    #[instrument(skip(self, body), fields(url = %url))]
    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &Url,
        body: &T,
    ) -> Result<Response, HttpError> {
        debug!("POST request with JSON");

        let response = self
            .authorize(self.inner.post(url.clone()))
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a POST request with a JSON body, asking for an event stream.
    #[instrument(skip(self, body), fields(url = %url))]
    pub async fn post_json_event_stream<T: serde::Serialize + ?Sized>(
        &self,
        url: &Url,
        body: &T,
    ) -> Result<Response, HttpError> {
        debug!("POST request for event stream");

        let response = self
            .authorize(self.inner.post(url.clone()))
            .header(header::ACCEPT, EVENT_STREAM_MIME)
            .header(header::CACHE_CONTROL, "no-cache")
            .json(body)
            .send()
            .await?;
        debug!(status = %response.status(), "Stream response received");
        Ok(response)
    }

    /// Returns the inner reqwest client for advanced operations.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

// ============================================================================
// Response Extensions
// ============================================================================

/// Extension trait for Response handling.
#[allow(async_fn_in_trait)]
pub trait ResponseExt: Sized {
    /// Turns a non-success status into [`HttpError::Status`], keeping a
    /// truncated copy of the body.
    async fn ensure_success(self) -> Result<Self, HttpError>;

    /// Returns true if the response announces an event stream.
    fn is_event_stream(&self) -> bool;
}

impl ResponseExt for Response {
    async fn ensure_success(self) -> Result<Self, HttpError> {
        let status = self.status();
        if status.is_success() {
            return Ok(self);
        }

        let body = self.text().await.unwrap_or_default();
        Err(HttpError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        })
    }

    fn is_event_stream(&self) -> bool {
        self.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with(EVENT_STREAM_MIME))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let url = HttpClient::endpoint("https://proverkacheka.com", "/api/v1/check/get").unwrap();
        assert_eq!(url.as_str(), "https://proverkacheka.com/api/v1/check/get");

        let url = HttpClient::endpoint("https://enrich.local/v2/", "enrich").unwrap();
        assert_eq!(url.as_str(), "https://enrich.local/v2/enrich");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let url = HttpClient::endpoint("http://localhost:8080/api", "receipts/enrich/stream").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/receipts/enrich/stream");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpClient::endpoint("not a url", "/x");
        assert!(matches!(result, Err(HttpError::InvalidUrl(_))));
    }

    #[test]
    fn test_blank_bearer_is_dropped() {
        let client = HttpClient::new().unwrap().with_bearer(Some("   ".to_string()));
        assert!(client.bearer.is_none());
    }
}
