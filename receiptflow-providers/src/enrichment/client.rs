//! Enrichment service client.
//!
//! # API Endpoints
//!
//! ```text
//! POST <base>/v1/enrich          -> application/json (EnrichedResult)
//! POST <base>/v1/enrich/stream   -> text/event-stream
//! Authorization: Bearer <api key>   (optional)
//! ```

use receiptflow_fetch::{HttpClient, ResponseExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::EnrichmentError;
use super::events::{EnrichmentEvent, EnrichmentEventKind};
use super::request::EnrichmentRequest;
use super::response::EnrichedResult;
use super::stream::{EnrichmentStream, decode_event_stream, ready_stream};

// ============================================================================
// Constants
// ============================================================================

/// One-shot endpoint.
pub const ENRICH_ENDPOINT: &str = "/v1/enrich";

/// Streaming endpoint.
pub const ENRICH_STREAM_ENDPOINT: &str = "/v1/enrich/stream";

/// Default timeout of the one-shot call.
pub const DEFAULT_ENRICHMENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default capacity of the event channel between decoder and consumer.
pub const DEFAULT_STREAM_BUFFER: usize = 32;

// ============================================================================
// Client
// ============================================================================

/// Client for the enrichment service.
#[derive(Debug, Clone)]
pub struct EnrichmentClient {
    oneshot: HttpClient,
    streaming: HttpClient,
    enrich_url: Url,
    stream_url: Url,
    stream_buffer: usize,
}

impl EnrichmentClient {
    /// Creates a client for the given base URL.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EnrichmentError> {
        Ok(Self {
            oneshot: HttpClient::with_timeout(timeout)?.with_bearer(api_key.clone()),
            streaming: HttpClient::streaming()?.with_bearer(api_key),
            enrich_url: HttpClient::endpoint(base_url, ENRICH_ENDPOINT)?,
            stream_url: HttpClient::endpoint(base_url, ENRICH_STREAM_ENDPOINT)?,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        })
    }

    /// Sets the event channel capacity of streamed calls.
    #[must_use]
    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity.max(1);
        self
    }

    /// Returns the one-shot endpoint.
    pub fn enrich_url(&self) -> &Url {
        &self.enrich_url
    }

    /// Returns the streaming endpoint.
    pub fn stream_url(&self) -> &Url {
        &self.stream_url
    }

    /// Enriches a receipt in one request. Any non-success status is an error.
    #[instrument(skip(self, request), fields(kind = request.kind()))]
    pub async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichedResult, EnrichmentError> {
        let response = self
            .oneshot
            .post_json(&self.enrich_url, request)
            .await?
            .ensure_success()
            .await?;

        let body = response.text().await?;
        debug!(bytes = body.len(), "Enrichment response received");

        let result: EnrichedResult = serde_json::from_str(&body)?;
        info!(items = result.items.len(), "Enrichment completed");
        Ok(result)
    }

    /// Opens a streamed enrichment.
    ///
    /// Every call issues a new request. Cancelling `cancel` aborts the
    /// request if it is still pending and otherwise stops the decoder and
    /// closes the connection. A service that answers with plain JSON instead
    /// of an event stream is surfaced as a single `completed` event.
    #[instrument(skip(self, request, cancel), fields(kind = request.kind()))]
    pub async fn enrich_stream(
        &self,
        request: &EnrichmentRequest,
        cancel: &CancellationToken,
    ) -> Result<EnrichmentStream, EnrichmentError> {
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(EnrichmentError::Cancelled),
            response = self.streaming.post_json_event_stream(&self.stream_url, request) => response?,
        };
        // An error body is read without a total timeout, so it must race the
        // token as well.
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(EnrichmentError::Cancelled),
            response = response.ensure_success() => response?,
        };

        if response.is_event_stream() {
            debug!("Consuming enrichment event stream");
            return Ok(decode_event_stream(
                response.bytes_stream(),
                self.stream_buffer,
                cancel,
            ));
        }

        warn!("Enrichment service answered without an event stream");
        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(EnrichmentError::Cancelled),
            body = response.text() => body?,
        };
        let result: serde_json::Value = serde_json::from_str(&body)?;
        Ok(ready_stream(
            vec![EnrichmentEvent::new(EnrichmentEventKind::Completed, result)],
            cancel,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_resolve_against_base() {
        let client = EnrichmentClient::new(
            "http://localhost:8080/api",
            Some("key".to_string()),
            DEFAULT_ENRICHMENT_TIMEOUT,
        )
        .unwrap();

        assert_eq!(client.enrich_url().as_str(), "http://localhost:8080/api/v1/enrich");
        assert_eq!(
            client.stream_url().as_str(),
            "http://localhost:8080/api/v1/enrich/stream"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = EnrichmentClient::new("not a url", None, DEFAULT_ENRICHMENT_TIMEOUT).unwrap_err();
        assert!(matches!(err, EnrichmentError::Http(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let client = EnrichmentClient::new("http://127.0.0.1:9", None, DEFAULT_ENRICHMENT_TIMEOUT)
            .unwrap()
            .with_stream_buffer(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = EnrichmentRequest::Image {
            image: "aGVsbG8=".to_string(),
            mime_type: "image/jpeg".to_string(),
        };
        let err = client.enrich_stream(&request, &cancel).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_stalled_error_body() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            // Announces more body than it ever sends.
            socket
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 1000\r\n\r\npartial")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let client =
            EnrichmentClient::new(&format!("http://{addr}"), None, DEFAULT_ENRICHMENT_TIMEOUT).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let request = EnrichmentRequest::Image {
            image: "aGVsbG8=".to_string(),
            mime_type: "image/jpeg".to_string(),
        };
        let outcome = tokio::time::timeout(
            Duration::from_secs(3),
            client.enrich_stream(&request, &cancel),
        )
        .await
        .expect("enrich_stream ignored cancellation");

        assert!(matches!(outcome, Err(EnrichmentError::Cancelled)));
        server.abort();
    }
}
