//! Enrichment error types.

use receiptflow_fetch::HttpError;
use thiserror::Error;

/// Errors raised by the enrichment client.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(HttpError),

    /// Service answered with a non-success status.
    #[error("Enrichment service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// Response could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Service reported a failure through an `error` event.
    #[error("Enrichment failed: {0}")]
    Remote(String),

    /// Stream closed before a `completed` event.
    #[error("Enrichment stream ended without a result")]
    StreamEnded,

    /// Consumer went away or the caller cancelled.
    #[error("Enrichment cancelled")]
    Cancelled,

    /// Image payload is not valid base64.
    #[error("Invalid image payload: {0}")]
    InvalidImage(String),
}

impl From<HttpError> for EnrichmentError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Status { status, body } => EnrichmentError::Status { status, body },
            other => EnrichmentError::Http(other),
        }
    }
}

impl From<reqwest::Error> for EnrichmentError {
    fn from(e: reqwest::Error) -> Self {
        EnrichmentError::Http(HttpError::Request(e))
    }
}

impl From<serde_json::Error> for EnrichmentError {
    fn from(e: serde_json::Error) -> Self {
        EnrichmentError::Parse(e.to_string())
    }
}
