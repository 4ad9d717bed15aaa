//! Fetch error types.

use thiserror::Error;

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error (connect, TLS, body read).
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Non-success HTTP status.
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },
}

impl HttpError {
    /// Returns true for transport-level failures (no HTTP answer received).
    pub fn is_transport(&self) -> bool {
        matches!(self, HttpError::Request(e) if e.is_connect() || e.is_timeout() || e.is_request())
    }
}

// ============================================================================
// Token Error
// ============================================================================

/// Error type for credential pool setup.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No credentials configured.
    #[error("Credential pool is empty")]
    EmptyPool,

    /// A credential is blank.
    #[error("Credential at index {0} is blank")]
    BlankCredential(usize),
}
