//! Fiscal lookup error types.

use receiptflow_fetch::HttpError;
use thiserror::Error;

/// Errors raised by the fiscal lookup.
#[derive(Debug, Error)]
pub enum FiscalLookupError {
    /// QR payload is missing one of the required keys.
    #[error("Invalid QR payload: {0}")]
    InvalidQr(String),

    /// Fiscal authority answered with an application error code.
    #[error("Fiscal API error code {code}: {message}")]
    Api {
        /// Response code.
        code: i64,
        /// Description of the code.
        message: String,
    },

    /// Transport failure or non-success status.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Response body could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Every credential attempt failed.
    #[error("Fiscal lookup failed after {attempts} attempt(s): {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: usize,
        /// Error of the final attempt.
        #[source]
        last: Box<FiscalLookupError>,
    },
}

impl FiscalLookupError {
    /// Returns true for failures that never reached the fiscal authority's
    /// application layer.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Http(e) => e.is_transport(),
            Self::Exhausted { last, .. } => last.is_transport(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for FiscalLookupError {
    fn from(e: serde_json::Error) -> Self {
        FiscalLookupError::Parse(e.to_string())
    }
}
