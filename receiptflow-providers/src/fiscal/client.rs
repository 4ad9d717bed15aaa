//! Fiscal lookup with credential failover.

use receiptflow_core::mask_credential;
use receiptflow_fetch::TokenManager;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::api::{FiscalApi, FiscalApiResponse, FiscalData};
use super::error::FiscalLookupError;
use super::parser::parse_qr_payload;

/// Default upper bound on attempts per lookup.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Looks up receipts at the fiscal authority, failing over between
/// credentials from a shared [`TokenManager`].
#[derive(Clone)]
pub struct FiscalLookupClient {
    api: Arc<dyn FiscalApi>,
    tokens: Arc<TokenManager>,
    max_attempts: usize,
}

impl std::fmt::Debug for FiscalLookupClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiscalLookupClient")
            .field("tokens", &self.tokens.len())
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl FiscalLookupClient {
    /// Creates a client with the default attempt bound.
    pub fn new(api: Arc<dyn FiscalApi>, tokens: Arc<TokenManager>) -> Self {
        Self {
            api,
            tokens,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets the upper bound on attempts per lookup.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Returns the shared credential pool.
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Returns the number of attempts a lookup makes: one per credential, at
    /// most the configured bound, at least one.
    pub fn attempts(&self) -> usize {
        self.tokens.len().min(self.max_attempts).max(1)
    }

    /// Fetches the canonical purchase document for a QR payload.
    ///
    /// Each attempt uses the manager's current credential. An application
    /// error code and a transport failure are both charged to that credential
    /// and the next attempt moves on to another one. After the last attempt
    /// the final error is returned wrapped in
    /// [`FiscalLookupError::Exhausted`].
    #[instrument(skip(self, qr_raw))]
    pub async fn get_receipt_by_qr(&self, qr_raw: &str) -> Result<FiscalData, FiscalLookupError> {
        if parse_qr_payload(qr_raw).is_none() {
            return Err(FiscalLookupError::InvalidQr(
                "missing one of t, s, fn, i, fp, n".to_string(),
            ));
        }

        let attempts = self.attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            let token = self.tokens.current_token();
            let masked = mask_credential(&token);
            debug!(attempt, token = %masked, "Fiscal lookup attempt");

            let outcome = self
                .api
                .check(qr_raw, &token)
                .await
                .and_then(FiscalApiResponse::into_fiscal_data);

            match outcome {
                Ok(data) => {
                    self.tokens.record_success(&token);
                    info!(attempt, items = data.document.items.len(), "Fiscal lookup succeeded");
                    return Ok(data);
                }
                Err(e) => {
                    warn!(attempt, token = %masked, error = %e, "Fiscal lookup attempt failed");
                    self.tokens.record_error(&token, &e.to_string());
                    self.tokens.advance_from(&token);
                    last_error = Some(e);
                }
            }
        }

        let last = last_error.unwrap_or_else(|| FiscalLookupError::Parse("no attempt made".to_string()));
        Err(FiscalLookupError::Exhausted {
            attempts,
            last: Box::new(last),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
