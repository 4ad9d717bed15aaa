//! External services as seen by the pipeline.
//!
//! The pipeline talks to the fiscal authority and the enrichment service
//! through these traits, so either can be swapped for a scripted one.

use async_trait::async_trait;
use receiptflow_providers::enrichment::{
    EnrichedResult, EnrichmentClient, EnrichmentError, EnrichmentRequest, EnrichmentStream,
};
use receiptflow_providers::fiscal::{FiscalData, FiscalLookupClient, FiscalLookupError};
use tokio_util::sync::CancellationToken;

/// Source of canonical fiscal data.
#[async_trait]
pub trait FiscalSource: Send + Sync {
    /// Fetches the fiscal document for a raw QR payload.
    async fn lookup(&self, qr_raw: &str) -> Result<FiscalData, FiscalLookupError>;
}

/// Enrichment service.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Enriches in one call.
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichedResult, EnrichmentError>;

    /// Opens a streamed enrichment. Cancelling `cancel` stops the stream and
    /// releases its connection.
    async fn enrich_stream(
        &self,
        request: &EnrichmentRequest,
        cancel: &CancellationToken,
    ) -> Result<EnrichmentStream, EnrichmentError>;
}

#[async_trait]
impl FiscalSource for FiscalLookupClient {
    async fn lookup(&self, qr_raw: &str) -> Result<FiscalData, FiscalLookupError> {
        self.get_receipt_by_qr(qr_raw).await
    }
}

#[async_trait]
impl Enricher for EnrichmentClient {
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichedResult, EnrichmentError> {
        EnrichmentClient::enrich(self, request).await
    }

    async fn enrich_stream(
        &self,
        request: &EnrichmentRequest,
        cancel: &CancellationToken,
    ) -> Result<EnrichmentStream, EnrichmentError> {
        EnrichmentClient::enrich_stream(self, request, cancel).await
    }
}
