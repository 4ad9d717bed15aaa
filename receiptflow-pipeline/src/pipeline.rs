//! Receipt ingestion orchestrator.
//!
//! Per invocation:
//!
//! ```text
//! start -> dedup hit (done)
//!       -> fiscal lookup -> store baseline (processing) -> enrich -> enriched
//!                                                               -> failed, baseline kept
//! ```
//!
//! QR receipts are keyed by their fiscal identity. A stored receipt that is
//! already enriched is returned without any external call. One that never
//! reached `enriched` is resumed from its stored fiscal data. Image receipts
//! have no identity: a row is created before enrichment is attempted.

use chrono::Utc;
use receiptflow_core::{
    CoreError, DEFAULT_ERROR_MESSAGE_LIMIT, NewReceipt, Receipt, ReceiptItem, ReceiptRepository,
    ReceiptSource, ReceiptStatus, truncate_message,
};
use receiptflow_fetch::{EventSink, EventStream, event_channel};
use receiptflow_providers::enrichment::{
    DEFAULT_STREAM_BUFFER, EnrichedResult, EnrichmentError, EnrichmentEventKind,
    EnrichmentRequest, ImagePayload,
};
use receiptflow_providers::fiscal::{FiscalData, parse_qr_payload};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::PipelineError;
use crate::events::{ErrorStage, PipelineEvent, ProcessedReceipt};
use crate::sources::{Enricher, FiscalSource};

/// Lazy, finite sequence of pipeline events. Dropping it cancels the
/// invocation.
pub type PipelineStream = EventStream<PipelineEvent>;

// ============================================================================
// Settings
// ============================================================================

/// Pipeline tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Longest error message stored on a receipt, in characters.
    pub error_message_limit: usize,
    /// Capacity of streamed event channels.
    pub stream_buffer: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            error_message_limit: DEFAULT_ERROR_MESSAGE_LIMIT,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }
}

// ============================================================================
// Internal States
// ============================================================================

/// Outcome of the steps before enrichment.
enum Prepared {
    /// Already enriched; nothing to do.
    Cached {
        receipt: Receipt,
        items: Vec<ReceiptItem>,
    },
    /// Baseline stored, ready for enrichment.
    Ready(Baseline),
}

/// A receipt in `processing` with its fallback items.
struct Baseline {
    receipt: Receipt,
    items: Vec<ReceiptItem>,
    request: EnrichmentRequest,
    resumed: bool,
}

/// How a relayed enrichment stream ended.
enum RelayOutcome {
    Completed(EnrichedResult),
    Failed(EnrichmentError),
    /// Consumer went away; stored state is left as is.
    Aborted,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Orchestrates fiscal lookup, persistence and enrichment of receipts.
#[derive(Clone)]
pub struct ReceiptPipeline {
    repo: Arc<dyn ReceiptRepository>,
    fiscal: Arc<dyn FiscalSource>,
    enricher: Arc<dyn Enricher>,
    settings: PipelineSettings,
}

impl std::fmt::Debug for ReceiptPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptPipeline")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ReceiptPipeline {
    /// Creates a pipeline with default settings.
    pub fn new(
        repo: Arc<dyn ReceiptRepository>,
        fiscal: Arc<dyn FiscalSource>,
        enricher: Arc<dyn Enricher>,
    ) -> Self {
        Self {
            repo,
            fiscal,
            enricher,
            settings: PipelineSettings::default(),
        }
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns the settings.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    // ------------------------------------------------------------------------
    // One-shot
    // ------------------------------------------------------------------------

    /// Processes a fiscal QR payload.
    ///
    /// A malformed payload or a failed fiscal lookup is an error and leaves
    /// no trace in the repository. An enrichment failure is not: the receipt
    /// is stored as `failed` with its fiscal items and returned with
    /// `enriched == false`.
    #[instrument(skip(self, qr_raw))]
    pub async fn process_qr(&self, owner: &str, qr_raw: &str) -> Result<ProcessedReceipt, PipelineError> {
        let baseline = match self.prepare_qr(owner, qr_raw).await? {
            Prepared::Cached { receipt, items } => {
                info!(receipt_id = %receipt.id, "Dedup hit, returning stored receipt");
                return Ok(ProcessedReceipt {
                    receipt,
                    items,
                    enriched: true,
                });
            }
            Prepared::Ready(baseline) => baseline,
        };

        self.enrich_once(baseline).await
    }

    /// Processes a base64 image, raw or as a data URL.
    ///
    /// The receipt row is created before enrichment is attempted. An
    /// enrichment failure leaves it `failed`, usually without items.
    #[instrument(skip(self, image))]
    pub async fn process_image(&self, owner: &str, image: &str) -> Result<ProcessedReceipt, PipelineError> {
        let baseline = self.prepare_image(owner, image).await?;
        self.enrich_once(baseline).await
    }

    async fn enrich_once(&self, baseline: Baseline) -> Result<ProcessedReceipt, PipelineError> {
        let Baseline {
            receipt,
            items,
            request,
            ..
        } = baseline;

        match self.enricher.enrich(&request).await {
            Ok(result) => {
                let (receipt, items) = self.apply_enrichment(receipt, items, &result).await?;
                Ok(ProcessedReceipt {
                    receipt,
                    items,
                    enriched: true,
                })
            }
            Err(e) => {
                warn!(receipt_id = %receipt.id, error = %e, "Enrichment failed, keeping fallback items");
                let (receipt, items) = self.apply_failure(receipt, items, &e.to_string()).await?;
                Ok(ProcessedReceipt {
                    receipt,
                    items,
                    enriched: false,
                })
            }
        }
    }

    // ------------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------------

    /// Streamed form of [`process_qr`](Self::process_qr).
    ///
    /// Emits `started`, then either a cached `completed`, or `fns_fetched`
    /// followed by the relayed enrichment events and a final `completed`.
    /// Any failure ends the stream with a single `error` event. Cancelling
    /// `cancel` or dropping the stream stops the work in flight; whatever
    /// was stored up to that point stays.
    pub fn process_qr_stream(
        &self,
        owner: &str,
        qr_raw: &str,
        cancel: &CancellationToken,
    ) -> PipelineStream {
        let (sink, stream) = event_channel(self.settings.stream_buffer, cancel);
        let pipeline = self.clone();
        let owner = owner.to_string();
        let qr_raw = qr_raw.to_string();

        tokio::spawn(async move {
            pipeline.run_qr_stream(&owner, &qr_raw, &sink).await;
        });
        stream
    }

    /// Streamed form of [`process_image`](Self::process_image).
    pub fn process_image_stream(
        &self,
        owner: &str,
        image: &str,
        cancel: &CancellationToken,
    ) -> PipelineStream {
        let (sink, stream) = event_channel(self.settings.stream_buffer, cancel);
        let pipeline = self.clone();
        let owner = owner.to_string();
        let image = image.to_string();

        tokio::spawn(async move {
            pipeline.run_image_stream(&owner, &image, &sink).await;
        });
        stream
    }

    #[instrument(skip(self, qr_raw, sink))]
    async fn run_qr_stream(&self, owner: &str, qr_raw: &str, sink: &EventSink<PipelineEvent>) {
        if !sink
            .send(PipelineEvent::Started {
                source: ReceiptSource::Qr,
            })
            .await
        {
            return;
        }

        let prepared = tokio::select! {
            biased;
            () = sink.cancelled() => return,
            prepared = self.prepare_qr(owner, qr_raw) => prepared,
        };

        let baseline = match prepared {
            Ok(Prepared::Cached { receipt, items }) => {
                info!(receipt_id = %receipt.id, "Dedup hit, returning stored receipt");
                sink.send(PipelineEvent::Completed {
                    receipt,
                    items,
                    cached: true,
                })
                .await;
                return;
            }
            Ok(Prepared::Ready(baseline)) => baseline,
            Err(e) => {
                warn!(stage = ?e.stage(), error = %e, "QR stream failed before enrichment");
                sink.send(PipelineEvent::error(e.stage(), e.to_string())).await;
                return;
            }
        };

        let fetched = PipelineEvent::FnsFetched {
            receipt_id: baseline.receipt.id,
            resumed: baseline.resumed,
            items: baseline.items.clone(),
            total: baseline.receipt.total,
        };
        if !sink.send(fetched).await {
            return;
        }

        self.relay_and_finish(baseline, sink).await;
    }

    #[instrument(skip(self, image, sink))]
    async fn run_image_stream(&self, owner: &str, image: &str, sink: &EventSink<PipelineEvent>) {
        if !sink
            .send(PipelineEvent::Started {
                source: ReceiptSource::Image,
            })
            .await
        {
            return;
        }

        match self.prepare_image(owner, image).await {
            Ok(baseline) => self.relay_and_finish(baseline, sink).await,
            Err(e) => {
                warn!(stage = ?e.stage(), error = %e, "Image stream failed before enrichment");
                sink.send(PipelineEvent::error(e.stage(), e.to_string())).await;
            }
        }
    }

    /// Relays enrichment and stores its outcome, ending the stream with
    /// `completed` or `error`.
    async fn relay_and_finish(&self, baseline: Baseline, sink: &EventSink<PipelineEvent>) {
        let Baseline {
            receipt,
            items,
            request,
            ..
        } = baseline;

        match self.relay_enrichment(&request, sink).await {
            RelayOutcome::Completed(result) => {
                match self.apply_enrichment(receipt, items, &result).await {
                    Ok((receipt, items)) => {
                        sink.send(PipelineEvent::Completed {
                            receipt,
                            items,
                            cached: false,
                        })
                        .await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Storing enrichment failed");
                        sink.send(PipelineEvent::error(e.stage(), e.to_string())).await;
                    }
                }
            }
            RelayOutcome::Failed(error) => {
                warn!(receipt_id = %receipt.id, error = %error, "Enrichment stream failed, keeping fallback items");
                if let Err(e) = self.apply_failure(receipt, items, &error.to_string()).await {
                    warn!(error = %e, "Storing enrichment failure failed");
                }
                sink.send(PipelineEvent::error(ErrorStage::Enrichment, error.to_string()))
                    .await;
            }
            RelayOutcome::Aborted => {
                debug!(receipt_id = %receipt.id, "Stream consumer gone, stopping");
            }
        }
    }

    /// Consumes the enrichment stream, forwarding content events.
    async fn relay_enrichment(
        &self,
        request: &EnrichmentRequest,
        sink: &EventSink<PipelineEvent>,
    ) -> RelayOutcome {
        let opened = tokio::select! {
            biased;
            () = sink.cancelled() => return RelayOutcome::Aborted,
            opened = self.enricher.enrich_stream(request, sink.token()) => opened,
        };
        let mut upstream = match opened {
            Ok(stream) => stream,
            Err(EnrichmentError::Cancelled) => return RelayOutcome::Aborted,
            Err(e) => return RelayOutcome::Failed(e),
        };

        let mut partial = EnrichedResult::default();
        loop {
            let next = tokio::select! {
                biased;
                () = sink.cancelled() => return RelayOutcome::Aborted,
                next = upstream.next_event() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(EnrichmentError::Cancelled)) => return RelayOutcome::Aborted,
                Some(Err(e)) => return RelayOutcome::Failed(e),
                None if sink.is_cancelled() => return RelayOutcome::Aborted,
                None => return RelayOutcome::Failed(EnrichmentError::StreamEnded),
            };

            partial.absorb(&event);
            let relayed = match event.kind {
                EnrichmentEventKind::Item => PipelineEvent::Item(event.data),
                EnrichmentEventKind::Place => PipelineEvent::Place(event.data),
                EnrichmentEventKind::Receipt => PipelineEvent::Receipt(event.data),
                EnrichmentEventKind::Language => PipelineEvent::Language(event.data),
                EnrichmentEventKind::Warning => PipelineEvent::Warning(event.data),
                EnrichmentEventKind::Completed => {
                    return RelayOutcome::Completed(partial.complete(&event.data));
                }
                EnrichmentEventKind::Error => {
                    return RelayOutcome::Failed(EnrichmentError::Remote(event.error_message()));
                }
                // The pipeline announces its own start; keepalives never reach here.
                EnrichmentEventKind::Started | EnrichmentEventKind::Ping => continue,
            };

            if !sink.send(relayed).await {
                return RelayOutcome::Aborted;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------------

    /// Validates the payload, checks for a stored receipt and, if needed,
    /// fetches fiscal data and stores the baseline.
    async fn prepare_qr(&self, owner: &str, qr_raw: &str) -> Result<Prepared, PipelineError> {
        let payload = parse_qr_payload(qr_raw).ok_or_else(|| {
            PipelineError::Format("QR payload is missing one of t, s, fn, i, fp, n".to_string())
        })?;
        let identity = payload.identity();

        let existing = self.repo.find_by_fiscal_signature(&identity).await?;
        if let Some(receipt) = &existing {
            if receipt.is_enriched() {
                let items = self.repo.get_items(receipt.id).await?;
                return Ok(Prepared::Cached {
                    receipt: receipt.clone(),
                    items,
                });
            }
        }

        if let Some(receipt) = existing {
            if let Some(fiscal) = stored_fiscal(&receipt) {
                info!(receipt_id = %receipt.id, status = %receipt.status, "Resuming from stored fiscal data");
                return Ok(Prepared::Ready(self.resume(receipt, &fiscal).await?));
            }
            // A row without usable fiscal data gets fresh data instead of a
            // second row.
            let fiscal = self.fiscal.lookup(qr_raw).await?;
            return Ok(Prepared::Ready(self.refresh(receipt, fiscal).await?));
        }

        let fiscal = self.fiscal.lookup(qr_raw).await?;

        let document = &fiscal.document;
        let mut new = NewReceipt::new(owner, ReceiptSource::Qr, ReceiptStatus::Processing);
        new.fiscal = Some(identity);
        new.merchant_name = document.merchant_name().map(str::to_string);
        new.merchant_address = document.retail_place_address.clone();
        new.total = document
            .total_sum
            .or_else(|| payload.total_minor_units())
            .unwrap_or_else(|| document.total());
        new.purchased_at = document.purchased_at().or_else(|| payload.issued_at());
        new.raw_fiscal = Some(fiscal.raw.clone());

        let receipt = self.repo.create(new).await?;
        let items = self
            .repo
            .create_items(receipt.id, document.baseline_items())
            .await?;
        info!(receipt_id = %receipt.id, items = items.len(), "Stored fiscal baseline");

        Ok(Prepared::Ready(Baseline {
            receipt,
            items,
            request: EnrichmentRequest::from_fiscal(document),
            resumed: false,
        }))
    }

    async fn resume(&self, mut receipt: Receipt, fiscal: &FiscalData) -> Result<Baseline, PipelineError> {
        receipt.status = ReceiptStatus::Processing;
        let receipt = self.repo.update(&receipt).await?;

        let mut items = self.repo.get_items(receipt.id).await?;
        if items.is_empty() {
            items = self
                .repo
                .create_items(receipt.id, fiscal.document.baseline_items())
                .await?;
        }

        Ok(Baseline {
            receipt,
            items,
            request: EnrichmentRequest::from_fiscal(&fiscal.document),
            resumed: true,
        })
    }

    async fn refresh(&self, mut receipt: Receipt, fiscal: FiscalData) -> Result<Baseline, PipelineError> {
        let document = &fiscal.document;
        receipt.status = ReceiptStatus::Processing;
        receipt.raw_fiscal = Some(fiscal.raw.clone());
        if receipt.merchant_name.is_none() {
            receipt.merchant_name = document.merchant_name().map(str::to_string);
        }
        if receipt.total == 0 {
            receipt.total = document.total();
        }
        let receipt = self.repo.update(&receipt).await?;

        self.repo.delete_items(receipt.id).await?;
        let items = self
            .repo
            .create_items(receipt.id, document.baseline_items())
            .await?;

        Ok(Baseline {
            receipt,
            items,
            request: EnrichmentRequest::from_fiscal(document),
            resumed: false,
        })
    }

    /// Validates the image and creates its receipt row.
    async fn prepare_image(&self, owner: &str, image: &str) -> Result<Baseline, PipelineError> {
        let payload = ImagePayload::parse(image).map_err(|e| PipelineError::Format(e.to_string()))?;
        debug!(bytes = payload.decoded_len, mime = %payload.mime_type, "Image accepted");

        let receipt = self
            .repo
            .create(NewReceipt::new(owner, ReceiptSource::Image, ReceiptStatus::Processing))
            .await?;
        info!(receipt_id = %receipt.id, "Created image receipt");

        Ok(Baseline {
            receipt,
            items: Vec::new(),
            request: EnrichmentRequest::from_image(&payload),
            resumed: false,
        })
    }

    /// Stores an enrichment result and marks the receipt `enriched`.
    ///
    /// Items are merged by position when the counts match and replaced
    /// otherwise. An empty result keeps the current items.
    async fn apply_enrichment(
        &self,
        mut receipt: Receipt,
        mut items: Vec<ReceiptItem>,
        result: &EnrichedResult,
    ) -> Result<(Receipt, Vec<ReceiptItem>), PipelineError> {
        if result.items.is_empty() {
            debug!(receipt_id = %receipt.id, "Enrichment returned no items, keeping current ones");
        } else if result.items.len() == items.len() {
            for (item, enriched) in items.iter_mut().zip(&result.items) {
                enriched.merge_into(item);
            }
            self.repo.update_items(&items).await?;
        } else {
            debug!(
                receipt_id = %receipt.id,
                stored = items.len(),
                enriched = result.items.len(),
                "Item counts differ, replacing items"
            );
            self.repo.delete_items(receipt.id).await?;
            self.repo
                .create_items(receipt.id, result.to_new_items())
                .await?;
        }

        if let Some(place) = &result.place {
            if receipt.merchant_name.is_none() {
                receipt.merchant_name.clone_from(&place.name);
            }
            if receipt.merchant_address.is_none() {
                receipt.merchant_address.clone_from(&place.address);
            }
        }
        if receipt.source == ReceiptSource::Image {
            receipt.total = result.total();
        }

        receipt.status = ReceiptStatus::Enriched;
        receipt.enrichment = Some(serde_json::to_value(result).map_err(CoreError::from)?);
        receipt.enriched_at = Some(Utc::now());
        receipt.last_error = None;

        let receipt = self.repo.update(&receipt).await?;
        let items = self.repo.get_items(receipt.id).await?;
        info!(receipt_id = %receipt.id, items = items.len(), "Receipt enriched");
        Ok((receipt, items))
    }

    /// Marks the receipt `failed`, keeping or restoring fallback items.
    async fn apply_failure(
        &self,
        mut receipt: Receipt,
        mut items: Vec<ReceiptItem>,
        message: &str,
    ) -> Result<(Receipt, Vec<ReceiptItem>), PipelineError> {
        if items.is_empty() {
            if let Some(fiscal) = stored_fiscal(&receipt) {
                self.repo.delete_items(receipt.id).await?;
                items = self
                    .repo
                    .create_items(receipt.id, fiscal.document.baseline_items())
                    .await?;
            }
        }

        receipt.status = ReceiptStatus::Failed;
        receipt.last_error = Some(truncate_message(message, self.settings.error_message_limit));

        let receipt = self.repo.update(&receipt).await?;
        info!(receipt_id = %receipt.id, items = items.len(), "Receipt marked failed");
        Ok((receipt, items))
    }
}

/// Parses the fiscal payload stored on a receipt.
fn stored_fiscal(receipt: &Receipt) -> Option<FiscalData> {
    let raw = receipt.raw_fiscal.clone()?;
    match FiscalData::from_raw(raw) {
        Ok(fiscal) => Some(fiscal),
        Err(e) => {
            warn!(receipt_id = %receipt.id, error = %e, "Stored fiscal data is unreadable");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
