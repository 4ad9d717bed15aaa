// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # ReceiptFlow Pipeline
//!
//! Turns a fiscal QR payload or a receipt photo into a stored, enriched
//! receipt.
//!
//! ## Flow
//!
//! 1. Validate the input
//! 2. QR only: return the stored receipt if it is already enriched, resume
//!    from stored fiscal data, or look it up and store the baseline items
//! 3. Enrich, one-shot or streamed
//! 4. Store the result as `enriched`, or mark the receipt `failed` and keep
//!    the baseline
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use receiptflow_pipeline::ReceiptPipeline;
//!
//! let pipeline = ReceiptPipeline::new(repo, Arc::new(fiscal), Arc::new(enricher));
//!
//! let processed = pipeline.process_qr("alice", qr).await?;
//!
//! let mut events = pipeline.process_qr_stream("alice", qr, &cancel);
//! while let Some(event) = events.next_event().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

pub mod error;
pub mod events;
pub mod pipeline;
pub mod sources;

pub use error::PipelineError;
pub use events::{ErrorStage, PipelineEvent, ProcessedReceipt};
pub use pipeline::{PipelineSettings, PipelineStream, ReceiptPipeline};
pub use sources::{Enricher, FiscalSource};
