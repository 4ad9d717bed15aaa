// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `ReceiptFlow` Core
//!
//! Core types, models, and traits for the `ReceiptFlow` application.
//!
//! This crate provides the foundational abstractions used across all other
//! `ReceiptFlow` crates, including:
//!
//! - Domain models (receipts, items, split methods)
//! - Error types
//! - The repository contract used by the ingestion pipeline
//! - Credential masking and message truncation helpers
//!
//! ## Key Types
//!
//! ### Receipt Types
//! - [`Receipt`] - A persisted proof of purchase
//! - [`ReceiptSource`] - QR, image or manual
//! - [`ReceiptStatus`] - Forward-only processing status
//! - [`FiscalIdentity`] - Dedup key for fiscal receipts
//!
//! ### Item Types
//! - [`ReceiptItem`] - A line item
//! - [`SplitMethod`] - Internal division-method vocabulary
//! - [`SuggestedSplit`] - Enrichment-service vocabulary

pub mod error;
pub mod models;
pub mod redact;
pub mod traits;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Receipt types
    FiscalIdentity,
    NewReceipt,
    Receipt,
    ReceiptSource,
    ReceiptStatus,
    // Item types
    NewReceiptItem,
    ReceiptItem,
    SplitMethod,
    SuggestedSplit,
    map_split_method,
};

pub use redact::{DEFAULT_ERROR_MESSAGE_LIMIT, mask_credential, truncate_message};

// Re-export traits
pub use traits::ReceiptRepository;
