// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # ReceiptFlow Providers
//!
//! Clients for the two external services a receipt passes through.
//!
//! | Module | Service | Transport | Failover |
//! |--------|---------|-----------|----------|
//! | [`fiscal`] | Fiscal authority lookup | form POST | credential pool, up to 3 attempts |
//! | [`enrichment`] | Vision/NLP enrichment | JSON POST, event stream | none |
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use receiptflow_fetch::TokenManager;
//! use receiptflow_providers::fiscal::{FiscalHttpApi, FiscalLookupClient};
//! use receiptflow_providers::enrichment::{EnrichmentClient, EnrichmentRequest};
//!
//! let tokens = Arc::new(TokenManager::new(credentials)?);
//! let api = Arc::new(FiscalHttpApi::new(fiscal::DEFAULT_BASE_URL, timeout)?);
//! let fiscal = FiscalLookupClient::new(api, tokens);
//!
//! let data = fiscal.get_receipt_by_qr(qr).await?;
//! let enricher = EnrichmentClient::new(base_url, None, timeout)?;
//! let result = enricher.enrich(&EnrichmentRequest::from_fiscal(&data.document)).await?;
//! ```

pub mod enrichment;
pub mod fiscal;

pub use enrichment::{EnrichmentClient, EnrichmentError, EnrichmentRequest, EnrichmentStream};
pub use fiscal::{FiscalData, FiscalLookupClient, FiscalLookupError, parse_qr_payload};
