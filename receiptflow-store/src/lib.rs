// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # ReceiptFlow Store
//!
//! Storage and configuration for ReceiptFlow.
//!
//! This crate provides:
//!
//! - **MemoryReceiptRepository**: [`ReceiptRepository`](receiptflow_core::ReceiptRepository)
//!   held in memory, optionally snapshotted to a JSON file
//! - **Config**: JSON configuration with defaults and environment overrides
//! - **Persistence**: File I/O helpers for JSON data
//!
//! ## Usage
//!
//! ```ignore
//! use receiptflow_store::{Config, MemoryReceiptRepository, default_db_path};
//!
//! let config = Config::load()?.with_env();
//! config.validate()?;
//!
//! let repo = MemoryReceiptRepository::open(default_db_path()).await?;
//! ```

pub mod config;
pub mod error;
pub mod persistence;
pub mod repository;

pub use config::{
    Config, ENV_ENRICHMENT_URL, ENV_FISCAL_TOKENS, EnrichmentConfig, FiscalConfig, PipelineConfig,
};
pub use error::StoreError;
pub use persistence::{
    default_config_dir, default_config_path, default_data_dir, default_db_path, ensure_dir,
    load_json, load_json_if_exists, save_json,
};
pub use repository::MemoryReceiptRepository;

#[cfg(test)]
mod persistence_tests;
