//! Domain models for ReceiptFlow.
//!
//! ## Submodules
//!
//! - [`receipt`] - Receipt header types (Receipt, status, source, fiscal identity)
//! - [`item`] - Line items and the split-method vocabulary

mod item;
mod receipt;

pub use item::{NewReceiptItem, ReceiptItem, SplitMethod, SuggestedSplit, map_split_method};
pub use receipt::{FiscalIdentity, NewReceipt, Receipt, ReceiptSource, ReceiptStatus};

#[cfg(test)]
mod serde_tests;
