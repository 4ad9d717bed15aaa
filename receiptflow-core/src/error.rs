//! Core error types for ReceiptFlow.

use thiserror::Error;

/// Core error type for ReceiptFlow operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Receipt not found.
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),

    /// A fiscal identity is already bound to another receipt.
    #[error("Duplicate fiscal identity: {0}")]
    DuplicateFiscalIdentity(String),

    /// Status move that would go backwards.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// Invalid data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Storage backend failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
