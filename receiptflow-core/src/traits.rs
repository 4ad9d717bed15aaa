//! Trait definitions for ReceiptFlow.
//!
//! This module defines the narrow persistence contract the ingestion
//! pipeline needs. Schema and query mechanics belong to the implementor.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{FiscalIdentity, NewReceipt, NewReceiptItem, Receipt, ReceiptItem};

/// Storage for receipts and their items.
///
/// Implementors are responsible for:
/// - Enforcing uniqueness of the fiscal identity triple
/// - Rejecting backwards status moves on `update`
/// - Keeping item positions as given
#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    /// Looks up a receipt by its fiscal identity.
    async fn find_by_fiscal_signature(
        &self,
        fiscal: &FiscalIdentity,
    ) -> Result<Option<Receipt>, CoreError>;

    /// Looks up a receipt by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Receipt>, CoreError>;

    /// Inserts a new receipt and returns the stored row.
    async fn create(&self, receipt: NewReceipt) -> Result<Receipt, CoreError>;

    /// Replaces a stored receipt and returns the stored row.
    ///
    /// `updated_at` is set by the repository.
    async fn update(&self, receipt: &Receipt) -> Result<Receipt, CoreError>;

    /// Inserts items for a receipt and returns them in position order.
    async fn create_items(
        &self,
        receipt_id: Uuid,
        items: Vec<NewReceiptItem>,
    ) -> Result<Vec<ReceiptItem>, CoreError>;

    /// Returns all items of a receipt in position order.
    async fn get_items(&self, receipt_id: Uuid) -> Result<Vec<ReceiptItem>, CoreError>;

    /// Replaces stored items in place, matched by item id.
    async fn update_items(&self, items: &[ReceiptItem]) -> Result<(), CoreError>;

    /// Deletes all items of a receipt.
    async fn delete_items(&self, receipt_id: Uuid) -> Result<(), CoreError>;
}
