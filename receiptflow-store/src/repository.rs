//! In-process receipt repository.
//!
//! Receipts and items are held in memory behind a [`RwLock`]. Opened with a
//! path, the repository loads a JSON snapshot on start and rewrites it after
//! every mutation, so dedup by fiscal identity survives restarts.

use async_trait::async_trait;
use chrono::Utc;
use receiptflow_core::{
    CoreError, FiscalIdentity, NewReceipt, NewReceiptItem, Receipt, ReceiptItem, ReceiptRepository,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::StoreError;
use crate::persistence::{load_json_if_exists, save_json};

// ============================================================================
// Inner State
// ============================================================================

#[derive(Debug, Default)]
struct RepositoryState {
    receipts: HashMap<Uuid, Receipt>,
    /// Items per receipt, kept sorted by position.
    items: HashMap<Uuid, Vec<ReceiptItem>>,
}

/// On-disk form of the repository.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    receipts: Vec<Receipt>,
    #[serde(default)]
    items: Vec<ReceiptItem>,
}

impl RepositoryState {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = Self::default();
        for receipt in snapshot.receipts {
            state.receipts.insert(receipt.id, receipt);
        }
        for item in snapshot.items {
            state.items.entry(item.receipt_id).or_default().push(item);
        }
        for items in state.items.values_mut() {
            items.sort_by_key(|i| i.position);
        }
        state
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut receipts: Vec<Receipt> = self.receipts.values().cloned().collect();
        receipts.sort_by_key(|r| r.created_at);

        let items = receipts
            .iter()
            .filter_map(|r| self.items.get(&r.id))
            .flatten()
            .cloned()
            .collect();

        Snapshot { receipts, items }
    }

    fn find_fiscal(&self, fiscal: &FiscalIdentity) -> Option<&Receipt> {
        self.receipts
            .values()
            .find(|r| r.fiscal.as_ref() == Some(fiscal))
    }

    fn require(&self, id: Uuid) -> Result<&Receipt, CoreError> {
        self.receipts
            .get(&id)
            .ok_or_else(|| CoreError::ReceiptNotFound(id.to_string()))
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Receipt repository held in memory, optionally snapshotted to a file.
#[derive(Debug, Default)]
pub struct MemoryReceiptRepository {
    state: RwLock<RepositoryState>,
    path: Option<PathBuf>,
}

impl MemoryReceiptRepository {
    /// Creates an empty, purely in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a repository backed by a JSON snapshot at `path`.
    ///
    /// A missing file starts an empty repository; the file is created on the
    /// first write.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let snapshot: Snapshot = load_json_if_exists(&path).await?.unwrap_or_default();

        info!(
            path = %path.display(),
            receipts = snapshot.receipts.len(),
            "Opened receipt snapshot"
        );
        Ok(Self {
            state: RwLock::new(RepositoryState::from_snapshot(snapshot)),
            path: Some(path),
        })
    }

    /// Returns the snapshot path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the number of stored receipts.
    pub async fn receipt_count(&self) -> usize {
        self.state.read().await.receipts.len()
    }

    /// Returns every stored receipt, oldest first.
    pub async fn list(&self) -> Vec<Receipt> {
        self.state.read().await.to_snapshot().receipts
    }

    async fn persist(&self, state: &RepositoryState) -> Result<(), CoreError> {
        if let Some(path) = &self.path {
            save_json(path, &state.to_snapshot()).await?;
            debug!(path = %path.display(), "Receipt snapshot written");
        }
        Ok(())
    }
}

#[async_trait]
impl ReceiptRepository for MemoryReceiptRepository {
    async fn find_by_fiscal_signature(
        &self,
        fiscal: &FiscalIdentity,
    ) -> Result<Option<Receipt>, CoreError> {
        Ok(self.state.read().await.find_fiscal(fiscal).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Receipt>, CoreError> {
        Ok(self.state.read().await.receipts.get(&id).cloned())
    }

    #[instrument(skip(self, receipt), fields(source = %receipt.source))]
    async fn create(&self, receipt: NewReceipt) -> Result<Receipt, CoreError> {
        let mut state = self.state.write().await;

        if let Some(fiscal) = &receipt.fiscal {
            if state.find_fiscal(fiscal).is_some() {
                return Err(CoreError::DuplicateFiscalIdentity(fiscal.to_string()));
            }
        }

        let receipt = Receipt::from_new(receipt);
        state.receipts.insert(receipt.id, receipt.clone());
        self.persist(&state).await?;

        debug!(receipt_id = %receipt.id, status = %receipt.status, "Receipt created");
        Ok(receipt)
    }

    #[instrument(skip(self, receipt), fields(receipt_id = %receipt.id))]
    async fn update(&self, receipt: &Receipt) -> Result<Receipt, CoreError> {
        let mut state = self.state.write().await;
        let existing = state.require(receipt.id)?;

        if !existing.status.can_transition_to(receipt.status) {
            return Err(CoreError::InvalidTransition {
                from: existing.status.to_string(),
                to: receipt.status.to_string(),
            });
        }
        if let Some(fiscal) = &receipt.fiscal {
            if state.find_fiscal(fiscal).is_some_and(|other| other.id != receipt.id) {
                return Err(CoreError::DuplicateFiscalIdentity(fiscal.to_string()));
            }
        }

        let mut stored = receipt.clone();
        stored.created_at = existing.created_at;
        stored.updated_at = Utc::now();
        state.receipts.insert(stored.id, stored.clone());
        self.persist(&state).await?;

        debug!(status = %stored.status, "Receipt updated");
        Ok(stored)
    }

    async fn create_items(
        &self,
        receipt_id: Uuid,
        items: Vec<NewReceiptItem>,
    ) -> Result<Vec<ReceiptItem>, CoreError> {
        let mut state = self.state.write().await;
        state.require(receipt_id)?;

        let mut created: Vec<ReceiptItem> = items
            .into_iter()
            .map(|item| ReceiptItem::from_new(receipt_id, item))
            .collect();
        created.sort_by_key(|i| i.position);

        let stored = state.items.entry(receipt_id).or_default();
        stored.extend(created.iter().cloned());
        stored.sort_by_key(|i| i.position);
        self.persist(&state).await?;

        debug!(%receipt_id, count = created.len(), "Items created");
        Ok(created)
    }

    async fn get_items(&self, receipt_id: Uuid) -> Result<Vec<ReceiptItem>, CoreError> {
        Ok(self
            .state
            .read()
            .await
            .items
            .get(&receipt_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_items(&self, items: &[ReceiptItem]) -> Result<(), CoreError> {
        let mut state = self.state.write().await;

        for item in items {
            let slot = state
                .items
                .get_mut(&item.receipt_id)
                .and_then(|stored| stored.iter_mut().find(|s| s.id == item.id))
                .ok_or_else(|| CoreError::InvalidData(format!("unknown item {}", item.id)))?;
            *slot = item.clone();
        }
        for stored in state.items.values_mut() {
            stored.sort_by_key(|i| i.position);
        }
        self.persist(&state).await
    }

    async fn delete_items(&self, receipt_id: Uuid) -> Result<(), CoreError> {
        let mut state = self.state.write().await;
        let removed = state.items.remove(&receipt_id).map_or(0, |items| items.len());
        self.persist(&state).await?;

        debug!(%receipt_id, removed, "Items deleted");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
