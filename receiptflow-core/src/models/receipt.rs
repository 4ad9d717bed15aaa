//! Receipt types.
//!
//! This module contains the receipt header and its lifecycle:
//! - [`Receipt`] - A persisted proof of purchase
//! - [`NewReceipt`] - Insert payload handed to the repository
//! - [`ReceiptSource`] - Where the receipt came from
//! - [`ReceiptStatus`] - Processing status
//! - [`FiscalIdentity`] - Dedup key for fiscal receipts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Receipt Source
// ============================================================================

/// How a receipt entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptSource {
    /// Fiscal QR code looked up at the fiscal authority.
    Qr,
    /// Photographed receipt recognized by the enrichment service.
    Image,
    /// Entered by hand.
    Manual,
}

impl ReceiptSource {
    /// Returns the wire name of this source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qr => "qr",
            Self::Image => "image",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for ReceiptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Receipt Status
// ============================================================================

/// Processing status of a receipt.
///
/// Moves forward only: `pending -> processing -> {enriched | failed}`.
/// A `failed` receipt may be picked up again by a later invocation, which
/// puts it back into `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Created, nothing attempted yet.
    #[default]
    Pending,
    /// Baseline items stored, enrichment in flight.
    Processing,
    /// Enrichment completed.
    Enriched,
    /// Enrichment failed; fallback items are kept.
    Failed,
}

impl ReceiptStatus {
    /// Returns the wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Enriched => "enriched",
            Self::Failed => "failed",
        }
    }

    /// Returns true for statuses that end a processing attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Enriched | Self::Failed)
    }

    /// Returns true if a receipt may move from `self` to `next`.
    ///
    /// Staying in place is always allowed. `failed -> processing` is the
    /// retry path; every other backwards move is rejected.
    pub fn can_transition_to(&self, next: ReceiptStatus) -> bool {
        use ReceiptStatus::{Enriched, Failed, Pending, Processing};

        match (self, next) {
            (a, b) if *a == b => true,
            (Pending, Processing | Enriched | Failed) => true,
            (Processing, Enriched | Failed) => true,
            (Failed, Processing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Fiscal Identity
// ============================================================================

/// The fiscal identity triple printed in a fiscal QR code.
///
/// Unique per purchase; used as the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FiscalIdentity {
    /// Fiscal device (drive) number, `fn` in the QR payload.
    pub device_number: String,
    /// Fiscal document number, `i` in the QR payload.
    pub document_number: String,
    /// Fiscal signature, `fp` in the QR payload.
    pub signature: String,
}

impl FiscalIdentity {
    /// Creates a new fiscal identity.
    pub fn new(
        device_number: impl Into<String>,
        document_number: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            device_number: device_number.into(),
            document_number: document_number.into(),
            signature: signature.into(),
        }
    }
}

impl fmt::Display for FiscalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fn={} i={} fp={}",
            self.device_number, self.document_number, self.signature
        )
    }
}

// ============================================================================
// Receipt
// ============================================================================

/// A persisted receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Receipt identifier.
    pub id: Uuid,
    /// Owner of the receipt (user or chat identifier).
    pub owner: String,
    /// Where the receipt came from.
    pub source: ReceiptSource,
    /// Processing status.
    pub status: ReceiptStatus,
    /// Fiscal identity, present only for QR receipts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal: Option<FiscalIdentity>,
    /// Merchant name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    /// Merchant address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_address: Option<String>,
    /// Total amount in minor currency units.
    pub total: i64,
    /// When the purchase happened, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchased_at: Option<DateTime<Utc>>,
    /// Raw fiscal payload, kept so enrichment can resume without a lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_fiscal: Option<serde_json::Value>,
    /// Enrichment payload as returned by the enrichment service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<serde_json::Value>,
    /// Last error message (truncated).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// When enrichment completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Receipt {
    /// Materializes a receipt from an insert payload.
    pub fn from_new(new: NewReceipt) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: new.owner,
            source: new.source,
            status: new.status,
            fiscal: new.fiscal,
            merchant_name: new.merchant_name,
            merchant_address: new.merchant_address,
            total: new.total,
            purchased_at: new.purchased_at,
            raw_fiscal: new.raw_fiscal,
            enrichment: None,
            last_error: None,
            enriched_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if enrichment already completed for this receipt.
    pub fn is_enriched(&self) -> bool {
        self.status == ReceiptStatus::Enriched
    }

    /// Returns true if the stored fiscal data allows enrichment to resume.
    pub fn can_resume(&self) -> bool {
        !self.is_enriched() && self.raw_fiscal.is_some()
    }
}

/// Insert payload for a new receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReceipt {
    /// Owner of the receipt.
    pub owner: String,
    /// Where the receipt came from.
    pub source: ReceiptSource,
    /// Initial status.
    pub status: ReceiptStatus,
    /// Fiscal identity, QR receipts only.
    pub fiscal: Option<FiscalIdentity>,
    /// Merchant name.
    pub merchant_name: Option<String>,
    /// Merchant address.
    pub merchant_address: Option<String>,
    /// Total amount in minor units.
    pub total: i64,
    /// Purchase time.
    pub purchased_at: Option<DateTime<Utc>>,
    /// Raw fiscal payload.
    pub raw_fiscal: Option<serde_json::Value>,
}

impl NewReceipt {
    /// Creates an insert payload with no fiscal or merchant data.
    pub fn new(owner: impl Into<String>, source: ReceiptSource, status: ReceiptStatus) -> Self {
        Self {
            owner: owner.into(),
            source,
            status,
            fiscal: None,
            merchant_name: None,
            merchant_address: None,
            total: 0,
            purchased_at: None,
            raw_fiscal: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_moves_forward() {
        use ReceiptStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Enriched));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Processing));

        assert!(!Enriched.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Enriched.can_transition_to(Failed));
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&ReceiptStatus::Enriched).unwrap();
        assert_eq!(json, r#""enriched""#);

        let source: ReceiptSource = serde_json::from_str(r#""image""#).unwrap();
        assert_eq!(source, ReceiptSource::Image);
    }

    #[test]
    fn test_can_resume_requires_fiscal_payload() {
        let mut receipt = Receipt::from_new(NewReceipt::new(
            "user-1",
            ReceiptSource::Qr,
            ReceiptStatus::Processing,
        ));
        assert!(!receipt.can_resume());

        receipt.raw_fiscal = Some(serde_json::json!({"items": []}));
        assert!(receipt.can_resume());

        receipt.status = ReceiptStatus::Enriched;
        assert!(!receipt.can_resume());
    }
}
