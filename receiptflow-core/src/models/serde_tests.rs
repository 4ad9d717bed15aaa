//! Serde tests for core types.
//!
//! These tests pin the wire names other services and stored snapshots
//! depend on.

use serde_json::json;
use uuid::Uuid;

use crate::{
    FiscalIdentity, NewReceipt, NewReceiptItem, Receipt, ReceiptItem, ReceiptSource,
    ReceiptStatus, SplitMethod,
};

// ============================================================================
// Enum Wire Names
// ============================================================================

#[test]
fn test_split_method_wire_names() {
    let cases = vec![
        (SplitMethod::ByFraction, r#""by_fraction""#),
        (SplitMethod::ByAmount, r#""by_amount""#),
        (SplitMethod::PerUnit, r#""per_unit""#),
    ];

    for (method, expected) in cases {
        assert_eq!(serde_json::to_string(&method).unwrap(), expected);
        assert_eq!(format!("\"{}\"", method.as_str()), expected);
    }
}

#[test]
fn test_status_rejects_unknown_value() {
    let result: Result<ReceiptStatus, _> = serde_json::from_str(r#""archived""#);
    assert!(result.is_err());
}

// ============================================================================
// Receipt Serialization
// ============================================================================

#[test]
fn test_receipt_skips_empty_optionals() {
    let receipt = Receipt::from_new(NewReceipt::new(
        "user-1",
        ReceiptSource::Image,
        ReceiptStatus::Processing,
    ));

    let value = serde_json::to_value(&receipt).unwrap();
    assert_eq!(value["source"], json!("image"));
    assert_eq!(value["status"], json!("processing"));
    assert_eq!(value["total"], json!(0));
    assert!(value.get("fiscal").is_none());
    assert!(value.get("last_error").is_none());
    assert!(value.get("raw_fiscal").is_none());
}

#[test]
fn test_receipt_with_fiscal_identity() {
    let mut new = NewReceipt::new("user-1", ReceiptSource::Qr, ReceiptStatus::Processing);
    new.fiscal = Some(FiscalIdentity::new("1234567890", "12345", "67890"));
    new.total = 150_000;
    new.raw_fiscal = Some(json!({"totalSum": 150_000}));

    let receipt = Receipt::from_new(new);
    let json = serde_json::to_string(&receipt).unwrap();
    let parsed: Receipt = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed, receipt);
    assert_eq!(
        parsed.fiscal.as_ref().map(|f| f.device_number.as_str()),
        Some("1234567890")
    );
}

// ============================================================================
// Item Serialization
// ============================================================================

#[test]
fn test_item_omits_empty_tags() {
    let item = ReceiptItem::from_new(
        Uuid::new_v4(),
        NewReceiptItem::plain("COLA 0.5L", 15_000, 2.0, 30_000).at(1),
    );

    let value = serde_json::to_value(&item).unwrap();
    assert!(value.get("tags").is_none());
    assert_eq!(value["split_method"], json!("per_unit"));
    assert_eq!(value["position"], json!(1));
    assert_eq!(value["sum"], json!(30_000));
}

#[test]
fn test_item_deserializes_without_optionals() {
    let id = Uuid::new_v4();
    let receipt_id = Uuid::new_v4();
    let value = json!({
        "id": id,
        "receipt_id": receipt_id,
        "raw_name": "BREAD",
        "price": 5_000,
        "quantity": 1.0,
        "sum": 5_000,
        "split_method": "by_fraction",
        "position": 0
    });

    let item: ReceiptItem = serde_json::from_value(value).unwrap();
    assert_eq!(item.split_method, SplitMethod::ByFraction);
    assert!(item.tags.is_empty());
    assert!(item.name.is_none());
}
