//! Enrichment response types.
//!
//! # Response Format
//!
//! ```json
//! {
//!   "items": [
//!     {"raw_name": "PIZZA MARG 30CM", "name": "Pizza Margherita", "category": "food",
//!      "emoji": "🍕", "tags": ["pizza"], "price": 120000, "quantity": 1, "sum": 120000,
//!      "suggested_split": "by_fraction"}
//!   ],
//!   "place": {"name": "Pizzeria", "address": "Main st. 1"},
//!   "receipt": {"total": 150000, "currency": "RUB"},
//!   "language": "ru",
//!   "warnings": []
//! }
//! ```
//!
//! The streamed form delivers the same pieces as `item`, `place`, `receipt`,
//! `language` and `warning` events, followed by `completed`.

use receiptflow_core::{NewReceiptItem, ReceiptItem, map_split_method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::events::{EnrichmentEvent, EnrichmentEventKind};

/// Full enrichment result.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EnrichedResult {
    /// Enriched items, in receipt order.
    #[serde(default)]
    pub items: Vec<EnrichedItem>,
    /// Merchant details.
    #[serde(default)]
    pub place: Option<EnrichedPlace>,
    /// Receipt-level details.
    #[serde(default)]
    pub receipt: Option<EnrichedReceiptInfo>,
    /// Detected language.
    #[serde(default)]
    pub language: Option<String>,
    /// Non-fatal warnings.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// One enriched item.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EnrichedItem {
    /// Name as read from the source.
    #[serde(default)]
    pub raw_name: Option<String>,
    /// Normalized name.
    #[serde(default)]
    pub name: Option<String>,
    /// Category.
    #[serde(default)]
    pub category: Option<String>,
    /// Emoji.
    #[serde(default)]
    pub emoji: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Unit price in minor units.
    #[serde(default)]
    pub price: Option<i64>,
    /// Quantity.
    #[serde(default)]
    pub quantity: Option<f64>,
    /// Line sum in minor units.
    #[serde(default)]
    pub sum: Option<i64>,
    /// Discount in minor units.
    #[serde(default)]
    pub discount: Option<i64>,
    /// Suggested division method, in the service's vocabulary.
    #[serde(default)]
    pub suggested_split: Option<String>,
}

/// Merchant details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EnrichedPlace {
    /// Merchant name.
    #[serde(default)]
    pub name: Option<String>,
    /// Merchant address.
    #[serde(default)]
    pub address: Option<String>,
}

/// Receipt-level details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EnrichedReceiptInfo {
    /// Total in minor units.
    #[serde(default)]
    pub total: Option<i64>,
    /// Currency code.
    #[serde(default)]
    pub currency: Option<String>,
    /// Purchase date as read.
    #[serde(default)]
    pub date: Option<String>,
}

impl EnrichedItem {
    /// Builds a new receipt item from this enriched item alone.
    ///
    /// Used when there is no fiscal baseline to merge into.
    pub fn to_new_item(&self, position: u32) -> NewReceiptItem {
        let quantity = self.quantity.unwrap_or(1.0);
        let price = self.price.unwrap_or_default();
        let sum = self.sum.unwrap_or(price);

        let raw_name = self
            .raw_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default();

        NewReceiptItem {
            name: self.name.clone(),
            category: self.category.clone(),
            emoji: self.emoji.clone(),
            tags: self.tags.clone(),
            discount: self.discount,
            split_method: map_split_method(self.suggested_split.as_deref()),
            ..NewReceiptItem::plain(raw_name, price, quantity, sum).at(position)
        }
    }

    /// Merges descriptive fields into an existing item.
    ///
    /// Amounts, quantity and the raw name of the existing item are kept; they
    /// come from the authoritative source.
    pub fn merge_into(&self, item: &mut ReceiptItem) {
        if self.name.is_some() {
            item.name.clone_from(&self.name);
        }
        if self.category.is_some() {
            item.category.clone_from(&self.category);
        }
        if self.emoji.is_some() {
            item.emoji.clone_from(&self.emoji);
        }
        if !self.tags.is_empty() {
            item.tags.clone_from(&self.tags);
        }
        if self.discount.is_some() {
            item.discount = self.discount;
        }
        item.split_method = map_split_method(self.suggested_split.as_deref());
    }
}

impl EnrichedResult {
    /// Returns the receipt total reported by the service, or the sum of line
    /// sums.
    pub fn total(&self) -> i64 {
        self.receipt
            .as_ref()
            .and_then(|r| r.total)
            .unwrap_or_else(|| {
                self.items
                    .iter()
                    .map(|item| item.sum.or(item.price).unwrap_or_default())
                    .sum()
            })
    }

    /// Builds new receipt items, positions starting at zero.
    pub fn to_new_items(&self) -> Vec<NewReceiptItem> {
        self.items
            .iter()
            .zip(0u32..)
            .map(|(item, position)| item.to_new_item(position))
            .collect()
    }

    /// Folds one streamed event into the partial result.
    ///
    /// Payloads that do not match the expected shape are skipped.
    pub fn absorb(&mut self, event: &EnrichmentEvent) {
        match event.kind {
            EnrichmentEventKind::Item => match EnrichedItem::deserialize(&event.data) {
                Ok(item) => self.items.push(item),
                Err(e) => debug!(error = %e, "Skipping malformed item event"),
            },
            EnrichmentEventKind::Place => {
                if let Ok(place) = EnrichedPlace::deserialize(&event.data) {
                    self.place = Some(place);
                }
            }
            EnrichmentEventKind::Receipt => {
                if let Ok(receipt) = EnrichedReceiptInfo::deserialize(&event.data) {
                    self.receipt = Some(receipt);
                }
            }
            EnrichmentEventKind::Language => {
                let language = match &event.data {
                    Value::String(s) => Some(s.clone()),
                    other => other.get("language").and_then(Value::as_str).map(str::to_string),
                };
                if language.is_some() {
                    self.language = language;
                }
            }
            EnrichmentEventKind::Warning => {
                let warning = match &event.data {
                    Value::String(s) => s.clone(),
                    other => other
                        .get("message")
                        .and_then(Value::as_str)
                        .map_or_else(|| other.to_string(), str::to_string),
                };
                self.warnings.push(warning);
            }
            EnrichmentEventKind::Started
            | EnrichmentEventKind::Completed
            | EnrichmentEventKind::Error
            | EnrichmentEventKind::Ping => {}
        }
    }

    /// Resolves the final result of a stream from its `completed` payload.
    ///
    /// A payload carrying items replaces what was streamed; otherwise the
    /// streamed pieces stand, topped up with anything the payload adds.
    pub fn complete(mut self, payload: &Value) -> Self {
        let Ok(final_result) = EnrichedResult::deserialize(payload) else {
            return self;
        };

        if !final_result.items.is_empty() {
            return final_result;
        }
        if final_result.place.is_some() {
            self.place = final_result.place;
        }
        if final_result.receipt.is_some() {
            self.receipt = final_result.receipt;
        }
        if final_result.language.is_some() {
            self.language = final_result.language;
        }
        self.warnings.extend(final_result.warnings);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use receiptflow_core::SplitMethod;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_to_new_item_maps_split_and_defaults() {
        let item: EnrichedItem = serde_json::from_value(json!({
            "name": "Pizza Margherita",
            "price": 120000,
            "suggested_split": "not_shareable"
        }))
        .unwrap();

        let new = item.to_new_item(3);
        assert_eq!(new.raw_name, "Pizza Margherita");
        assert_eq!(new.sum, 120_000);
        assert!((new.quantity - 1.0).abs() < f64::EPSILON);
        assert_eq!(new.split_method, SplitMethod::PerUnit);
        assert_eq!(new.position, 3);
    }

    #[test]
    fn test_merge_keeps_authoritative_amounts() {
        let mut existing = ReceiptItem::from_new(
            Uuid::new_v4(),
            NewReceiptItem::plain("PIZZA MARG", 120_000, 1.0, 120_000),
        );
        let enriched: EnrichedItem = serde_json::from_value(json!({
            "name": "Pizza Margherita",
            "category": "food",
            "emoji": "🍕",
            "tags": ["pizza"],
            "price": 1,
            "sum": 1,
            "suggested_split": "by_fraction"
        }))
        .unwrap();

        enriched.merge_into(&mut existing);

        assert_eq!(existing.raw_name, "PIZZA MARG");
        assert_eq!(existing.sum, 120_000);
        assert_eq!(existing.name.as_deref(), Some("Pizza Margherita"));
        assert_eq!(existing.tags, vec!["pizza".to_string()]);
        assert_eq!(existing.split_method, SplitMethod::ByFraction);
    }

    #[test]
    fn test_total_prefers_receipt_info() {
        let mut result: EnrichedResult = serde_json::from_value(json!({
            "items": [{"sum": 100}, {"price": 50}],
        }))
        .unwrap();
        assert_eq!(result.total(), 150);

        result.receipt = Some(EnrichedReceiptInfo {
            total: Some(999),
            ..Default::default()
        });
        assert_eq!(result.total(), 999);
    }

    #[test]
    fn test_absorb_builds_result_from_events() {
        let mut result = EnrichedResult::default();
        for (kind, data) in [
            (EnrichmentEventKind::Started, json!({})),
            (EnrichmentEventKind::Item, json!({"name": "Pizza", "sum": 120000})),
            (EnrichmentEventKind::Item, json!("garbage")),
            (EnrichmentEventKind::Place, json!({"name": "Pizzeria"})),
            (EnrichmentEventKind::Receipt, json!({"total": 150000})),
            (EnrichmentEventKind::Language, json!("ru")),
            (EnrichmentEventKind::Warning, json!({"message": "blurry"})),
        ] {
            result.absorb(&EnrichmentEvent::new(kind, data));
        }

        assert_eq!(result.items.len(), 1);
        assert_eq!(result.place.as_ref().unwrap().name.as_deref(), Some("Pizzeria"));
        assert_eq!(result.total(), 150_000);
        assert_eq!(result.language.as_deref(), Some("ru"));
        assert_eq!(result.warnings, vec!["blurry".to_string()]);
    }

    #[test]
    fn test_complete_prefers_final_items() {
        let mut streamed = EnrichedResult::default();
        streamed.absorb(&EnrichmentEvent::new(EnrichmentEventKind::Item, json!({"name": "A"})));

        let same = streamed.clone().complete(&json!({"ok": true}));
        assert_eq!(same.items.len(), 1);

        let replaced = streamed
            .clone()
            .complete(&json!({"items": [{"name": "B"}, {"name": "C"}]}));
        assert_eq!(replaced.items.len(), 2);

        let untouched = streamed.complete(&json!("done"));
        assert_eq!(untouched.items[0].name.as_deref(), Some("A"));
    }
}
