//! Receipt item types and the split-method vocabulary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Split Method
// ============================================================================

/// How an item is divided between participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    /// Participants take fractions of the item.
    ByFraction,
    /// Participants pay explicit amounts.
    ByAmount,
    /// Participants take whole units.
    #[default]
    PerUnit,
}

impl SplitMethod {
    /// Returns the wire name of this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ByFraction => "by_fraction",
            Self::ByAmount => "by_amount",
            Self::PerUnit => "per_unit",
        }
    }
}

/// Split suggestion as spelled by the enrichment service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedSplit {
    /// `by_fraction`
    ByFraction,
    /// `by_amount`
    ByAmount,
    /// `per_unit`
    PerUnit,
    /// `not_shareable`
    NotShareable,
    /// Anything the service may invent later.
    #[serde(other)]
    Unknown,
}

impl SuggestedSplit {
    /// Parses a suggestion, mapping unrecognized spellings to `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value {
            "by_fraction" => Self::ByFraction,
            "by_amount" => Self::ByAmount,
            "per_unit" => Self::PerUnit,
            "not_shareable" => Self::NotShareable,
            _ => Self::Unknown,
        }
    }
}

impl From<SuggestedSplit> for SplitMethod {
    fn from(suggestion: SuggestedSplit) -> Self {
        match suggestion {
            SuggestedSplit::ByFraction => SplitMethod::ByFraction,
            SuggestedSplit::ByAmount => SplitMethod::ByAmount,
            SuggestedSplit::PerUnit => SplitMethod::PerUnit,
            // When ambiguous, default to per-unit.
            SuggestedSplit::NotShareable | SuggestedSplit::Unknown => SplitMethod::PerUnit,
        }
    }
}

/// Normalizes an enrichment split suggestion into the internal vocabulary.
pub fn map_split_method(suggestion: Option<&str>) -> SplitMethod {
    suggestion
        .map(SuggestedSplit::parse)
        .map_or(SplitMethod::PerUnit, SplitMethod::from)
}

// ============================================================================
// Receipt Item
// ============================================================================

/// A line item belonging to exactly one receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    /// Item identifier.
    pub id: Uuid,
    /// Owning receipt.
    pub receipt_id: Uuid,
    /// Name as reported by the fiscal authority or the vision service.
    pub raw_name: String,
    /// Normalized, human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Emoji.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Unit price in minor units.
    pub price: i64,
    /// Quantity (may be fractional for weighed goods).
    pub quantity: f64,
    /// Line sum in minor units.
    pub sum: i64,
    /// Discount in minor units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<i64>,
    /// Suggested division method.
    pub split_method: SplitMethod,
    /// Zero-based display order.
    pub position: u32,
}

impl ReceiptItem {
    /// Materializes an item from an insert payload.
    pub fn from_new(receipt_id: Uuid, new: NewReceiptItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            receipt_id,
            raw_name: new.raw_name,
            name: new.name,
            category: new.category,
            emoji: new.emoji,
            tags: new.tags,
            price: new.price,
            quantity: new.quantity,
            sum: new.sum,
            discount: new.discount,
            split_method: new.split_method,
            position: new.position,
        }
    }

    /// Returns the normalized name, falling back to the raw one.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.raw_name)
    }
}

/// Insert payload for a receipt item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReceiptItem {
    /// Raw name.
    pub raw_name: String,
    /// Normalized name.
    pub name: Option<String>,
    /// Category.
    pub category: Option<String>,
    /// Emoji.
    pub emoji: Option<String>,
    /// Tags.
    pub tags: Vec<String>,
    /// Unit price in minor units.
    pub price: i64,
    /// Quantity.
    pub quantity: f64,
    /// Line sum in minor units.
    pub sum: i64,
    /// Discount in minor units.
    pub discount: Option<i64>,
    /// Division method.
    pub split_method: SplitMethod,
    /// Zero-based display order.
    pub position: u32,
}

impl NewReceiptItem {
    /// Creates a plain item without any enrichment data.
    pub fn plain(raw_name: impl Into<String>, price: i64, quantity: f64, sum: i64) -> Self {
        Self {
            raw_name: raw_name.into(),
            name: None,
            category: None,
            emoji: None,
            tags: Vec::new(),
            price,
            quantity,
            sum,
            discount: None,
            split_method: SplitMethod::PerUnit,
            position: 0,
        }
    }

    /// Sets the display order.
    pub fn at(mut self, position: u32) -> Self {
        self.position = position;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_split_method_known_values() {
        assert_eq!(map_split_method(Some("by_fraction")), SplitMethod::ByFraction);
        assert_eq!(map_split_method(Some("by_amount")), SplitMethod::ByAmount);
        assert_eq!(map_split_method(Some("per_unit")), SplitMethod::PerUnit);
    }

    #[test]
    fn test_map_split_method_defaults_to_per_unit() {
        assert_eq!(map_split_method(None), SplitMethod::PerUnit);
        assert_eq!(map_split_method(Some("not_shareable")), SplitMethod::PerUnit);
        assert_eq!(map_split_method(Some("split_evenly")), SplitMethod::PerUnit);
        assert_eq!(map_split_method(Some("BY_FRACTION")), SplitMethod::PerUnit);
        assert_eq!(map_split_method(Some("")), SplitMethod::PerUnit);
    }

    #[test]
    fn test_suggested_split_unknown_deserializes() {
        let parsed: SuggestedSplit = serde_json::from_str(r#""share_by_weight""#).unwrap();
        assert_eq!(parsed, SuggestedSplit::Unknown);
        assert_eq!(SplitMethod::from(parsed), SplitMethod::PerUnit);
    }

    #[test]
    fn test_display_name_falls_back_to_raw() {
        let mut item = ReceiptItem::from_new(
            Uuid::new_v4(),
            NewReceiptItem::plain("ПИЦЦА МАРГАРИТА 30СМ", 120_000, 1.0, 120_000),
        );
        assert_eq!(item.display_name(), "ПИЦЦА МАРГАРИТА 30СМ");

        item.name = Some("Pizza Margherita".to_string());
        assert_eq!(item.display_name(), "Pizza Margherita");
    }
}
