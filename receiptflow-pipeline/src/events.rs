//! Pipeline results and streamed events.

use receiptflow_core::{Receipt, ReceiptItem, ReceiptSource};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Result of a one-shot invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedReceipt {
    /// Stored receipt.
    pub receipt: Receipt,
    /// Stored items in position order.
    pub items: Vec<ReceiptItem>,
    /// False when enrichment failed and the items are the fallback.
    pub enriched: bool,
}

/// Stage a streamed error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    /// Input validation.
    Validation,
    /// Fiscal authority lookup.
    Fns,
    /// Enrichment service.
    Enrichment,
    /// Repository.
    Storage,
}

/// One event of a streamed invocation.
///
/// Serialized as `{"type": ..., "data": ...}`. A stream always opens with
/// [`Started`](Self::Started) and ends with exactly one of
/// [`Completed`](Self::Completed) or [`Error`](Self::Error), unless the
/// consumer goes away first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Invocation accepted.
    Started {
        /// Input kind.
        source: ReceiptSource,
    },
    /// Fiscal data is available and the baseline items are stored.
    FnsFetched {
        /// Receipt being processed.
        receipt_id: Uuid,
        /// True if the fiscal data came from an earlier invocation.
        resumed: bool,
        /// Baseline items.
        items: Vec<ReceiptItem>,
        /// Receipt total in minor units.
        total: i64,
    },
    /// Enriched item, relayed as received.
    Item(Value),
    /// Merchant details, relayed as received.
    Place(Value),
    /// Receipt-level details, relayed as received.
    Receipt(Value),
    /// Detected language, relayed as received.
    Language(Value),
    /// Non-fatal enrichment warning, relayed as received.
    Warning(Value),
    /// Final stored state.
    Completed {
        /// Stored receipt.
        receipt: Receipt,
        /// Stored items.
        items: Vec<ReceiptItem>,
        /// True for a dedup hit; no external call was made.
        cached: bool,
    },
    /// Terminal failure.
    Error {
        /// Failing stage.
        stage: ErrorStage,
        /// Human-readable message, never empty.
        message: String,
    },
}

impl PipelineEvent {
    /// Returns the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::Started { .. } => "started",
            PipelineEvent::FnsFetched { .. } => "fns_fetched",
            PipelineEvent::Item(_) => "item",
            PipelineEvent::Place(_) => "place",
            PipelineEvent::Receipt(_) => "receipt",
            PipelineEvent::Language(_) => "language",
            PipelineEvent::Warning(_) => "warning",
            PipelineEvent::Completed { .. } => "completed",
            PipelineEvent::Error { .. } => "error",
        }
    }

    /// Returns true for the last event of a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Completed { .. } | PipelineEvent::Error { .. })
    }

    pub(crate) fn error(stage: ErrorStage, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "unknown error".to_string()
        } else {
            message
        };
        PipelineEvent::Error { stage, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let started = serde_json::to_value(PipelineEvent::Started {
            source: ReceiptSource::Qr,
        })
        .unwrap();
        assert_eq!(started, json!({"type": "started", "data": {"source": "qr"}}));

        let item = serde_json::to_value(PipelineEvent::Item(json!({"name": "Pizza"}))).unwrap();
        assert_eq!(item, json!({"type": "item", "data": {"name": "Pizza"}}));

        let error = serde_json::to_value(PipelineEvent::error(ErrorStage::Enrichment, "boom")).unwrap();
        assert_eq!(
            error,
            json!({"type": "error", "data": {"stage": "enrichment", "message": "boom"}})
        );
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let events = [
            PipelineEvent::Started {
                source: ReceiptSource::Image,
            },
            PipelineEvent::FnsFetched {
                receipt_id: Uuid::nil(),
                resumed: false,
                items: vec![],
                total: 0,
            },
            PipelineEvent::Place(Value::Null),
            PipelineEvent::Warning(json!("blurry")),
            PipelineEvent::error(ErrorStage::Fns, ""),
        ];
        for event in events {
            let wire = serde_json::to_value(&event).unwrap();
            assert_eq!(wire["type"], event.kind());
        }
    }

    #[test]
    fn test_error_message_never_empty() {
        let PipelineEvent::Error { message, .. } = PipelineEvent::error(ErrorStage::Storage, "  ") else {
            panic!("expected error event");
        };
        assert!(!message.is_empty());
    }
}
