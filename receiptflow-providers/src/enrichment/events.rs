//! Enrichment event vocabulary.

use receiptflow_fetch::RawEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Every event type the enrichment service may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentEventKind {
    /// Service accepted the request.
    Started,
    /// One enriched line item.
    Item,
    /// Merchant details.
    Place,
    /// Receipt-level details (total, currency, date).
    Receipt,
    /// Detected language.
    Language,
    /// Non-fatal warning.
    Warning,
    /// Final result; terminal.
    Completed,
    /// Failure; terminal.
    Error,
    /// Keepalive; never surfaced.
    Ping,
}

impl EnrichmentEventKind {
    /// Parses a wire name. Names are case-significant.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "started" => Some(Self::Started),
            "item" => Some(Self::Item),
            "place" => Some(Self::Place),
            "receipt" => Some(Self::Receipt),
            "language" => Some(Self::Language),
            "warning" => Some(Self::Warning),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            "ping" => Some(Self::Ping),
            _ => None,
        }
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Item => "item",
            Self::Place => "place",
            Self::Receipt => "receipt",
            Self::Language => "language",
            Self::Warning => "warning",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Ping => "ping",
        }
    }

    /// Returns true for events that end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for EnrichmentEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded enrichment event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentEvent {
    /// Event type.
    pub kind: EnrichmentEventKind,
    /// JSON payload. A payload that is not JSON is kept as a string.
    pub data: Value,
}

impl EnrichmentEvent {
    /// Creates an event.
    pub fn new(kind: EnrichmentEventKind, data: Value) -> Self {
        Self { kind, data }
    }

    /// Interprets a raw decoded event. Unknown event types yield `None`.
    pub fn from_raw(raw: &RawEvent) -> Option<Self> {
        let kind = EnrichmentEventKind::parse(&raw.event)?;
        let data = if raw.data.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&raw.data).unwrap_or_else(|_| Value::String(raw.data.clone()))
        };
        Some(Self { kind, data })
    }

    /// Extracts a human-readable message from an `error` payload.
    pub fn error_message(&self) -> String {
        let message = match &self.data {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map
                .get("message")
                .or_else(|| map.get("error"))
                .and_then(Value::as_str),
            _ => None,
        };
        message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("enrichment service reported an error")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(event: &str, data: &str) -> RawEvent {
        RawEvent {
            event: event.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_vocabulary_round_trips_through_parse() {
        for kind in [
            EnrichmentEventKind::Started,
            EnrichmentEventKind::Item,
            EnrichmentEventKind::Place,
            EnrichmentEventKind::Receipt,
            EnrichmentEventKind::Language,
            EnrichmentEventKind::Warning,
            EnrichmentEventKind::Completed,
            EnrichmentEventKind::Error,
            EnrichmentEventKind::Ping,
        ] {
            assert_eq!(EnrichmentEventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EnrichmentEventKind::parse("Item"), None);
        assert_eq!(EnrichmentEventKind::parse("message"), None);
    }

    #[test]
    fn test_from_raw() {
        let event = EnrichmentEvent::from_raw(&raw("item", r#"{"name":"Pizza"}"#)).unwrap();
        assert_eq!(event.kind, EnrichmentEventKind::Item);
        assert_eq!(event.data, json!({"name": "Pizza"}));

        let event = EnrichmentEvent::from_raw(&raw("warning", "low light")).unwrap();
        assert_eq!(event.data, json!("low light"));

        let event = EnrichmentEvent::from_raw(&raw("ping", "")).unwrap();
        assert_eq!(event.data, Value::Null);

        assert!(EnrichmentEvent::from_raw(&raw("unknown", "{}")).is_none());
    }

    #[test]
    fn test_error_message() {
        let event = EnrichmentEvent::new(EnrichmentEventKind::Error, json!({"message": "model overloaded"}));
        assert_eq!(event.error_message(), "model overloaded");

        let event = EnrichmentEvent::new(EnrichmentEventKind::Error, json!("boom"));
        assert_eq!(event.error_message(), "boom");

        let event = EnrichmentEvent::new(EnrichmentEventKind::Error, Value::Null);
        assert!(!event.error_message().is_empty());
    }
}
