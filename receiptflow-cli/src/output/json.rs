//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use receiptflow_core::FiscalIdentity;
use receiptflow_pipeline::PipelineEvent;
use receiptflow_providers::fiscal::QrPayload;
use serde::{Serialize, Serializer};

/// Marker line closing a streamed run.
pub const STREAM_END: &str = r#"{"type":"stream_end"}"#;

// ============================================================================
// Output Types
// ============================================================================

/// Parsed QR payload with derived values.
#[derive(Debug, Serialize)]
pub struct QrOutput<'a> {
    pub payload: &'a QrPayload,
    pub identity: FiscalIdentity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_datetime_opt")]
    pub issued_at: Option<DateTime<Utc>>,
}

impl<'a> QrOutput<'a> {
    /// Derives the output for a payload.
    pub fn new(payload: &'a QrPayload) -> Self {
        Self {
            payload,
            identity: payload.identity(),
            total: payload.total_minor_units(),
            issued_at: payload.issued_at(),
        }
    }
}

// ============================================================================
// Serialization helpers
// ============================================================================

#[allow(clippy::ref_option)]
fn serialize_datetime_opt<S>(dt: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match dt {
        Some(dt) => s.serialize_str(&dt.to_rfc3339()),
        None => s.serialize_none(),
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats a parsed QR payload.
    pub fn format_qr(&self, payload: &QrPayload) -> Result<String> {
        self.format(&QrOutput::new(payload))
    }
}

/// Formats a streamed event as a single line; streams are never pretty-printed.
pub fn event_line(event: &PipelineEvent) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}
