//! Enrichment request builders.
//!
//! Two source shapes map onto one request schema, tagged by `kind`:
//!
//! ```json
//! {"kind": "structured", "items": [...], "place": {...}, "total": 150000, "date": "..."}
//! {"kind": "image", "image": "<base64>", "mime_type": "image/jpeg"}
//! ```

use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::EnrichmentError;
use crate::fiscal::FiscalDocument;

/// MIME type assumed when an image arrives without one.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Request body sent to the enrichment service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrichmentRequest {
    /// Already-structured purchase data.
    Structured {
        /// Line items in print order.
        items: Vec<StructuredItem>,
        /// Point of sale, if known.
        #[serde(skip_serializing_if = "Option::is_none")]
        place: Option<PlaceHint>,
        /// Receipt total in minor units.
        total: i64,
        /// Purchase time, if known.
        #[serde(skip_serializing_if = "Option::is_none")]
        date: Option<DateTime<Utc>>,
    },
    /// A photographed receipt.
    Image {
        /// Base64 payload without any data-URL prefix.
        image: String,
        /// MIME type of the decoded payload.
        mime_type: String,
    },
}

/// One structured line item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredItem {
    /// Item name as printed.
    pub name: String,
    /// Unit price in minor units.
    pub price: i64,
    /// Quantity.
    pub quantity: f64,
    /// Line sum in minor units.
    pub sum: i64,
}

/// Point-of-sale hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceHint {
    /// Merchant name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Merchant address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl EnrichmentRequest {
    /// Builds a structured request from a fiscal document.
    pub fn from_fiscal(document: &FiscalDocument) -> Self {
        let items = document
            .items
            .iter()
            .map(|item| StructuredItem {
                name: item.name.trim().to_string(),
                price: item.price,
                quantity: item.quantity,
                sum: item.sum,
            })
            .collect();

        let name = document.merchant_name().map(str::to_string);
        let address = document
            .retail_place_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let place = (name.is_some() || address.is_some()).then_some(PlaceHint { name, address });

        EnrichmentRequest::Structured {
            items,
            place,
            total: document.total(),
            date: document.purchased_at(),
        }
    }

    /// Builds an image request from a validated payload.
    pub fn from_image(image: &ImagePayload) -> Self {
        EnrichmentRequest::Image {
            image: image.data.clone(),
            mime_type: image.mime_type.clone(),
        }
    }

    /// Returns the request kind as sent on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            EnrichmentRequest::Structured { .. } => "structured",
            EnrichmentRequest::Image { .. } => "image",
        }
    }
}

// ============================================================================
// Image Payload
// ============================================================================

/// A validated base64 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// MIME type, from the data-URL header or [`DEFAULT_IMAGE_MIME`].
    pub mime_type: String,
    /// Base64 payload with whitespace removed.
    pub data: String,
    /// Size of the decoded image in bytes.
    pub decoded_len: usize,
}

impl ImagePayload {
    /// Parses raw base64 or a `data:<mime>;base64,<payload>` URL.
    pub fn parse(input: &str) -> Result<Self, EnrichmentError> {
        let input = input.trim();

        let (mime_type, payload) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| EnrichmentError::InvalidImage("data URL without payload".to_string()))?;
                let Some(mime) = header.strip_suffix(";base64") else {
                    return Err(EnrichmentError::InvalidImage(
                        "data URL is not base64-encoded".to_string(),
                    ));
                };
                let mime = if mime.is_empty() { DEFAULT_IMAGE_MIME } else { mime };
                (mime.to_string(), payload)
            }
            None => (DEFAULT_IMAGE_MIME.to_string(), input),
        };

        let data: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if data.is_empty() {
            return Err(EnrichmentError::InvalidImage("empty payload".to_string()));
        }

        let decoded = BASE64_STANDARD
            .decode(&data)
            .map_err(|e| EnrichmentError::InvalidImage(format!("base64 decode error: {e}")))?;

        Ok(Self {
            mime_type,
            data,
            decoded_len: decoded.len(),
        })
    }

    /// Encodes raw image bytes.
    pub fn from_bytes(bytes: &[u8], mime_type: Option<&str>) -> Self {
        Self {
            mime_type: mime_type.unwrap_or(DEFAULT_IMAGE_MIME).to_string(),
            data: BASE64_STANDARD.encode(bytes),
            decoded_len: bytes.len(),
        }
    }

    /// Renders the payload as a `data:` URL, the form [`parse`](Self::parse)
    /// accepts back.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiscal::FiscalData;
    use serde_json::json;

    #[test]
    fn test_structured_request_from_fiscal() {
        let data = FiscalData::from_raw(json!({
            "retailPlace": "Pizzeria",
            "retailPlaceAddress": "  Main st. 1 ",
            "dateTime": 1_733_054_400,
            "items": [
                {"name": " Pizza ", "price": 120000, "quantity": 1, "sum": 120000},
                {"name": "Cola", "price": 15000, "quantity": 2, "sum": 30000}
            ]
        }))
        .unwrap();

        let request = EnrichmentRequest::from_fiscal(&data.document);
        let wire = serde_json::to_value(&request).unwrap();

        assert_eq!(wire["kind"], "structured");
        assert_eq!(wire["items"][0]["name"], "Pizza");
        assert_eq!(wire["total"], 150_000);
        assert_eq!(wire["place"]["name"], "Pizzeria");
        assert_eq!(wire["place"]["address"], "Main st. 1");
        assert_eq!(wire["date"], "2024-12-01T12:00:00Z");
    }

    #[test]
    fn test_structured_request_omits_unknown_place() {
        let request = EnrichmentRequest::from_fiscal(&FiscalDocument::default());
        let wire = serde_json::to_value(&request).unwrap();

        assert!(wire.get("place").is_none());
        assert!(wire.get("date").is_none());
        assert_eq!(wire["total"], 0);
    }

    #[test]
    fn test_image_payload_raw_base64() {
        let image = ImagePayload::parse("aGVsbG8=\n").unwrap();
        assert_eq!(image.mime_type, DEFAULT_IMAGE_MIME);
        assert_eq!(image.data, "aGVsbG8=");
        assert_eq!(image.decoded_len, 5);
    }

    #[test]
    fn test_image_payload_data_url() {
        let image = ImagePayload::parse("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.mime_type, "image/png");

        let wire = serde_json::to_value(EnrichmentRequest::from_image(&image)).unwrap();
        assert_eq!(wire, json!({"kind": "image", "image": "aGVsbG8=", "mime_type": "image/png"}));
    }

    #[test]
    fn test_image_payload_rejects_garbage() {
        for input in ["", "   ", "not base64!", "data:image/png,aGVsbG8=", "data:image/png;base64"] {
            assert!(
                matches!(ImagePayload::parse(input), Err(EnrichmentError::InvalidImage(_))),
                "{input:?}"
            );
        }
    }

    #[test]
    fn test_image_from_bytes() {
        let image = ImagePayload::from_bytes(b"hello", Some("image/webp"));
        assert_eq!(image.data, "aGVsbG8=");
        assert_eq!(ImagePayload::parse(&image.data).unwrap().decoded_len, 5);

        let reparsed = ImagePayload::parse(&image.to_data_url()).unwrap();
        assert_eq!(reparsed.mime_type, "image/webp");
    }
}
