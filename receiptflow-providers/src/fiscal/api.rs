//! Fiscal authority API client.
//!
//! # API Endpoint
//!
//! ```text
//! POST https://proverkacheka.com/api/v1/check/get
//! Content-Type: application/x-www-form-urlencoded
//!
//! token=<credential>&qrraw=<qr payload>
//! ```
//!
//! # Response Format
//!
//! ```json
//! {
//!   "code": 1,
//!   "data": {
//!     "json": {
//!       "user": "OOO Pizzeria",
//!       "retailPlaceAddress": "Main st. 1",
//!       "dateTime": "2024-12-01T12:00:00",
//!       "totalSum": 150000,
//!       "items": [{"name": "Pizza", "price": 120000, "quantity": 1, "sum": 120000}]
//!     }
//!   }
//! }
//! ```
//!
//! Amounts are integer minor units. `code == 1` is the only success code.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use receiptflow_core::NewReceiptItem;
use receiptflow_fetch::{HttpClient, HttpError, ResponseExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::error::FiscalLookupError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL of the fiscal authority.
pub const DEFAULT_BASE_URL: &str = "https://proverkacheka.com";

/// Receipt lookup endpoint.
pub const CHECK_ENDPOINT: &str = "/api/v1/check/get";

/// Response code of a successful lookup.
pub const SUCCESS_CODE: i64 = 1;

/// Describes a fiscal API response code.
pub fn describe_code(code: i64) -> &'static str {
    match code {
        0 => "invalid receipt",
        1 => "ok",
        2 => "receipt data not yet available",
        3 => "too many requests",
        4 => "wait before retrying",
        5 => "other error",
        _ => "unknown response code",
    }
}

// ============================================================================
// API Response Structures
// ============================================================================

/// Envelope returned by the lookup endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FiscalApiResponse {
    /// Application status code.
    pub code: i64,
    /// Payload; `data.json` holds the document on success, other codes
    /// usually carry a message string.
    #[serde(default)]
    pub data: Option<Value>,
}

impl FiscalApiResponse {
    /// Creates a successful response around a document.
    pub fn success(document: Value) -> Self {
        Self {
            code: SUCCESS_CODE,
            data: Some(serde_json::json!({ "json": document })),
        }
    }

    /// Creates an application error response.
    pub fn failure(code: i64) -> Self {
        Self { code, data: None }
    }

    /// Converts the envelope into fiscal data, or the application error it
    /// reports.
    pub fn into_fiscal_data(self) -> Result<FiscalData, FiscalLookupError> {
        let detail = self.data.as_ref().and_then(Value::as_str).map(str::to_string);

        if self.code == SUCCESS_CODE {
            if let Some(document) = self.data.and_then(|mut data| data.get_mut("json").map(Value::take)) {
                return FiscalData::from_raw(document);
            }
        }

        let message = match detail {
            Some(detail) if !detail.trim().is_empty() => {
                format!("{}: {}", describe_code(self.code), detail.trim())
            }
            _ if self.code == SUCCESS_CODE => "response carries no receipt data".to_string(),
            _ => describe_code(self.code).to_string(),
        };
        Err(FiscalLookupError::Api {
            code: self.code,
            message,
        })
    }
}

/// Canonical purchase document from the fiscal authority.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalDocument {
    /// Purchased line items, in print order.
    #[serde(default)]
    pub items: Vec<FiscalLineItem>,
    /// Legal name of the seller.
    pub user: Option<String>,
    /// Trading name of the point of sale.
    pub retail_place: Option<String>,
    /// Address of the point of sale.
    pub retail_place_address: Option<String>,
    /// Purchase time, as a unix timestamp or an ISO-like string.
    pub date_time: Option<Value>,
    /// Receipt total in minor units.
    pub total_sum: Option<i64>,
}

/// One fiscal line item.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FiscalLineItem {
    /// Item name as printed.
    #[serde(default)]
    pub name: String,
    /// Unit price in minor units.
    #[serde(default)]
    pub price: i64,
    /// Quantity (may be fractional for weighed goods).
    #[serde(default)]
    pub quantity: f64,
    /// Line sum in minor units.
    #[serde(default)]
    pub sum: i64,
}

impl FiscalDocument {
    /// Returns the merchant's display name.
    pub fn merchant_name(&self) -> Option<&str> {
        self.retail_place
            .as_deref()
            .or(self.user.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the receipt total, falling back to the sum of line sums.
    pub fn total(&self) -> i64 {
        self.total_sum
            .unwrap_or_else(|| self.items.iter().map(|item| item.sum).sum())
    }

    /// Parses the purchase time.
    pub fn purchased_at(&self) -> Option<DateTime<Utc>> {
        match self.date_time.as_ref()? {
            Value::Number(n) => DateTime::from_timestamp(n.as_i64()?, 0),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
                        .ok()
                        .map(|naive| naive.and_utc())
                }),
            _ => None,
        }
    }

    /// Builds 1:1 receipt items from the fiscal line items.
    pub fn baseline_items(&self) -> Vec<NewReceiptItem> {
        self.items
            .iter()
            .zip(0u32..)
            .map(|(item, position)| {
                NewReceiptItem::plain(item.name.trim(), item.price, item.quantity, item.sum)
                    .at(position)
            })
            .collect()
    }
}

/// Fiscal data from a successful lookup: the typed document plus the raw
/// JSON it was parsed from, kept for resuming.
#[derive(Debug, Clone)]
pub struct FiscalData {
    /// Parsed document.
    pub document: FiscalDocument,
    /// Raw `data.json` payload.
    pub raw: Value,
}

impl FiscalData {
    /// Parses a raw `data.json` payload, as fetched or as stored on a receipt.
    pub fn from_raw(raw: Value) -> Result<Self, FiscalLookupError> {
        let document = FiscalDocument::deserialize(&raw)?;
        Ok(Self { document, raw })
    }
}

// ============================================================================
// Transport
// ============================================================================

/// One lookup request against the fiscal authority.
#[async_trait]
pub trait FiscalApi: Send + Sync {
    /// Looks up a receipt by its raw QR payload using one credential.
    async fn check(&self, qr_raw: &str, token: &str) -> Result<FiscalApiResponse, FiscalLookupError>;
}

/// HTTP implementation of [`FiscalApi`].
#[derive(Debug, Clone)]
pub struct FiscalHttpApi {
    http: HttpClient,
    endpoint: Url,
}

impl FiscalHttpApi {
    /// Creates a client for the given base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FiscalLookupError> {
        Ok(Self {
            http: HttpClient::with_timeout(timeout)?,
            endpoint: HttpClient::endpoint(base_url, CHECK_ENDPOINT)?,
        })
    }

    /// Returns the resolved lookup endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl FiscalApi for FiscalHttpApi {
    #[instrument(skip(self, qr_raw, token))]
    async fn check(&self, qr_raw: &str, token: &str) -> Result<FiscalApiResponse, FiscalLookupError> {
        let form = [("token", token), ("qrraw", qr_raw)];

        let response = self
            .http
            .post_form(&self.endpoint, &form)
            .await?
            .ensure_success()
            .await?;

        let body = response.text().await.map_err(HttpError::from)?;
        debug!(bytes = body.len(), "Fiscal response received");

        Ok(serde_json::from_str(&body)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_document() -> Value {
        json!({
            "user": "OOO Pizzeria",
            "retailPlaceAddress": "Main st. 1",
            "dateTime": "2024-12-01T12:00:00",
            "totalSum": 150000,
            "items": [
                {"name": "Pizza", "price": 120000, "quantity": 1, "sum": 120000},
                {"name": "Cola", "price": 15000, "quantity": 2, "sum": 30000}
            ]
        })
    }

    #[test]
    fn test_success_envelope() {
        let data = FiscalApiResponse::success(sample_document())
            .into_fiscal_data()
            .unwrap();

        assert_eq!(data.document.items.len(), 2);
        assert_eq!(data.document.total(), 150_000);
        assert_eq!(data.document.merchant_name(), Some("OOO Pizzeria"));
        assert_eq!(data.raw["totalSum"], 150_000);
    }

    #[test]
    fn test_error_codes() {
        for code in [0, 2, 3, 4, 5] {
            let err = FiscalApiResponse::failure(code).into_fiscal_data().unwrap_err();
            match err {
                FiscalLookupError::Api { code: c, message } => {
                    assert_eq!(c, code);
                    assert_eq!(message, describe_code(code));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_error_message_carries_detail() {
        let response: FiscalApiResponse =
            serde_json::from_value(json!({"code": 3, "data": "slow down"})).unwrap();
        let err = response.into_fiscal_data().unwrap_err();
        assert!(err.to_string().contains("too many requests: slow down"));
    }

    #[test]
    fn test_success_code_without_payload_is_error() {
        let response: FiscalApiResponse = serde_json::from_value(json!({"code": 1})).unwrap();
        assert!(matches!(
            response.into_fiscal_data(),
            Err(FiscalLookupError::Api { code: 1, .. })
        ));
    }

    #[test]
    fn test_total_falls_back_to_item_sums() {
        let mut raw = sample_document();
        raw.as_object_mut().unwrap().remove("totalSum");
        let data = FiscalData::from_raw(raw).unwrap();
        assert_eq!(data.document.total(), 150_000);
    }

    #[test]
    fn test_purchased_at_formats() {
        let mut document = FiscalDocument::default();
        assert!(document.purchased_at().is_none());

        document.date_time = Some(json!(1_733_054_400));
        assert_eq!(
            document.purchased_at().unwrap().to_rfc3339(),
            "2024-12-01T12:00:00+00:00"
        );

        document.date_time = Some(json!("2024-12-01T12:00"));
        assert!(document.purchased_at().is_some());
    }

    #[test]
    fn test_baseline_items_are_positional() {
        let data = FiscalData::from_raw(sample_document()).unwrap();
        let items = data.document.baseline_items();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].raw_name, "Pizza");
        assert_eq!(items[0].position, 0);
        assert_eq!(items[1].raw_name, "Cola");
        assert_eq!(items[1].position, 1);
        assert!((items[1].quantity - 2.0).abs() < f64::EPSILON);
        assert_eq!(items[1].sum, 30_000);
    }

    #[test]
    fn test_endpoint_resolution() {
        let api = FiscalHttpApi::new("https://fiscal.example", Duration::from_secs(5)).unwrap();
        assert_eq!(
            api.endpoint().as_str(),
            "https://fiscal.example/api/v1/check/get"
        );
    }
}
