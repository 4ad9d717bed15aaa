//! Fiscal QR payload parsing.
//!
//! A fiscal QR code encodes URL-style key/value pairs:
//!
//! ```text
//! t=20241201T1200&s=1500.00&fn=1234567890&i=12345&fp=67890&n=1
//! ```
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `t` | Purchase time, `YYYYMMDDTHHMM[SS]` |
//! | `s` | Total in major units with a decimal point |
//! | `fn` | Fiscal device number |
//! | `i` | Fiscal document number |
//! | `fp` | Fiscal signature |
//! | `n` | Operation type (1 = sale) |

use chrono::{DateTime, NaiveDateTime, Utc};
use receiptflow_core::FiscalIdentity;
use serde::Serialize;

/// Parsed fiscal QR payload. All six fields are present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrPayload {
    /// `t`: purchase time as printed.
    pub timestamp: String,
    /// `s`: total as printed.
    pub sum: String,
    /// `fn`: fiscal device number.
    pub fiscal_drive_number: String,
    /// `i`: fiscal document number.
    pub fiscal_document_number: String,
    /// `fp`: fiscal signature.
    pub fiscal_sign: String,
    /// `n`: operation type.
    pub operation_type: String,
}

impl QrPayload {
    /// Returns the dedup key for this payload.
    pub fn identity(&self) -> FiscalIdentity {
        FiscalIdentity::new(
            self.fiscal_drive_number.clone(),
            self.fiscal_document_number.clone(),
            self.fiscal_sign.clone(),
        )
    }

    /// Parses `s` into minor units ("1500.00" -> 150000).
    pub fn total_minor_units(&self) -> Option<i64> {
        parse_minor_units(&self.sum)
    }

    /// Parses `t` into a UTC timestamp.
    ///
    /// The printed time carries no zone; it is taken as-is.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        ["%Y%m%dT%H%M%S", "%Y%m%dT%H%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&self.timestamp, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}

/// Parses a raw QR string. Returns `None` if any required key is missing.
///
/// Never panics. A full URL is accepted; everything up to the first `?` is
/// ignored. Keys with empty values count as missing.
pub fn parse_qr_payload(raw: &str) -> Option<QrPayload> {
    let raw = raw.trim();
    let query = raw.split_once('?').map_or(raw, |(_, query)| query);

    let mut t = None;
    let mut s = None;
    let mut fiscal_drive = None;
    let mut document = None;
    let mut sign = None;
    let mut n = None;

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let slot = match key.as_ref() {
            "t" => &mut t,
            "s" => &mut s,
            "fn" => &mut fiscal_drive,
            "i" => &mut document,
            "fp" => &mut sign,
            "n" => &mut n,
            _ => continue,
        };
        *slot = Some(value.to_string());
    }

    Some(QrPayload {
        timestamp: t?,
        sum: s?,
        fiscal_drive_number: fiscal_drive?,
        fiscal_document_number: document?,
        fiscal_sign: sign?,
        operation_type: n?,
    })
}

/// Parses a decimal amount in major units into minor units.
pub(crate) fn parse_minor_units(amount: &str) -> Option<i64> {
    let amount = amount.trim().replace(',', ".");
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount.as_str(), ""));

    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(cents)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "t=20241201T1200&s=1500.00&fn=1234567890&i=12345&fp=67890&n=1";

    #[test]
    fn test_parse_sample() {
        let payload = parse_qr_payload(SAMPLE).unwrap();

        assert_eq!(payload.timestamp, "20241201T1200");
        assert_eq!(payload.sum, "1500.00");
        assert_eq!(payload.fiscal_drive_number, "1234567890");
        assert_eq!(payload.fiscal_document_number, "12345");
        assert_eq!(payload.fiscal_sign, "67890");
        assert_eq!(payload.operation_type, "1");
        assert_eq!(payload.total_minor_units(), Some(150_000));
    }

    #[test]
    fn test_each_missing_key_yields_none() {
        for key in ["t", "s", "fn", "i", "fp", "n"] {
            let raw: Vec<&str> = SAMPLE
                .split('&')
                .filter(|pair| !pair.starts_with(&format!("{key}=")))
                .collect();
            assert!(
                parse_qr_payload(&raw.join("&")).is_none(),
                "missing {key} should not parse"
            );
        }
    }

    #[test]
    fn test_garbage_never_panics() {
        for raw in ["", "&&&", "=", "t", "t=&s=&fn=&i=&fp=&n=", "%ZZ%", "🧾", "?", "a=b=c&=="] {
            assert!(parse_qr_payload(raw).is_none(), "{raw:?}");
        }
    }

    #[test]
    fn test_key_order_and_extra_keys_ignored() {
        let raw = "n=1&fp=67890&extra=x&i=12345&fn=1234567890&s=10.5&t=20241201T120005";
        let payload = parse_qr_payload(raw).unwrap();
        assert_eq!(payload.total_minor_units(), Some(1_050));
        assert!(payload.issued_at().is_some());
    }

    #[test]
    fn test_full_url_accepted() {
        let raw = format!("https://check.example/qr?{SAMPLE}");
        assert!(parse_qr_payload(&raw).is_some());
    }

    #[test]
    fn test_url_encoded_values() {
        let raw = "t=20241201T1200&s=1500%2E00&fn=1234567890&i=12345&fp=67890&n=1";
        assert_eq!(parse_qr_payload(raw).unwrap().sum, "1500.00");
    }

    #[test]
    fn test_issued_at() {
        let payload = parse_qr_payload(SAMPLE).unwrap();
        let at = payload.issued_at().unwrap();
        assert_eq!(at.to_rfc3339(), "2024-12-01T12:00:00+00:00");
    }

    #[test]
    fn test_identity() {
        let identity = parse_qr_payload(SAMPLE).unwrap().identity();
        assert_eq!(identity, FiscalIdentity::new("1234567890", "12345", "67890"));
    }

    #[test]
    fn test_parse_minor_units() {
        assert_eq!(parse_minor_units("1500"), Some(150_000));
        assert_eq!(parse_minor_units("0.99"), Some(99));
        assert_eq!(parse_minor_units("12,3"), Some(1_230));
        assert_eq!(parse_minor_units("-1.00"), None);
        assert_eq!(parse_minor_units("1.234"), None);
        assert_eq!(parse_minor_units("abc"), None);
        assert_eq!(parse_minor_units(".50"), None);
    }
}
