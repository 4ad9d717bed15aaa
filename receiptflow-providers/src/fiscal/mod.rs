//! Fiscal authority lookup.
//!
//! Parses fiscal QR payloads and fetches the canonical purchase document,
//! failing over between credentials of a shared pool.

mod api;
mod client;
mod error;
mod parser;

pub use api::{
    CHECK_ENDPOINT, DEFAULT_BASE_URL, FiscalApi, FiscalApiResponse, FiscalData, FiscalDocument,
    FiscalHttpApi, FiscalLineItem, SUCCESS_CODE, describe_code,
};
pub use client::{DEFAULT_MAX_ATTEMPTS, FiscalLookupClient};
pub use error::FiscalLookupError;
pub use parser::{QrPayload, parse_qr_payload};
