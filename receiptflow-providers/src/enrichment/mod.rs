//! Content enrichment.
//!
//! Sends structured fiscal data or a receipt photo to the enrichment service
//! and returns categorized items, either in one response or as a live event
//! stream.

mod client;
mod error;
mod events;
mod request;
mod response;
mod stream;

pub use client::{
    DEFAULT_ENRICHMENT_TIMEOUT, DEFAULT_STREAM_BUFFER, ENRICH_ENDPOINT, ENRICH_STREAM_ENDPOINT,
    EnrichmentClient,
};
pub use error::EnrichmentError;
pub use events::{EnrichmentEvent, EnrichmentEventKind};
pub use request::{DEFAULT_IMAGE_MIME, EnrichmentRequest, ImagePayload, PlaceHint, StructuredItem};
pub use response::{EnrichedItem, EnrichedPlace, EnrichedReceiptInfo, EnrichedResult};
pub use stream::{EnrichmentStream, decode_event_stream, ready_stream};
