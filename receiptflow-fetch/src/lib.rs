// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # ReceiptFlow Fetch
//!
//! Transport plumbing shared by the fiscal and enrichment clients.
//!
//! ## Modules
//!
//! - [`http`] - HTTP client with tracing, bearer auth and endpoint helpers
//! - [`tokens`] - Credential pool with per-token circuit breakers
//! - [`sse`] - Incremental `text/event-stream` line decoder
//! - [`channel`] - Bounded, cancellable producer/consumer event channel
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use receiptflow_fetch::TokenManager;
//!
//! let manager = Arc::new(TokenManager::new(tokens)?);
//! let rotation = manager.spawn_rotation(Duration::from_secs(60));
//!
//! let token = manager.current_token();
//! // ... use the token, then report back
//! manager.record_success(&token);
//!
//! rotation.shutdown().await;
//! ```

pub mod channel;
pub mod error;
pub mod http;
pub mod sse;
pub mod tokens;

// Errors
pub use error::{HttpError, TokenError};

// HTTP
pub use http::{EVENT_STREAM_MIME, HttpClient, ResponseExt};

// Event streams
pub use channel::{EventSink, EventStream, event_channel};
pub use sse::{EventStreamDecoder, RawEvent};

// Credentials
pub use tokens::{RotationHandle, TokenManager, TokenSettings, TokenStats};
