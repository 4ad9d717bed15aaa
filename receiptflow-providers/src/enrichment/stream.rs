//! Streamed enrichment consumption.
//!
//! A producer task reads the response body chunk by chunk, decodes complete
//! lines into events and pushes them into a bounded channel. Keepalives are
//! dropped. The task ends after a terminal event, when the server closes the
//! connection, or as soon as the consumer goes away, dropping the body and
//! with it the connection.

use futures::{Stream, StreamExt};
use receiptflow_fetch::{EventSink, EventStream, EventStreamDecoder, RawEvent, event_channel};
use std::ops::ControlFlow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::error::EnrichmentError;
use super::events::{EnrichmentEvent, EnrichmentEventKind};

/// Lazy, finite, non-restartable sequence of enrichment events.
pub type EnrichmentStream = EventStream<Result<EnrichmentEvent, EnrichmentError>>;

type EnrichmentSink = EventSink<Result<EnrichmentEvent, EnrichmentError>>;

/// Spawns a decoder over an event-stream body and returns its output.
///
/// Dropping the returned stream, or cancelling `cancel`, stops the decoder
/// and drops `body`.
pub fn decode_event_stream<S, B, E>(
    body: S,
    capacity: usize,
    cancel: &CancellationToken,
) -> EnrichmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<EnrichmentError> + Send + 'static,
{
    let (sink, stream) = event_channel(capacity, cancel);
    tokio::spawn(pump(body, sink));
    stream
}

/// Emits a single pre-built sequence of events, for responses that arrived
/// whole instead of streamed.
pub fn ready_stream(events: Vec<EnrichmentEvent>, cancel: &CancellationToken) -> EnrichmentStream {
    let (sink, stream) = event_channel(events.len().max(1), cancel);
    tokio::spawn(async move {
        for event in events {
            if !sink.send(Ok(event)).await {
                break;
            }
        }
    });
    stream
}

async fn pump<S, B, E>(body: S, sink: EnrichmentSink)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<EnrichmentError>,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = EventStreamDecoder::new();

    loop {
        let chunk = tokio::select! {
            biased;
            () = sink.cancelled() => {
                debug!("Enrichment stream cancelled by consumer");
                return;
            }
            chunk = body.next() => chunk,
        };

        let events = match chunk {
            Some(Ok(bytes)) => decoder.push(bytes.as_ref()),
            Some(Err(e)) => {
                let _ = sink.send(Err(e.into())).await;
                return;
            }
            None => {
                let rest = decoder.finish().into_iter().collect();
                let _ = forward(&sink, rest).await;
                debug!("Enrichment stream closed by server");
                return;
            }
        };

        if forward(&sink, events).await.is_break() {
            return;
        }
    }
}

/// Sends decoded events on. Breaks after a terminal event or once the
/// consumer is gone.
async fn forward(sink: &EnrichmentSink, events: Vec<RawEvent>) -> ControlFlow<()> {
    for raw in events {
        let Some(event) = EnrichmentEvent::from_raw(&raw) else {
            debug!(event = %raw.event, "Skipping unknown enrichment event");
            continue;
        };
        if event.kind == EnrichmentEventKind::Ping {
            trace!("Keepalive");
            continue;
        }

        let terminal = event.kind.is_terminal();
        if !sink.send(Ok(event)).await || terminal {
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

// ============================================================================
// Tests
// ============================================================================
