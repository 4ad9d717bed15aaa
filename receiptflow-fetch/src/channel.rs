//! Bounded producer/consumer event channel with cancellation.
//!
//! A producer task pushes items through an [`EventSink`]; the consumer pulls
//! them from the paired [`EventStream`]. The channel is bounded, so a slow
//! consumer suspends the producer. Dropping the stream, or cancelling the
//! parent token, cancels the producer's token so it stops issuing work and
//! releases whatever connection it holds.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

/// Creates a bounded channel whose producer is cancelled with `parent` or
/// when the consumer goes away.
pub fn event_channel<T>(
    capacity: usize,
    parent: &CancellationToken,
) -> (EventSink<T>, EventStream<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let cancel = parent.child_token();

    let sink = EventSink {
        tx,
        cancel: cancel.clone(),
    };
    let stream = EventStream {
        rx,
        _guard: cancel.drop_guard(),
    };
    (sink, stream)
}

// ============================================================================
// Producer Side
// ============================================================================

/// Producer half of an event channel.
#[derive(Debug)]
pub struct EventSink<T> {
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
}

impl<T> EventSink<T> {
    /// Sends an item, waiting for capacity.
    ///
    /// Returns `false` once the consumer is gone or the producer has been
    /// cancelled; the producer should stop at that point.
    pub async fn send(&self, item: T) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.tx.send(item) => sent.is_ok(),
        }
    }

    /// Returns true once the producer should stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Completes when the producer is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Returns the producer's cancellation token, for handing down to
    /// nested producers.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

// ============================================================================
// Consumer Side
// ============================================================================

/// Consumer half of an event channel. Finite and not restartable.
#[derive(Debug)]
pub struct EventStream<T> {
    rx: mpsc::Receiver<T>,
    _guard: DropGuard,
}

impl<T> EventStream<T> {
    /// Receives the next item, or `None` once the producer has finished.
    pub async fn next_event(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_items_arrive_in_order() {
        let parent = CancellationToken::new();
        let (sink, stream) = event_channel(2, &parent);

        tokio::spawn(async move {
            for i in 0..5 {
                if !sink.send(i).await {
                    break;
                }
            }
        });

        let items: Vec<i32> = stream.collect().await;
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_producer() {
        let parent = CancellationToken::new();
        let (sink, stream) = event_channel::<u8>(1, &parent);

        drop(stream);

        assert!(sink.is_cancelled());
        assert!(!sink.send(1).await);
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_producer() {
        let parent = CancellationToken::new();
        let (sink, mut stream) = event_channel::<u8>(4, &parent);

        assert!(sink.send(1).await);
        parent.cancel();

        assert!(!sink.send(2).await);
        sink.cancelled().await;
        assert_eq!(stream.next_event().await, Some(1));
    }
}
