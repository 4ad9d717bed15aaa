//! Incremental decoder for `text/event-stream` bodies.
//!
//! Decoding is line by line: an `event:` line sets the pending event type and
//! the next `data:` line emits an event with that type. A blank line is not
//! needed to terminate an event. Bytes are buffered across chunks and only
//! completed lines are decoded, so a chunk boundary may fall anywhere,
//! including inside a multi-byte character.

/// Event type used when a `data:` line arrives without a preceding `event:`.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// One decoded event before any interpretation of its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Value of the last `event:` line.
    pub event: String,
    /// Payload of the `data:` line.
    pub data: String,
}

/// Stateful line decoder. Feed it chunks in arrival order.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    pending_event: Option<String>,
}

impl EventStreamDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(event) = self.decode_line(line.trim_end_matches('\r')) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left once the stream has closed.
    pub fn finish(&mut self) -> Option<RawEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        self.decode_line(line.trim_end_matches('\r'))
    }

    /// Returns the number of buffered bytes not yet forming a full line.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn decode_line(&mut self, line: &str) -> Option<RawEvent> {
        if let Some(event) = line.strip_prefix("event:") {
            self.pending_event = Some(event.trim().to_string());
            return None;
        }

        if let Some(data) = line.strip_prefix("data:") {
            let event = self
                .pending_event
                .take()
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string());
            return Some(RawEvent {
                event,
                data: data.trim().to_string(),
            });
        }

        // Blank lines, comments (`:`), `id:` and `retry:` carry nothing we use.
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_event_and_data_pairs() {
        let mut decoder = EventStreamDecoder::new();
        let events = decoder.push(b"event: started\ndata: {}\n\nevent: item\ndata: {\"name\":\"Pizza\"}\n");

        assert_eq!(
            events,
            vec![
                RawEvent {
                    event: "started".into(),
                    data: "{}".into()
                },
                RawEvent {
                    event: "item".into(),
                    data: r#"{"name":"Pizza"}"#.into()
                },
            ]
        );
    }

    #[test]
    fn test_partial_lines_are_retained_across_chunks() {
        let mut decoder = EventStreamDecoder::new();

        assert!(decoder.push(b"event: pla").is_empty());
        assert!(decoder.push(b"ce\ndata: {\"name\":").is_empty());
        assert!(decoder.buffered() > 0);

        let events = decoder.push(b"\"Cafe\"}\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "place");
        assert_eq!(events[0].data, r#"{"name":"Cafe"}"#);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_split_inside_multibyte_character() {
        let payload = "event: item\ndata: {\"name\":\"Пицца\"}\n".as_bytes();
        let split = payload.iter().position(|&b| b == 0xD0).unwrap() + 1;

        let mut decoder = EventStreamDecoder::new();
        let mut events = decoder.push(&payload[..split]);
        events.extend(decoder.push(&payload[split..]));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, r#"{"name":"Пицца"}"#);
    }

    #[test]
    fn test_crlf_and_comments() {
        let mut decoder = EventStreamDecoder::new();
        let events = decoder.push(b": keepalive comment\r\nevent: ping\r\ndata: {}\r\n\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "ping");
    }

    #[test]
    fn test_data_without_event_uses_default_type() {
        let mut decoder = EventStreamDecoder::new();
        let events = decoder.push(b"data: {\"x\":1}\n");
        assert_eq!(events[0].event, DEFAULT_EVENT_TYPE);
    }

    #[test]
    fn test_event_type_does_not_leak_to_next_data_line() {
        let mut decoder = EventStreamDecoder::new();
        let events = decoder.push(b"event: item\ndata: 1\ndata: 2\n");
        assert_eq!(events[0].event, "item");
        assert_eq!(events[1].event, DEFAULT_EVENT_TYPE);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = EventStreamDecoder::new();
        assert!(decoder.push(b"event: completed\ndata: {\"ok\":true}").is_empty());

        let last = decoder.finish().unwrap();
        assert_eq!(last.event, "completed");
        assert!(decoder.finish().is_none());
    }
}
