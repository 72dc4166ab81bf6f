//! Incremental decoder for the backend's streaming response protocol.
//!
//! The body is a sequence of lines; the ones that matter look like
//!
//! ```text
//! data: {"content": "Hel"}
//! data: {"deleted": 1712345678901}
//! data: "[DONE]"
//! ```
//!
//! Transport chunks are arbitrary slices of that byte sequence. A line, or a
//! multi-byte UTF-8 character, may straddle two chunks, so bytes are buffered
//! until a `\n` arrives. Splitting happens on raw bytes: `\n` never occurs
//! inside a multi-byte UTF-8 sequence, so each complete line is decoded as a
//! whole and chunk boundaries cannot affect the result.

use std::collections::VecDeque;

use chatrelay_types::{MessageId, StreamEvent};
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{DecodeError, TransportError};

/// End-of-stream marker carried in a `data:` line.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &[u8] = b"data:";

/// Default cap on a buffered partial line.
pub const DEFAULT_MAX_LINE: usize = 1024 * 1024;

/// Push-based line decoder. Feed it chunks with [`push`](Self::push) and
/// call [`finish`](Self::finish) once the transport closes.
#[derive(Debug)]
pub struct StreamDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already searched for `\n`.
    scanned: usize,
    max_line: usize,
    /// Discarding the rest of a line that outgrew `max_line`.
    skipping: bool,
    done: bool,
    decode_failures: usize,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_line: DEFAULT_MAX_LINE,
            skipping: false,
            done: false,
            decode_failures: 0,
        }
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit how many bytes of an unterminated line are buffered. A longer
    /// line is dropped and counted as a decode failure.
    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }

    /// `true` once the sentinel has been seen. Further input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of `data:` lines skipped because they could not be decoded.
    pub fn decode_failures(&self) -> usize {
        self.decode_failures
    }

    /// Decode every complete line in `chunk` (plus whatever was buffered
    /// before it). The trailing partial line stays buffered.
    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }
        if self.skipping {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.skipping = false;
                    chunk = &chunk[pos + 1..];
                }
                None => return Vec::new(),
            }
        }
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(pos) = self.buf[from..].iter().position(|&b| b == b'\n') {
            let end = from + pos;
            let event = Self::decode_counted(&self.buf[start..end], &mut self.decode_failures);
            start = end + 1;
            from = start;
            if let Some(event) = event {
                let done = event.is_done();
                events.push(event);
                if done {
                    self.done = true;
                    self.buf.clear();
                    self.scanned = 0;
                    return events;
                }
            }
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();

        if self.buf.len() > self.max_line {
            self.decode_failures += 1;
            warn!(len = self.buf.len(), limit = self.max_line, "dropping overlong stream line");
            self.buf.clear();
            self.scanned = 0;
            self.skipping = true;
        }
        events
    }

    /// Flush the buffered partial line as if the stream ended with `\n`.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.scanned = 0;
        if self.done || self.buf.is_empty() {
            self.buf.clear();
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.buf);
        let event = Self::decode_counted(&rest, &mut self.decode_failures);
        if event.as_ref().is_some_and(StreamEvent::is_done) {
            self.done = true;
        }
        event.into_iter().collect()
    }

    fn decode_counted(line: &[u8], failures: &mut usize) -> Option<StreamEvent> {
        match parse_line(line) {
            Ok(event) => event,
            Err(e) => {
                *failures += 1;
                warn!(error = %e, "skipping malformed stream line");
                None
            }
        }
    }
}

/// Decode one protocol line (without its terminating `\n`).
///
/// Returns `Ok(None)` for lines that carry no event: anything without the
/// `data:` prefix, and JSON values with neither `content` nor `deleted`.
/// A present `content` key always yields a delta: `null` becomes empty text
/// and other non-string values their JSON text.
pub fn parse_line(line: &[u8]) -> Result<Option<StreamEvent>, DecodeError> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };
    let payload = std::str::from_utf8(payload)?.trim();

    // The reference backend writes the sentinel bare instead of as a JSON
    // string.
    if payload == DONE_SENTINEL {
        return Ok(Some(StreamEvent::Done));
    }

    let value: Value = serde_json::from_str(payload).map_err(|source| DecodeError::InvalidJson {
        payload: payload.to_owned(),
        source,
    })?;
    interpret(value)
}

fn interpret(value: Value) -> Result<Option<StreamEvent>, DecodeError> {
    if value.as_str() == Some(DONE_SENTINEL) {
        return Ok(Some(StreamEvent::Done));
    }
    if let Some(content) = value.get("content") {
        let text = match content {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        return Ok(Some(StreamEvent::ContentDelta { text }));
    }
    if let Some(deleted) = value.get("deleted") {
        let id = match deleted {
            Value::Number(n) => n.as_u64().map(MessageId),
            Value::String(s) => s.parse().ok(),
            _ => None,
        };
        return id
            .map(|id| Some(StreamEvent::Deleted { id }))
            .ok_or_else(|| DecodeError::InvalidDeletedId(deleted.clone()));
    }
    debug!(%value, "data line carries no event");
    Ok(None)
}

/// Decode a chunked byte stream into a lazy, finite stream of events.
///
/// The returned stream ends after `Done`, or when `source` ends. A transport
/// error is yielded once and ends the stream. The source is consumed exactly
/// once; dropping the returned stream drops (and so closes) the source.
pub fn decode_stream<S, B, E>(source: S) -> impl Stream<Item = Result<StreamEvent, TransportError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<TransportError>,
{
    struct State<S> {
        source: std::pin::Pin<Box<S>>,
        decoder: StreamDecoder,
        pending: VecDeque<StreamEvent>,
        closed: bool,
    }

    let state = State {
        source: Box::pin(source),
        decoder: StreamDecoder::new(),
        pending: VecDeque::new(),
        closed: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                return Some((Ok(event), st));
            }
            if st.closed || st.decoder.is_done() {
                return None;
            }
            match st.source.next().await {
                Some(Ok(chunk)) => st.pending.extend(st.decoder.push(chunk.as_ref())),
                Some(Err(e)) => {
                    st.closed = true;
                    return Some((Err(e.into()), st));
                }
                None => {
                    st.closed = true;
                    st.pending.extend(st.decoder.finish());
                    if st.decoder.decode_failures() > 0 {
                        debug!(failures = st.decoder.decode_failures(), "stream closed");
                    }
                }
            }
        }
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    const HELLO: &str =
        "data: {\"content\":\"He\"}\ndata: {\"content\":\"llo\"}\ndata: \"[DONE]\"\n";

    fn decode_chunks(chunks: &[&[u8]]) -> Vec<StreamEvent> {
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.push(chunk));
        }
        events.extend(decoder.finish());
        events
    }

    #[test]
    fn decodes_deltas_and_sentinel() {
        let events = decode_chunks(&[HELLO.as_bytes()]);
        assert_eq!(
            events,
            vec![StreamEvent::delta("He"), StreamEvent::delta("llo"), StreamEvent::Done]
        );
    }

    #[test]
    fn every_two_chunk_split_gives_the_same_events() {
        let body = concat!(
            "data: {\"content\":\"héllo ✓\"}\n\n",
            "data: {\"deleted\": 17}\n\n",
            "event: x\ndata: [DONE]\n\n",
        );
        let bytes = body.as_bytes();
        let whole = decode_chunks(&[bytes]);
        assert_eq!(whole.len(), 3);
        for offset in 0..=bytes.len() {
            let (a, b) = bytes.split_at(offset);
            assert_eq!(decode_chunks(&[a, b]), whole, "split at byte {offset}");
        }
    }

    #[traced_test]
    #[test]
    fn malformed_line_is_skipped_and_logged() {
        let body = "data: {not json}\ndata: {\"content\":\"ok\"}\ndata: \"[DONE]\"\n";
        let mut decoder = StreamDecoder::new();
        let events = decoder.push(body.as_bytes());
        assert_eq!(events, vec![StreamEvent::delta("ok"), StreamEvent::Done]);
        assert_eq!(decoder.decode_failures(), 1);
        assert!(logs_contain("skipping malformed stream line"));
    }

    #[test]
    fn lines_without_data_prefix_produce_nothing() {
        let body = ": keep-alive\nevent: message\nid: 4\nretry: 100\n\n";
        let mut decoder = StreamDecoder::new();
        assert!(decoder.push(body.as_bytes()).is_empty());
        assert_eq!(decoder.decode_failures(), 0);
    }

    #[test]
    fn nothing_is_decoded_after_the_sentinel() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.push(b"data: \"[DONE]\"\ndata: {\"content\":\"late\"}\n");
        assert_eq!(events, vec![StreamEvent::Done]);
        assert!(decoder.is_done());
        assert!(decoder.push(b"data: {\"content\":\"later\"}\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn trailing_line_without_newline_is_flushed_on_finish() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.push(b"data: {\"content\":\"tail\"}").is_empty());
        assert_eq!(decoder.finish(), vec![StreamEvent::delta("tail")]);
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let events = decode_chunks(&[&b"data: {\"content\":\"a\"}\r\ndata: \"[DONE]\"\r\n"[..]]);
        assert_eq!(events, vec![StreamEvent::delta("a"), StreamEvent::Done]);
    }

    #[test]
    fn deleted_accepts_numeric_and_string_ids() {
        assert_eq!(
            parse_line(b"data: {\"deleted\": 12}").unwrap(),
            Some(StreamEvent::Deleted { id: MessageId(12) })
        );
        assert_eq!(
            parse_line(b"data: {\"deleted\": \"13\"}").unwrap(),
            Some(StreamEvent::Deleted { id: MessageId(13) })
        );
        assert!(matches!(
            parse_line(b"data: {\"deleted\": true}"),
            Err(DecodeError::InvalidDeletedId(_))
        ));
    }

    #[test]
    fn content_takes_precedence_over_deleted() {
        assert_eq!(
            parse_line(b"data: {\"content\":\"x\",\"deleted\":1}").unwrap(),
            Some(StreamEvent::delta("x"))
        );
    }

    #[test]
    fn present_content_key_always_wins_over_deleted() {
        assert_eq!(
            parse_line(b"data: {\"content\":null,\"deleted\":5}").unwrap(),
            Some(StreamEvent::delta(""))
        );
        assert_eq!(parse_line(b"data: {\"content\":\"\"}").unwrap(), Some(StreamEvent::delta("")));
        assert_eq!(parse_line(b"data: {\"content\":42}").unwrap(), Some(StreamEvent::delta("42")));
    }

    #[test]
    fn long_line_fed_byte_by_byte_decodes_once() {
        let text = "x".repeat(4096);
        let body = format!("data: {{\"content\":\"{text}\"}}\ndata: [DONE]\n");
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        for byte in body.as_bytes() {
            events.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(events, vec![StreamEvent::delta(text), StreamEvent::Done]);
        assert_eq!(decoder.decode_failures(), 0);
    }

    #[traced_test]
    #[test]
    fn overlong_partial_line_is_dropped_and_decoding_resumes() {
        let mut decoder = StreamDecoder::new().with_max_line(16);
        assert!(decoder.push(b"data: {\"content\":\"aaaa").is_empty());
        assert!(decoder.push(b"aaaaaaaaaaaaaaaa").is_empty());
        assert_eq!(decoder.decode_failures(), 1);
        assert!(logs_contain("dropping overlong stream line"));

        let events = decoder.push(b"aa\"}\ndata: {\"content\":\"ok\"}\n");
        assert_eq!(events, vec![StreamEvent::delta("ok")]);
        assert_eq!(decoder.finish(), Vec::new());
    }

    #[test]
    fn invalid_utf8_in_data_line_is_a_decode_error() {
        assert!(matches!(parse_line(b"data: \"\xff\""), Err(DecodeError::InvalidUtf8(_))));
    }

    #[tokio::test]
    async fn decode_stream_stops_at_sentinel_without_draining_source() {
        let chunks: Vec<Result<&[u8], TransportError>> = vec![
            Ok(&b"data: {\"content\":\"a\"}\ndata: \"[DO"[..]),
            Ok(&b"NE]\"\n"[..]),
            Err(TransportError::Stream("must not be polled".into())),
        ];
        let events: Vec<_> = decode_stream(stream::iter(chunks)).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::delta("a"));
        assert_eq!(events[1].as_ref().unwrap(), &StreamEvent::Done);
    }

    #[tokio::test]
    async fn decode_stream_surfaces_transport_error_once() {
        let chunks: Vec<Result<&[u8], TransportError>> = vec![
            Ok(&b"data: {\"content\":\"partial\"}\n"[..]),
            Err(TransportError::Stream("connection reset".into())),
            Ok(&b"data: {\"content\":\"never\"}\n"[..]),
        ];
        let events: Vec<_> = decode_stream(stream::iter(chunks)).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(TransportError::Stream(_))));
    }

    proptest! {
        #[test]
        fn arbitrary_chunking_is_invisible(
            cuts in proptest::collection::vec(0usize..=HELLO.len(), 0..8),
        ) {
            let bytes = HELLO.as_bytes();
            let mut cuts = cuts;
            cuts.sort_unstable();
            let mut chunks = Vec::new();
            let mut prev = 0;
            for cut in cuts {
                chunks.push(&bytes[prev..cut]);
                prev = cut;
            }
            chunks.push(&bytes[prev..]);
            prop_assert_eq!(decode_chunks(&chunks), decode_chunks(&[bytes]));
        }
    }
}
