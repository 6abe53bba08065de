use std::{collections::VecDeque, fmt, pin::Pin};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::error::{CommonRequestError, DispatchError};

/// Separator between two frames of the event stream.
pub const STREAM_CHUNK_DELIMITER: &str = "\n\n";
/// Prefix every data frame starts with.
pub const STREAM_DATA_PREFIX: &str = "data: ";
/// Payload that ends the stream successfully.
pub const STREAM_DONE_MARKER: &str = "[DONE]";

/// Raw body chunks in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, CommonRequestError>> + Send>>;

/// Incremental UTF-8 decoder.
///
/// A multi-byte character split across two chunks is carried over to the next
/// call instead of being replaced. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, keeping an incomplete trailing sequence for later.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));

                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            // truncated sequence at the end of the chunk
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream. An incomplete residual sequence yields U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Accumulates decoded text and cuts it into `\n\n`-delimited frames.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buffer: String,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and return every frame it completed, in order.
    ///
    /// Only the new text, plus a trailing `\n` already buffered, is searched.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        let mut from = if self.buffer.ends_with('\n') {
            self.buffer.len() - 1
        } else {
            self.buffer.len()
        };
        self.buffer.push_str(text);

        let mut frames = Vec::new();
        while let Some(found) = self.buffer[from..].find(STREAM_CHUNK_DELIMITER) {
            let pos = from + found;
            frames.push(self.buffer[..pos].to_string());
            self.buffer.drain(..pos + STREAM_CHUNK_DELIMITER.len());
            from = 0;
        }
        frames
    }

    /// Text that has not yet been closed by a delimiter.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn take_pending(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

/// Byte-to-frame decoder for one stream: [`Utf8Decoder`] feeding a [`FrameSplitter`].
#[derive(Debug, Default)]
pub struct SseDecoder {
    text: Utf8Decoder,
    frames: FrameSplitter,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw chunk, returning the frames it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.text.decode(chunk);
        self.frames.push(&text)
    }

    /// Finalize the decoder and return the trailing partial frame, if any.
    ///
    /// The partial frame is never a complete event; callers only log it.
    pub fn finish(mut self) -> Option<String> {
        let mut rest = self.frames.take_pending();
        rest.push_str(&self.text.finish());
        (!rest.is_empty()).then_some(rest)
    }
}

/// Why a frame produced no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Frame does not start with `data: `
    NotData,
    /// Payload is not a well-formed event
    Malformed(String),
}

/// Result of parsing one complete frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome<T> {
    Event(T),
    Skip(SkipReason),
    Done,
}

/// Parse one complete frame.
pub fn parse_frame<T: DeserializeOwned>(frame: &str) -> FrameOutcome<T> {
    let Some(payload) = frame.strip_prefix(STREAM_DATA_PREFIX) else {
        return FrameOutcome::Skip(SkipReason::NotData);
    };

    if payload == STREAM_DONE_MARKER {
        return FrameOutcome::Done;
    }

    match serde_json::from_str(payload) {
        Ok(event) => FrameOutcome::Event(event),
        Err(err) => FrameOutcome::Skip(SkipReason::Malformed(err.to_string())),
    }
}

/// Event payloads that may carry an application-level error.
pub trait StreamPayload: DeserializeOwned {
    fn error_message(&self) -> Option<&str> {
        None
    }
}

impl StreamPayload for serde_json::Value {
    fn error_message(&self) -> Option<&str> {
        self.get("error").and_then(serde_json::Value::as_str)
    }
}

/// What to do with an event whose `error` field is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorEventPolicy {
    /// Deliver the event, then fail the stream with its error message.
    #[default]
    Fatal,
    /// Deliver the event like any other and keep reading.
    Deliver,
}

/// Lifecycle of one streaming call.
///
/// An [`SseParser`] exists only once response headers are in, so it starts in
/// `Reading`. `Idle` and `Connecting` are never held by a parser; they name the
/// earlier phases in `RequestBuilder::open_stream`'s log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing sent yet
    #[default]
    Idle,
    /// Request sent, waiting for response headers
    Connecting,
    Reading,
    Done,
    Failed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Reading => "reading",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counters of a stream that reached `done`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Events handed to the handler
    pub events: usize,
    /// Malformed frames that were dropped
    pub skipped_frames: usize,
    /// Whether the stream ended with `[DONE]` rather than end of body
    pub sentinel: bool,
}

/// Server-Sent Events reader for streaming responses
pub struct SseParser {
    byte_stream: ByteStream,
    decoder: Option<SseDecoder>,
    frames: VecDeque<String>,
    state: StreamState,
    policy: ErrorEventPolicy,
    pending_failure: Option<String>,
    skipped_frames: usize,
    sentinel: bool,
}

impl fmt::Debug for SseParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseParser")
            .field("state", &self.state)
            .field("policy", &self.policy)
            .field("queued_frames", &self.frames.len())
            .finish_non_exhaustive()
    }
}

impl SseParser {
    /// Read events from an open response whose status was already checked.
    pub fn new(response: reqwest::Response) -> Self {
        Self::from_stream(response.bytes_stream())
    }

    /// Read events from any chunk source.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<CommonRequestError>,
    {
        Self {
            byte_stream: Box::pin(
                stream.map(|chunk| chunk.map_err(Into::<CommonRequestError>::into)),
            ),
            decoder: Some(SseDecoder::new()),
            frames: VecDeque::new(),
            state: StreamState::Reading,
            policy: ErrorEventPolicy::default(),
            pending_failure: None,
            skipped_frames: 0,
            sentinel: false,
        }
    }

    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorEventPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    /// Get the next event, `Ok(None)` once the stream is done.
    pub async fn next_event<T: StreamPayload>(&mut self) -> Result<Option<T>, CommonRequestError> {
        loop {
            if let Some(message) = self.pending_failure.take() {
                self.settle(StreamState::Failed);
                return Err(CommonRequestError::StreamEvent(message));
            }

            if self.state.is_terminal() {
                return Ok(None);
            }

            while let Some(frame) = self.frames.pop_front() {
                match parse_frame::<T>(&frame) {
                    FrameOutcome::Done => {
                        self.sentinel = true;
                        self.settle(StreamState::Done);
                        return Ok(None);
                    }
                    FrameOutcome::Skip(SkipReason::NotData) => {}
                    FrameOutcome::Skip(SkipReason::Malformed(reason)) => {
                        log::warn!("dropping malformed stream frame: {reason}");
                        self.skipped_frames += 1;
                    }
                    FrameOutcome::Event(event) => {
                        if self.policy == ErrorEventPolicy::Fatal {
                            self.pending_failure = event.error_message().map(str::to_string);
                        }
                        return Ok(Some(event));
                    }
                }
            }

            match self.byte_stream.next().await {
                Some(Ok(chunk)) => {
                    if let Some(decoder) = self.decoder.as_mut() {
                        self.frames.extend(decoder.feed(&chunk));
                    }
                }
                Some(Err(err)) => {
                    self.settle(StreamState::Failed);
                    return Err(err);
                }
                None => {
                    self.settle(StreamState::Done);
                    return Ok(None);
                }
            }
        }
    }

    /// Hand every event to `handler`, in order, until the stream settles.
    ///
    /// A handler error aborts the read loop; no further events are delivered.
    pub async fn dispatch<T, E, F>(
        &mut self,
        mut handler: F,
    ) -> Result<StreamSummary, DispatchError<E>>
    where
        T: StreamPayload,
        F: FnMut(T) -> Result<(), E>,
    {
        let mut events = 0;

        while let Some(event) = self.next_event::<T>().await? {
            if let Err(err) = handler(event) {
                self.settle(StreamState::Failed);
                return Err(DispatchError::Handler(err));
            }
            events += 1;
        }

        Ok(StreamSummary {
            events,
            skipped_frames: self.skipped_frames,
            sentinel: self.sentinel,
        })
    }

    /// Enter a terminal state and release the decode buffer.
    fn settle(&mut self, state: StreamState) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        self.frames.clear();
        self.pending_failure = None;

        if let Some(decoder) = self.decoder.take() {
            if let Some(partial) = decoder.finish() {
                log::debug!(
                    "discarding {} bytes of unterminated stream frame",
                    partial.len()
                );
            }
        }
        log::debug!("event stream {state}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Chunk {
        content: Option<String>,
        error: Option<String>,
    }

    impl StreamPayload for Chunk {
        fn error_message(&self) -> Option<&str> {
            self.error.as_deref()
        }
    }

    fn parser(chunks: Vec<&'static [u8]>) -> SseParser {
        SseParser::from_stream(stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, CommonRequestError>(Bytes::from_static(c))),
        ))
    }

    #[test]
    fn decoder_carries_split_multibyte_character() {
        let bytes = "héllo".as_bytes();
        let mut decoder = Utf8Decoder::new();
        // 'é' is two bytes starting at index 1
        assert_eq!(decoder.decode(&bytes[..2]), "h");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(&bytes[2..]), "éllo");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn decoder_replaces_invalid_bytes_and_truncated_tail() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(decoder.decode(&[0xE4, 0xB8]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn splitter_keeps_trailing_partial_frame() {
        let mut splitter = FrameSplitter::new();
        assert_eq!(splitter.push("data: 1\n\ndata: 2\n"), vec!["data: 1"]);
        assert_eq!(splitter.pending(), "data: 2\n");
        assert_eq!(splitter.push("\ndata: 3"), vec!["data: 2"]);
        assert_eq!(splitter.pending(), "data: 3");
    }

    #[test]
    fn splitter_pairs_newline_left_from_previous_push() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.push("data: 好\n").is_empty());
        assert_eq!(splitter.push("\n"), vec!["data: 好"]);
        assert_eq!(splitter.pending(), "");

        // multibyte tail without a newline must not be sliced into
        assert!(splitter.push("data: 你").is_empty());
        assert_eq!(splitter.push("\n\ndata: 好\n\n"), vec!["data: 你", "data: 好"]);
    }

    #[test]
    fn long_frame_fed_in_small_pieces() {
        let payload = "数据".repeat(4_000);
        let wire = format!("data: {payload}\n\ndata: tail\n\n");

        let mut splitter = FrameSplitter::new();
        let mut frames = Vec::new();
        let mut rest = wire.as_str();
        while !rest.is_empty() {
            let mut cut = rest.len().min(7);
            while !rest.is_char_boundary(cut) {
                cut += 1;
            }
            let (piece, tail) = rest.split_at(cut);
            frames.extend(splitter.push(piece));
            rest = tail;
        }

        assert_eq!(frames, vec![format!("data: {payload}"), "data: tail".to_string()]);
        assert_eq!(splitter.pending(), "");
    }

    #[test]
    fn parser_starts_reading() {
        assert_eq!(StreamState::default(), StreamState::Idle);
        assert!(!StreamState::Idle.is_terminal());
        assert!(!StreamState::Connecting.is_terminal());
        assert_eq!(parser(vec![]).state(), StreamState::Reading);
    }

    #[test]
    fn one_frame_regardless_of_chunk_boundaries() {
        let wire = "data: {\"content\":\"你好\"}\n\n".as_bytes();

        for first in 0..=wire.len() {
            for second in first..=wire.len() {
                let mut decoder = SseDecoder::new();
                let mut frames = decoder.feed(&wire[..first]);
                frames.extend(decoder.feed(&wire[first..second]));
                frames.extend(decoder.feed(&wire[second..]));

                assert_eq!(frames, vec!["data: {\"content\":\"你好\"}"], "split at {first}/{second}");
                assert_eq!(decoder.finish(), None);
            }
        }
    }

    #[test]
    fn parse_frame_outcomes() {
        assert_eq!(parse_frame::<Chunk>("event: ping"), FrameOutcome::Skip(SkipReason::NotData));
        assert_eq!(parse_frame::<Chunk>("data:[DONE]"), FrameOutcome::Skip(SkipReason::NotData));
        assert_eq!(parse_frame::<Chunk>("data: [DONE]"), FrameOutcome::Done);
        assert!(matches!(
            parse_frame::<Chunk>("data: {bad json}"),
            FrameOutcome::Skip(SkipReason::Malformed(_))
        ));
        assert_eq!(
            parse_frame::<Chunk>(r#"data: {"content":"hi"}"#),
            FrameOutcome::Event(Chunk { content: Some("hi".into()), error: None })
        );
    }

    #[tokio::test]
    async fn malformed_frame_is_skipped_and_stream_continues() {
        let mut parser = parser(vec![
            b"data: {bad json}\n\ndata: {\"content\":\"ok\"}\n\ndata: [DONE]\n\n",
        ]);

        let mut seen = Vec::new();
        let summary = parser
            .dispatch(|chunk: Chunk| {
                seen.push(chunk.content);
                Ok::<_, String>(())
            })
            .await
            .unwrap();

        assert_eq!(seen, vec![Some("ok".to_string())]);
        assert_eq!(summary, StreamSummary { events: 1, skipped_frames: 1, sentinel: true });
        assert_eq!(parser.state(), StreamState::Done);
    }

    #[tokio::test]
    async fn nothing_is_dispatched_after_sentinel() {
        let mut parser = parser(vec![
            b"data: {\"content\":\"a\"}\n\ndata: [DONE]\n\ndata: {\"content\":\"b\"}\n\n",
            b"data: {\"content\":\"c\"}\n\n",
        ]);

        let mut seen = Vec::new();
        parser
            .dispatch(|chunk: Chunk| {
                seen.push(chunk.content.unwrap_or_default());
                Ok::<_, String>(())
            })
            .await
            .unwrap();

        assert_eq!(seen, vec!["a"]);
        assert!(parser.next_event::<Chunk>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn trailing_partial_frame_is_discarded() {
        let mut parser = parser(vec![
            b"data: {\"content\":\"whole\"}\n\n",
            b"data: {\"content\":\"par",
        ]);

        let mut seen = Vec::new();
        let summary = parser
            .dispatch(|chunk: Chunk| {
                seen.push(chunk.content.unwrap_or_default());
                Ok::<_, String>(())
            })
            .await
            .unwrap();

        assert_eq!(seen, vec!["whole"]);
        assert!(!summary.sentinel);
        assert_eq!(parser.state(), StreamState::Done);
    }

    #[tokio::test]
    async fn handler_sees_events_in_order_one_at_a_time() {
        let mut parser = parser(vec![
            b"data: {\"content\":\"1\"}\n\ndata: {\"content\":\"2\"}\n\ndata: {\"content\":\"3\"}\n\n",
        ]);

        let mut log = Vec::new();
        parser
            .dispatch(|chunk: Chunk| {
                let n = chunk.content.unwrap_or_default();
                log.push(format!("start {n}"));
                log.push(format!("end {n}"));
                Ok::<_, String>(())
            })
            .await
            .unwrap();

        assert_eq!(log, ["start 1", "end 1", "start 2", "end 2", "start 3", "end 3"]);
    }

    #[tokio::test]
    async fn handler_error_stops_the_stream() {
        let mut parser = parser(vec![
            b"data: {\"content\":\"1\"}\n\ndata: {\"content\":\"2\"}\n\n",
        ]);

        let mut calls = 0;
        let result = parser
            .dispatch(|_: Chunk| {
                calls += 1;
                Err("handler gave up")
            })
            .await;

        assert!(matches!(result, Err(DispatchError::Handler("handler gave up"))));
        assert_eq!(calls, 1);
        assert_eq!(parser.state(), StreamState::Failed);
    }

    #[tokio::test]
    async fn error_event_is_delivered_then_fails_by_default() {
        let mut parser = parser(vec![
            b"data: {\"content\":\"partial\",\"error\":\"quota exceeded\"}\n\ndata: {\"content\":\"never\"}\n\n",
        ]);

        let mut seen = Vec::new();
        let result = parser
            .dispatch(|chunk: Chunk| {
                seen.push(chunk.content.unwrap_or_default());
                Ok::<_, String>(())
            })
            .await;

        assert_eq!(seen, vec!["partial"]);
        match result {
            Err(DispatchError::Stream(CommonRequestError::StreamEvent(message))) => {
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("expected stream event error, got {other:?}"),
        }
        assert_eq!(parser.state(), StreamState::Failed);
    }

    #[tokio::test]
    async fn error_event_can_be_delivered_without_failing() {
        let mut parser = parser(vec![
            b"data: {\"error\":\"tool timed out\"}\n\ndata: {\"content\":\"recovered\"}\n\n",
        ])
        .with_error_policy(ErrorEventPolicy::Deliver);

        let mut seen = Vec::new();
        let summary = parser
            .dispatch(|chunk: Chunk| {
                seen.push(chunk);
                Ok::<_, String>(())
            })
            .await
            .unwrap();

        assert_eq!(summary.events, 2);
        assert_eq!(seen[0].error.as_deref(), Some("tool timed out"));
        assert_eq!(seen[1].content.as_deref(), Some("recovered"));
    }

    #[tokio::test]
    async fn transport_error_fails_the_stream() {
        let chunks: Vec<Result<Bytes, CommonRequestError>> = vec![
            Ok(Bytes::from_static(b"data: {\"content\":\"a\"}\n\n")),
            Err(CommonRequestError::InvalidEventData("connection reset".into())),
            Ok(Bytes::from_static(b"data: {\"content\":\"b\"}\n\n")),
        ];
        let mut parser = SseParser::from_stream(stream::iter(chunks));

        let first: Option<Chunk> = parser.next_event().await.unwrap();
        assert_eq!(first.and_then(|c| c.content).as_deref(), Some("a"));
        assert!(parser.next_event::<Chunk>().await.is_err());
        assert_eq!(parser.state(), StreamState::Failed);
        assert!(parser.next_event::<Chunk>().await.unwrap().is_none());
    }
}
