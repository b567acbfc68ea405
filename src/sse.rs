//! Frame decoding for chat streams.
//!
//! The backend answers a chat request with a line-oriented body in which every
//! event is a single `data: <json>\n` line.  This module reassembles those
//! lines from arbitrarily fragmented reads and turns them into
//! [`StreamEvent`]s.
//!
//! Lines are split on raw bytes and only decoded as UTF-8 once complete, so a
//! multi-byte character that straddles two reads is never decoded in halves.

use std::borrow::Cow;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

use crate::observability::{
    STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS, STREAM_FRAMES_DISCARDED,
    STREAM_SILENT_TERMINATIONS,
};
use crate::{Error, Result, StreamEvent};

/// Marker that every protocol frame starts with.
pub const FRAME_PREFIX: &str = "data: ";

/// How many characters of a discarded line make it into a diagnostic.
const DIAGNOSTIC_PREVIEW_CHARS: usize = 120;

/// The interpretation of a single complete line.
#[derive(Debug)]
pub enum Frame {
    /// Not a protocol frame (blank keep-alive, comment, other field).
    Ignored,
    /// A well-formed event.
    Event(StreamEvent),
    /// A `data:` line whose payload could not be understood.
    Malformed(Error),
}

/// Interpret one complete line, without its line terminator.
pub fn parse_line(line: &str) -> Frame {
    let Some(payload) = line.strip_prefix(FRAME_PREFIX) else {
        return Frame::Ignored;
    };
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => Frame::Event(event),
        Err(e) => Frame::Malformed(Error::protocol(
            format!("unusable frame payload: {e}"),
            line,
        )),
    }
}

/// Incremental decoder from bytes to [`StreamEvent`]s.
///
/// Once a terminal event has been decoded the codec is finished: any bytes
/// left in the buffer, and any bytes offered later, are dropped unparsed.
#[derive(Debug, Default)]
pub struct FrameCodec {
    finished: bool,
    discarded: u64,
    // Bytes before this offset are known to hold no newline.
    next_index: usize,
}

impl FrameCodec {
    /// Create a codec that has not seen any frames.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a `done` or `error` frame has been decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of `data:` frames discarded as malformed.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn discard(&mut self, err: &Error, line: &str) {
        self.discarded += 1;
        STREAM_FRAMES_DISCARDED.click();
        warn!(
            error = %err,
            line = %preview(line),
            "discarding malformed stream frame"
        );
    }
}

impl Decoder for FrameCodec {
    type Item = StreamEvent;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>> {
        loop {
            if self.finished {
                src.clear();
                self.next_index = 0;
                return Ok(None);
            }
            let read_to = src.len();
            let start = self.next_index.min(read_to);
            let Some(offset) = src[start..read_to].iter().position(|b| *b == b'\n') else {
                self.next_index = read_to;
                return Ok(None);
            };
            let newline = start + offset;
            self.next_index = 0;
            let mut line = src.split_to(newline + 1);
            line.truncate(newline);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            let line = String::from_utf8_lossy(&line);
            match parse_line(&line) {
                Frame::Ignored => continue,
                Frame::Event(event) => {
                    if event.is_terminal() {
                        self.finished = true;
                        src.clear();
                    }
                    return Ok(Some(event));
                }
                Frame::Malformed(err) => {
                    self.discard(&err, &line);
                    continue;
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<StreamEvent>> {
        let event = self.decode(src)?;
        if event.is_none() {
            // An unterminated trailing line is never a frame.
            if !src.is_empty() {
                debug!(bytes = src.len(), "dropping partial line at end of stream");
            }
            src.clear();
            self.next_index = 0;
        }
        Ok(event)
    }
}

struct FrameState<S> {
    source: Option<S>,
    codec: FrameCodec,
    buffer: BytesMut,
    eof: bool,
}

/// Process a byte stream into a stream of chat events.
///
/// The returned stream yields every `Content` event, then exactly one terminal
/// item: `Ok(Done)`, `Ok(Error { .. })`, or an `Err` describing a read failure
/// or a silent termination.  After a terminal item the source is dropped and
/// the stream ends.
pub fn process_frames<S, E>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = FrameState {
        source: Some(byte_stream),
        codec: FrameCodec::new(),
        buffer: BytesMut::new(),
        eof: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            state.source.as_ref()?;

            let decoded = if state.eof {
                state.codec.decode_eof(&mut state.buffer)
            } else {
                state.codec.decode(&mut state.buffer)
            };
            match decoded {
                Ok(Some(event)) => {
                    STREAM_EVENTS.click();
                    if event.is_terminal() {
                        // Early termination: never read past the terminal frame.
                        state.source = None;
                    }
                    return Some((Ok(event), state));
                }
                Ok(None) if state.eof => {
                    state.source = None;
                    STREAM_SILENT_TERMINATIONS.click();
                    return Some((
                        Err(Error::silent_termination(
                            "stream closed before a done or error frame",
                        )),
                        state,
                    ));
                }
                Ok(None) => {}
                Err(err) => {
                    state.source = None;
                    STREAM_ERRORS.click();
                    return Some((Err(err), state));
                }
            }

            let source = state.source.as_mut()?;
            match source.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state.buffer.extend_from_slice(&bytes);
                }
                Some(Err(e)) => {
                    state.source = None;
                    STREAM_ERRORS.click();
                    return Some((
                        Err(Error::streaming(
                            format!("Error in HTTP stream: {e}"),
                            Some(Box::new(e)),
                        )),
                        state,
                    ));
                }
                None => state.eof = true,
            }
        }
    })
}

fn preview(line: &str) -> Cow<'_, str> {
    match line.char_indices().nth(DIAGNOSTIC_PREVIEW_CHARS) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &line[..idx])),
        None => Cow::Borrowed(line),
    }
}
