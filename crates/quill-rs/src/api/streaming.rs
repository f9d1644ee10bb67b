//! Re-chunking of the upstream Server-Sent Events (SSE) body.
//!
//! The upstream sends one JSON event per `data: ` line and finishes with
//! `data: [DONE]`. Network reads split those lines (and UTF-8 codepoints) at
//! arbitrary points, and the individual text deltas are usually a token or
//! two long. [`Reassembler`] rebuilds complete lines from raw reads, pulls
//! `choices[0].delta.content` out of each event, and buffers the deltas into
//! chunks that end on a natural break or reach [`FLUSH_THRESHOLD`]
//! characters. [`ChunkStream`] drives it lazily from a [`ByteSource`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::error::{RelayError, Result};

/// Flush once the accumulated content holds this many characters.
pub const FLUSH_THRESHOLD: usize = 50;

/// Flush when the accumulated content ends in one of these.
pub const BREAK_CHARS: &[char] = &[
    ' ', ',', '.', '!', '?', '，', '。', '！', '？', '、', '；', '：', '\n', '\r',
];

/// Payload marking the end of the upstream stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data: ";

/// One unit produced by the reassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// A non-empty run of generated text.
    Chunk(String),
    /// The upstream sent `[DONE]`. Always the last item when present; a body
    /// that closes without `[DONE]` ends with no terminator.
    Terminator,
}

impl StreamItem {
    /// The chunk text, or the empty string for [`StreamItem::Terminator`].
    pub fn text(&self) -> &str {
        match self {
            Self::Chunk(text) => text,
            Self::Terminator => "",
        }
    }
}

// ── Upstream event shape ───────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

/// Parse one event payload into its `choices[0].delta.content`.
fn parse_delta(data: &str) -> Option<String> {
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.delta)
            .and_then(|d| d.content),
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e}; data: {data}");
            None
        }
    }
}

// ── Reassembler ────────────────────────────────────────────────────

/// Line splitter and delta buffer for a single upstream response.
#[derive(Debug, Default)]
pub struct Reassembler {
    /// Bytes after the last newline seen so far.
    pending: Vec<u8>,
    /// Delta text not yet emitted.
    content: String,
    /// `content.chars().count()`, kept incrementally.
    content_chars: usize,
    done: bool,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[DONE]` has been seen. Once true, [`feed`](Self::feed) ignores
    /// its input.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consume one raw read and return every item it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamItem> {
        let mut out = Vec::new();
        if self.done {
            return out;
        }

        self.pending.extend_from_slice(bytes);

        let mut consumed = 0;
        while let Some(pos) = self.pending[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + pos;
            let line = String::from_utf8_lossy(&self.pending[consumed..end]).into_owned();
            consumed = end + 1;

            self.process_line(&line, &mut out);
            if self.done {
                break;
            }
        }

        if self.done {
            self.pending.clear();
        } else {
            self.pending.drain(..consumed);
        }
        out
    }

    /// Flush what is left after the byte source closed without `[DONE]`.
    ///
    /// An unterminated trailing line is dropped, not parsed.
    pub fn finish(&mut self) -> Option<StreamItem> {
        if self.done {
            return None;
        }
        if !self.pending.iter().all(u8::is_ascii_whitespace) {
            debug!(
                "Discarding {} bytes of unterminated trailing line",
                self.pending.len()
            );
        }
        self.pending.clear();
        self.take_content()
    }

    /// Drop all buffered state, returning how many unflushed characters were
    /// lost.
    pub fn discard(&mut self) -> usize {
        let lost = self.content_chars;
        self.pending.clear();
        self.content.clear();
        self.content_chars = 0;
        lost
    }

    fn process_line(&mut self, raw: &str, out: &mut Vec<StreamItem>) {
        let line = raw.trim();
        if line.is_empty() {
            return;
        }
        if line.starts_with(':') {
            trace!("Skipping SSE comment line");
            return;
        }

        let data = line.strip_prefix(DATA_PREFIX).unwrap_or(line);

        if data == DONE_SENTINEL {
            out.extend(self.take_content());
            out.push(StreamItem::Terminator);
            self.done = true;
            return;
        }

        match parse_delta(data) {
            Some(delta) if !delta.is_empty() => self.push_delta(&delta, out),
            Some(_) => {}
            None => trace!("SSE event without delta content"),
        }
    }

    fn push_delta(&mut self, delta: &str, out: &mut Vec<StreamItem>) {
        self.content.push_str(delta);
        self.content_chars += delta.chars().count();

        if self.content_chars >= FLUSH_THRESHOLD || self.content.ends_with(BREAK_CHARS) {
            out.extend(self.take_content());
        }
    }

    fn take_content(&mut self) -> Option<StreamItem> {
        if self.content.is_empty() {
            return None;
        }
        self.content_chars = 0;
        Some(StreamItem::Chunk(std::mem::take(&mut self.content)))
    }
}

// ── Byte sources ───────────────────────────────────────────────────

/// Boxed future returned by [`ByteSource::next_bytes`].
pub type ByteFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>>> + Send + 'a>>;

/// An ordered sequence of raw reads. `Ok(None)` means the source is exhausted.
pub trait ByteSource: Send {
    fn next_bytes(&mut self) -> ByteFuture<'_>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn next_bytes(&mut self) -> ByteFuture<'_> {
        (**self).next_bytes()
    }
}

/// An open upstream response body, read chunk by chunk.
pub struct UpstreamBody {
    response: reqwest::Response,
}

impl UpstreamBody {
    pub fn new(response: reqwest::Response) -> Self {
        Self { response }
    }
}

impl ByteSource for UpstreamBody {
    fn next_bytes(&mut self) -> ByteFuture<'_> {
        Box::pin(async move {
            self.response
                .chunk()
                .await
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .map_err(|e| {
                    RelayError::UpstreamTransport(format!("failed to read streaming chunk: {e}"))
                })
        })
    }
}

// ── Pull cursor ────────────────────────────────────────────────────

/// Lazily re-chunked view of a [`ByteSource`].
///
/// The source is read only when no reassembled item is waiting, and never
/// again after `[DONE]`, a close, or a read error.
pub struct ChunkStream<S> {
    source: S,
    reassembler: Reassembler,
    queue: VecDeque<StreamItem>,
    finished: bool,
}

impl<S: ByteSource> ChunkStream<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            reassembler: Reassembler::new(),
            queue: VecDeque::new(),
            finished: false,
        }
    }

    /// The next item, `Ok(None)` once the stream has ended.
    ///
    /// A read error is returned once; unflushed content is discarded and the
    /// stream ends.
    pub async fn next_item(&mut self) -> Result<Option<StreamItem>> {
        loop {
            if let Some(item) = self.queue.pop_front() {
                return Ok(Some(item));
            }
            if self.finished {
                return Ok(None);
            }
            if self.reassembler.is_done() {
                debug!("Upstream stream completed with [DONE]");
                self.finished = true;
                continue;
            }

            match self.source.next_bytes().await {
                Ok(Some(bytes)) => {
                    trace!("Read {} bytes from upstream", bytes.len());
                    self.queue.extend(self.reassembler.feed(&bytes));
                }
                Ok(None) => {
                    debug!("Upstream stream closed without [DONE]");
                    self.queue.extend(self.reassembler.finish());
                    self.finished = true;
                }
                Err(e) => {
                    let lost = self.reassembler.discard();
                    warn!("Upstream stream failed, discarding {lost} unflushed chars: {e}");
                    self.finished = true;
                    return Err(e);
                }
            }
        }
    }
}
