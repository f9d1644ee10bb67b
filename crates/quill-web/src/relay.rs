//! SSE relay from a [`ChunkStream`] to the downstream client.
//!
//! A spawned [`relay_stream`] task pushes [`RelayFrame`]s through a bounded
//! channel; [`sse_response`] turns the receiving half into the HTTP response.
//! When the client goes away the channel closes, the task returns, and the
//! upstream body is dropped with it.

use std::convert::Infallible;
use std::sync::Arc;

use axum::http::{HeaderName, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use quill_rs::{ChunkStream, Completions, Message, Prompt, Sampling, StreamItem};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

/// One SSE frame sent downstream, serialized as `{"type": ...}`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayFrame {
    Start,
    Chunk { content: String },
    End,
    Error { message: String },
}

impl RelayFrame {
    pub fn to_event(&self) -> Event {
        Event::default().data(serde_json::to_string(self).unwrap_or_default())
    }
}

type FrameSender = mpsc::Sender<Result<Event, Infallible>>;

/// Send one frame. `false` means the client is gone.
async fn send(tx: &FrameSender, frame: RelayFrame) -> bool {
    tx.send(Ok(frame.to_event())).await.is_ok()
}

/// Wrap the frame receiver in an SSE response with proxy-buffering disabled.
pub fn sse_response(rx: mpsc::Receiver<Result<Event, Infallible>>) -> Response {
    (
        [
            (header::CONNECTION, "keep-alive"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(ReceiverStream::new(rx)),
    )
        .into_response()
}

/// Open the upstream stream and forward it as `start`, `chunk`..., `end`.
///
/// Any upstream failure produces a single `error` frame and nothing after it.
pub async fn relay_stream(
    backend: Arc<dyn Completions>,
    prompt: Prompt,
    history: Vec<Message>,
    model: String,
    tx: FrameSender,
) {
    if !send(&tx, RelayFrame::Start).await {
        debug!("Client left before the stream started");
        return;
    }

    let opening = backend.complete_streaming(&prompt, &history, &model, Sampling::default());
    let opened = tokio::select! {
        opened = opening => opened,
        () = tx.closed() => {
            info!("Client disconnected while the upstream stream was opening");
            return;
        }
    };

    let source = match opened {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open upstream stream: {e:?}");
            send(&tx, RelayFrame::Error {
                message: e.to_string(),
            })
            .await;
            return;
        }
    };

    let mut chunks = ChunkStream::new(source);
    let mut forwarded = 0usize;

    loop {
        let next = tokio::select! {
            next = chunks.next_item() => next,
            () = tx.closed() => {
                info!("Client disconnected after {forwarded} chunks; dropping upstream stream");
                return;
            }
        };

        match next {
            Ok(Some(StreamItem::Chunk(content))) => {
                if !send(&tx, RelayFrame::Chunk { content }).await {
                    info!("Client disconnected after {forwarded} chunks; dropping upstream stream");
                    return;
                }
                forwarded += 1;
            }
            Ok(Some(StreamItem::Terminator)) => debug!("Upstream signalled completion"),
            Ok(None) => break,
            Err(e) => {
                error!("Upstream stream failed after {forwarded} chunks: {e:?}");
                send(&tx, RelayFrame::Error {
                    message: e.to_string(),
                })
                .await;
                return;
            }
        }
    }

    info!("Stream relay finished: {forwarded} chunks");
    send(&tx, RelayFrame::End).await;
}
