//! HTTP relay for quill content generation.
//!
//! `quill-web` provides an axum server with two generation endpoints backed
//! by any [`Completions`] implementation (normally
//! [`DeepSeekClient`](quill_rs::DeepSeekClient)):
//!
//! - `POST /deepseek/chat`: Markdown articles in a JSON envelope.
//! - `POST /deepseek/streamChat`: plain text as Server-Sent Events.
//! - `GET /user`: bearer-token session check.
//!
//! # Quick start
//!
//! ```ignore
//! use quill_rs::{DeepSeekClient, UpstreamConfig};
//! use quill_web::{WebConfig, spawn_web};
//! use std::sync::Arc;
//!
//! let client = DeepSeekClient::new(UpstreamConfig::new(api_key))?;
//! let addr = spawn_web(Arc::new(client), WebConfig::default()).await?;
//! println!("Relay: http://{addr}");
//! ```
//!
//! # Streaming
//!
//! ```text
//! upstream SSE ──bytes──▶ ChunkStream ──StreamItem──▶ relay_stream ──RelayFrame──▶ client
//! ```
//!
//! The stream opens with `{"type":"start"}`, carries one
//! `{"type":"chunk","content":..}` frame per reassembled chunk, and closes
//! with `{"type":"end"}` or a single `{"type":"error","message":..}`.

mod api;
mod form;
pub mod relay;
mod server;

pub use api::{ApiError, ApiResponse, AppState, UserInfo};
pub use form::{GenerationForm, NumField, RawGenerationRequest};
pub use relay::RelayFrame;
pub use server::{build_router, start_server};

use std::net::SocketAddr;
use std::sync::Arc;

use quill_rs::Completions;

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
    /// Token accepted by `GET /user`. With `None`, that route always answers
    /// 401.
    pub auth_token: Option<String>,
    /// Frames buffered between the relay task and a slow client. Default: 1.
    pub stream_buffer: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            auth_token: None,
            stream_buffer: 1,
        }
    }
}

/// Spawn the relay server on a Tokio task and return its bound address.
///
/// The server runs until the Tokio runtime shuts down.
pub async fn spawn_web(
    backend: Arc<dyn Completions>,
    config: WebConfig,
) -> std::io::Result<SocketAddr> {
    let state = AppState {
        backend,
        auth_token: config.auth_token.map(Arc::from),
        stream_buffer: config.stream_buffer,
    };
    let router = build_router(state);
    start_server(router, config.bind_addr).await
}
