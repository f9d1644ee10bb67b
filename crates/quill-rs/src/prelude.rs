//! Convenience re-exports for common `quill-rs` types.
//!
//! ```ignore
//! use quill_rs::prelude::*;
//! ```
//!
//! Pulls in the client, its configuration, the prompt builder and the
//! stream cursor. Reassembler internals (thresholds, break characters) stay
//! in [`api::streaming`](crate::api::streaming).

// ── Client ──────────────────────────────────────────────────────────
pub use crate::{
    CompletionFuture, Completions, DeepSeekClient, Message, RelayError, Role, Sampling,
    UpstreamConfig,
};

// ── Prompts ─────────────────────────────────────────────────────────
pub use crate::prompt::{GenerationRequest, Prompt, TemplateKind, build_prompt};

// ── Streaming ───────────────────────────────────────────────────────
pub use crate::api::streaming::{ByteFuture, ByteSource, ChunkStream, StreamItem};
