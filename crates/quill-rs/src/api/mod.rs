//! Upstream response handling.
//!
//! - [`streaming`]: line reassembly of the upstream SSE body, delta
//!   extraction and re-chunking into [`StreamItem`](streaming::StreamItem)s.

pub mod streaming;
