//! Error taxonomy shared by the client, the reassembler and the web relay.

use thiserror::Error;

/// Everything that can go wrong between an inbound request and the upstream
/// completion API.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A required request field is missing or malformed. Raised before any
    /// upstream call is attempted.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The upstream API answered with a non-2xx status.
    #[error("upstream API error: {message}")]
    UpstreamApi {
        status: Option<u16>,
        message: String,
    },

    /// The upstream API answered 2xx but the expected content field is absent.
    #[error("malformed upstream response: {0}")]
    UpstreamMalformed(String),

    /// Connection-level failure while sending or while reading a stream.
    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    /// The client or server could not be configured.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether the caller, not the upstream, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
