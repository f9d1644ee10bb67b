//! Upstream endpoint configuration and sampling defaults.
//!
//! [`UpstreamConfig`] is built once at startup (usually from CLI flags with
//! environment fallbacks) and handed to [`DeepSeekClient::new`](crate::DeepSeekClient::new).
//! Nothing in the crate reads the environment on its own.

use std::time::Duration;

/// Default chat completions endpoint.
pub const DEEPSEEK_URL: &str = "https://api.deepseek.com/chat/completions";

/// Model used when the caller does not name one.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Read-only settings for the upstream completion API.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Full URL of the chat completions endpoint. Default: [`DEEPSEEK_URL`].
    pub endpoint: String,
    /// Bearer token sent with every request.
    pub api_key: String,
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub default_model: String,
    /// Whole-request timeout for non-streaming calls. Default: 120 s.
    ///
    /// Streaming calls are not bounded by this; a long generation may take
    /// minutes to drain.
    pub request_timeout: Duration,
    /// Longest wait for the next read of a response, reset after every read.
    /// Bounds a stalled stream. Default: 60 s.
    pub read_timeout: Duration,
    /// TCP/TLS connect timeout for both call kinds. Default: 10 s.
    pub connect_timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEEPSEEK_URL.to_string(),
            api_key: api_key.into(),
            default_model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
            read_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Sampling parameters forwarded verbatim to the upstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
        }
    }
}
