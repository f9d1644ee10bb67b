//! Content-generation relay core: prompt building, the upstream completion
//! client, and SSE re-chunking.
//!
//! `quill-rs` turns a [`GenerationRequest`] into a [`Prompt`], sends it to a
//! DeepSeek-compatible chat completions endpoint, and either returns the
//! generated text in one piece ([`DeepSeekClient::complete`]) or hands back a
//! lazily re-chunked stream of text ([`ChunkStream`]).
//!
//! # Getting started
//!
//! ```ignore
//! use quill_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> quill_rs::Result<()> {
//!     let config = UpstreamConfig::new(std::env::var("DEEPSEEK_API_KEY").unwrap());
//!     let client = DeepSeekClient::new(config)?;
//!
//!     let prompt = build_prompt(&request, TemplateKind::Stream);
//!     let mut chunks = client
//!         .stream_chunks(&prompt, &[], "deepseek-chat", Sampling::default())
//!         .await?;
//!     while let Some(item) = chunks.next_item().await? {
//!         print!("{}", item.text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`prompt`]: [`GenerationRequest`], the two fixed templates, source
//!   truncation.
//! - [`api::streaming`]: [`ByteSource`], the [`Reassembler`] state machine and
//!   the [`ChunkStream`] pull cursor.
//! - [`config`]: [`UpstreamConfig`] and [`Sampling`].
//! - [`error`]: [`RelayError`].
//!
//! The web layer talks to the upstream only through the [`Completions`]
//! trait, so it can be driven by a test double.

pub mod api;
pub mod config;
pub mod error;
pub mod prelude;
pub mod prompt;

pub use api::streaming::{
    ByteFuture, ByteSource, ChunkStream, Reassembler, StreamItem, UpstreamBody,
};
pub use config::{DEEPSEEK_URL, DEFAULT_MODEL, Sampling, UpstreamConfig};
pub use error::{RelayError, Result};
pub use prompt::{GenerationRequest, Prompt, TemplateKind, build_prompt};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

// ── Messages ───────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in the conversation history sent upstream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append `prompt` as the final user message of `history`.
pub fn build_messages(prompt: &Prompt, history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend_from_slice(history);
    messages.push(Message::user(prompt.as_str()));
    messages
}

// ── Wire types ─────────────────────────────────────────────────────

/// Chat completion request body.
#[derive(Serialize, Debug)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub top_p: f32,
    pub stream: bool,
}

#[derive(Deserialize, Debug)]
struct RawCompletion {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: Option<RawMessage>,
}

#[derive(Deserialize, Debug)]
struct RawMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize, Debug)]
struct ApiErrorDetail {
    message: String,
}

/// Build an [`RelayError::UpstreamApi`] from a non-2xx response.
///
/// Prefers the `error.message` field of a JSON error body, then the raw body
/// text, then the bare status line.
pub fn api_error(status: reqwest::StatusCode, body: &str) -> RelayError {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if !body.trim().is_empty() => format!("HTTP {status}: {}", body.trim()),
        Err(_) => format!("HTTP {status}"),
    };
    RelayError::UpstreamApi {
        status: Some(status.as_u16()),
        message,
    }
}

/// Pull `choices[0].message.content` out of a 2xx response body.
fn extract_content(body: &str) -> Result<String> {
    let parsed: RawCompletion = serde_json::from_str(body)
        .map_err(|e| RelayError::UpstreamMalformed(format!("failed to parse response: {e}")))?;

    if let Some(err) = parsed.error {
        return Err(RelayError::UpstreamApi {
            status: None,
            message: err.message,
        });
    }

    parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| {
            RelayError::UpstreamMalformed("choices[0].message.content is missing".to_string())
        })
}

// ── Completions seam ───────────────────────────────────────────────

/// Boxed future returned by [`Completions`] methods.
pub type CompletionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The upstream operations the web relay depends on.
pub trait Completions: Send + Sync {
    /// Wait for the whole completion and return its text.
    fn complete<'a>(
        &'a self,
        prompt: &'a Prompt,
        history: &'a [Message],
        model: &'a str,
        sampling: Sampling,
    ) -> CompletionFuture<'a, String>;

    /// Open a streaming completion. Fails before returning if the upstream
    /// rejects the request.
    fn complete_streaming<'a>(
        &'a self,
        prompt: &'a Prompt,
        history: &'a [Message],
        model: &'a str,
        sampling: Sampling,
    ) -> CompletionFuture<'a, Box<dyn ByteSource>>;
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for a DeepSeek-compatible chat completions API.
pub struct DeepSeekClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl DeepSeekClient {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("quill/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// `model`, or the configured default when `model` is blank.
    fn resolve_model<'a>(&'a self, model: &'a str) -> &'a str {
        if model.trim().is_empty() {
            &self.config.default_model
        } else {
            model
        }
    }

    fn request_body(
        &self,
        prompt: &Prompt,
        history: &[Message],
        model: &str,
        sampling: Sampling,
        stream: bool,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.resolve_model(model).to_string(),
            messages: build_messages(prompt, history),
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            stream,
        }
    }

    /// POST `body` and return the response if its status is 2xx.
    async fn send(
        &self,
        body: &CompletionRequest,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response> {
        debug!(
            "LLM request: model={}, messages={}, temp={}, top_p={}, stream={}",
            body.model,
            body.messages.len(),
            body.temperature,
            body.top_p,
            body.stream,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| RelayError::UpstreamTransport(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!("Upstream rejected request: HTTP {status}");
            return Err(api_error(status, &text));
        }
        Ok(resp)
    }

    /// Send a non-streaming completion and return the generated text.
    pub async fn complete(
        &self,
        prompt: &Prompt,
        history: &[Message],
        model: &str,
        sampling: Sampling,
    ) -> Result<String> {
        let body = self.request_body(prompt, history, model, sampling, false);
        let start = Instant::now();

        let resp = self.send(&body, Some(self.config.request_timeout)).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| RelayError::UpstreamTransport(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response in {:.1}s ({} bytes)",
            start.elapsed().as_secs_f64(),
            text.len()
        );

        extract_content(&text)
    }

    /// Open a streaming completion and return its body for incremental reads.
    pub async fn complete_streaming(
        &self,
        prompt: &Prompt,
        history: &[Message],
        model: &str,
        sampling: Sampling,
    ) -> Result<UpstreamBody> {
        let body = self.request_body(prompt, history, model, sampling, true);
        let resp = self.send(&body, None).await?;
        debug!("Upstream stream opened: HTTP {}", resp.status());
        Ok(UpstreamBody::new(resp))
    }

    /// [`complete_streaming`](Self::complete_streaming) wrapped in a
    /// [`ChunkStream`].
    pub async fn stream_chunks(
        &self,
        prompt: &Prompt,
        history: &[Message],
        model: &str,
        sampling: Sampling,
    ) -> Result<ChunkStream<UpstreamBody>> {
        let body = self
            .complete_streaming(prompt, history, model, sampling)
            .await?;
        Ok(ChunkStream::new(body))
    }
}

impl Completions for DeepSeekClient {
    fn complete<'a>(
        &'a self,
        prompt: &'a Prompt,
        history: &'a [Message],
        model: &'a str,
        sampling: Sampling,
    ) -> CompletionFuture<'a, String> {
        Box::pin(DeepSeekClient::complete(self, prompt, history, model, sampling))
    }

    fn complete_streaming<'a>(
        &'a self,
        prompt: &'a Prompt,
        history: &'a [Message],
        model: &'a str,
        sampling: Sampling,
    ) -> CompletionFuture<'a, Box<dyn ByteSource>> {
        Box::pin(async move {
            let body =
                DeepSeekClient::complete_streaming(self, prompt, history, model, sampling).await?;
            Ok::<_, RelayError>(Box::new(body) as Box<dyn ByteSource>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> Prompt {
        let request = GenerationRequest {
            model_id: "deepseek-chat".into(),
            text: "source".into(),
            channels: "blog".into(),
            direction: "news".into(),
            requirements: "none".into(),
            num: 1,
            seo_keywords: "kw".into(),
            scope: "web".into(),
        };
        build_prompt(&request, TemplateKind::Document)
    }

    #[test]
    fn empty_history_becomes_single_user_message() {
        let p = prompt();
        let messages = build_messages(&p, &[]);
        assert_eq!(messages, vec![Message::user(p.as_str())]);
    }

    #[test]
    fn prompt_is_appended_after_history() {
        let p = prompt();
        let history = vec![Message::user("earlier"), Message::assistant("reply")];
        let messages = build_messages(&p, &history);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::assistant("reply"));
        assert_eq!(messages[2].role, Role::User);
        assert_eq!(messages[2].content, p.as_str());
    }

    #[test]
    fn request_body_serializes_expected_fields() {
        let client = DeepSeekClient::new(UpstreamConfig::new("sk-test")).unwrap();
        let body = client.request_body(&prompt(), &[], "", Sampling::default(), true);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], DEFAULT_MODEL);
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!((json["top_p"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn explicit_model_wins_over_default() {
        let client = DeepSeekClient::new(UpstreamConfig::new("sk-test")).unwrap();
        let body = client.request_body(
            &prompt(),
            &[],
            "deepseek-reasoner",
            Sampling::default(),
            false,
        );
        assert_eq!(body.model, "deepseek-reasoner");
        assert!(!body.stream);
    }

    #[test]
    fn client_exposes_its_config() {
        let config = UpstreamConfig::new("sk-test")
            .with_default_model("deepseek-reasoner")
            .with_read_timeout(Duration::from_secs(5));
        let client = DeepSeekClient::new(config).unwrap();
        assert_eq!(client.config().default_model, "deepseek-reasoner");
        assert_eq!(client.config().read_timeout, Duration::from_secs(5));
    }

    #[test]
    fn extract_content_reads_first_choice() {
        let body = r##"{"choices":[{"message":{"role":"assistant","content":"# Title"}}]}"##;
        assert_eq!(extract_content(body).unwrap(), "# Title");
    }

    #[test]
    fn missing_content_is_malformed() {
        let body = r#"{"choices":[{"message":{"role":"assistant"}}]}"#;
        assert!(matches!(
            extract_content(body),
            Err(RelayError::UpstreamMalformed(_))
        ));
        assert!(matches!(
            extract_content(r#"{"choices":[]}"#),
            Err(RelayError::UpstreamMalformed(_))
        ));
        assert!(matches!(
            extract_content("not json"),
            Err(RelayError::UpstreamMalformed(_))
        ));
    }

    #[test]
    fn api_error_prefers_upstream_message() {
        let body = r#"{"error":{"message":"Authentication Fails","type":"authentication_error"}}"#;
        match api_error(reqwest::StatusCode::UNAUTHORIZED, body) {
            RelayError::UpstreamApi { status, message } => {
                assert_eq!(status, Some(401));
                assert_eq!(message, "Authentication Fails");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn api_error_falls_back_to_raw_text() {
        let err = api_error(reqwest::StatusCode::BAD_GATEWAY, "upstream timed out\n");
        assert!(err.to_string().contains("502 Bad Gateway: upstream timed out"));

        let err = api_error(reqwest::StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(err.to_string().ends_with("HTTP 503 Service Unavailable"));
    }
}
