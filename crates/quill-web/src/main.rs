//! Content-generation relay server.
//!
//! # Usage
//!
//! ```bash
//! DEEPSEEK_API_KEY=sk-... cargo run -p quill-web
//! DEEPSEEK_API_KEY=sk-... cargo run -p quill-web -- --bind 0.0.0.0:8080
//! DEEPSEEK_API_KEY=sk-... QUILL_AUTH_TOKEN=secret cargo run -p quill-web
//! ```
//!
//! ## Requests
//!
//! ```bash
//! curl -N http://127.0.0.1:3001/deepseek/streamChat \
//!   -H 'content-type: application/json' \
//!   -d '{"model_id":"deepseek-chat","text":"...","channels":"blog","direction":"review",
//!        "requirements":"short","num":1,"seo_keywords":"coffee","scope":"web"}'
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use quill_rs::{DEEPSEEK_URL, DEFAULT_MODEL, DeepSeekClient, UpstreamConfig};
use quill_web::{WebConfig, spawn_web};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Content-generation relay server.
#[derive(Parser)]
#[command(about = "Relay content-generation requests to a DeepSeek-compatible API")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "QUILL_BIND", default_value = "127.0.0.1:3001")]
    bind: SocketAddr,

    /// Chat completions endpoint.
    #[arg(long, env = "DEEPSEEK_ENDPOINT", default_value = DEEPSEEK_URL)]
    endpoint: String,

    /// API key for the upstream.
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Model used when a request leaves `model_id` blank.
    #[arg(long, env = "DEEPSEEK_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Timeout in seconds for non-streaming upstream calls.
    #[arg(long, default_value_t = 120)]
    request_timeout: u64,

    /// Seconds to wait for the next upstream read before failing a stream.
    #[arg(long, default_value_t = 60)]
    read_timeout: u64,

    /// Bearer token accepted by `GET /user`.
    #[arg(long, env = "QUILL_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 1. Upstream client, configured once and shared by every request.
    let config = UpstreamConfig::new(args.api_key)
        .with_endpoint(args.endpoint)
        .with_default_model(args.model)
        .with_request_timeout(Duration::from_secs(args.request_timeout))
        .with_read_timeout(Duration::from_secs(args.read_timeout));
    let client = DeepSeekClient::new(config).map_err(|e| e.to_string())?;
    let upstream = client.config();
    info!(
        "Upstream: {} (default model {}, read timeout {:?})",
        upstream.endpoint, upstream.default_model, upstream.read_timeout
    );

    // 2. Spawn the HTTP server.
    let web_config = WebConfig {
        bind_addr: args.bind,
        auth_token: args.auth_token,
        ..Default::default()
    };
    let addr = spawn_web(Arc::new(client), web_config)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", args.bind))?;
    info!("Relay listening on http://{addr}");

    // 3. Run until interrupted.
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to wait for shutdown signal: {e}"))?;
    info!("Shutting down");
    Ok(())
}
