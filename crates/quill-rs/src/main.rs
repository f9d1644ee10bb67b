//! Generate content from the command line and print the result.
//!
//! Reads the API key from `--api-key` or the `DEEPSEEK_API_KEY` environment
//! variable.
//!
//! # Examples
//!
//! ```sh
//! # Markdown articles in one response
//! quill --text "$(cat notes.txt)" --channels blog --direction review \
//!   --requirements "friendly tone" --num 2 --seo-keywords "espresso" --scope web
//!
//! # Plain text, printed as it streams in
//! cat notes.txt | quill --stdin --stream --channels newsletter --direction summary \
//!   --requirements "three bullet points" --num 1 --seo-keywords "roastery" --scope internal
//! ```

use std::io::{self, Read, Write};
use std::process;

use clap::Parser;
use quill_rs::prelude::*;
use quill_rs::{DEEPSEEK_URL, DEFAULT_MODEL};
use tracing_subscriber::EnvFilter;

/// Generate content through a DeepSeek-compatible completion API.
#[derive(Parser)]
#[command(name = "quill")]
struct Cli {
    // ── Source ─────────────────────────────────────────────────
    /// Source text to rewrite
    #[arg(long, conflicts_with = "stdin")]
    text: Option<String>,

    /// Read the source text from stdin
    #[arg(long)]
    stdin: bool,

    // ── Request fields ─────────────────────────────────────────
    /// Target publishing channel(s)
    #[arg(long)]
    channels: String,

    /// Content direction or angle
    #[arg(long)]
    direction: String,

    /// Free-text requirements
    #[arg(long)]
    requirements: String,

    /// Number of articles to produce
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    num: u32,

    /// SEO keywords
    #[arg(long)]
    seo_keywords: String,

    /// Intended usage scope
    #[arg(long)]
    scope: String,

    // ── Upstream ───────────────────────────────────────────────
    /// Model identifier
    #[arg(long, env = "DEEPSEEK_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Chat completions endpoint
    #[arg(long, env = "DEEPSEEK_ENDPOINT", default_value = DEEPSEEK_URL)]
    endpoint: String,

    /// API key for the upstream
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    api_key: String,

    // ── Output ─────────────────────────────────────────────────
    /// Stream plain text instead of waiting for a Markdown document
    #[arg(long)]
    stream: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let text = match (&cli.text, cli.stdin) {
        (Some(t), _) => t.clone(),
        (None, true) => {
            let mut buf = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buf) {
                eprintln!("Error: failed to read stdin: {e}");
                process::exit(1);
            }
            buf
        }
        (None, false) => {
            eprintln!("Error: provide --text or --stdin");
            process::exit(1);
        }
    };

    let request = GenerationRequest {
        model_id: cli.model.clone(),
        text,
        channels: cli.channels.clone(),
        direction: cli.direction.clone(),
        requirements: cli.requirements.clone(),
        num: cli.num,
        seo_keywords: cli.seo_keywords.clone(),
        scope: cli.scope.clone(),
    };

    let config = UpstreamConfig::new(cli.api_key.clone())
        .with_endpoint(cli.endpoint.clone())
        .with_default_model(cli.model.clone());
    let client = match DeepSeekClient::new(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let result = if cli.stream {
        stream_to_stdout(&client, &request).await
    } else {
        let prompt = build_prompt(&request, TemplateKind::Document);
        client
            .complete(&prompt, &[], &request.model_id, Sampling::default())
            .await
            .map(|text| println!("{text}"))
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Print each chunk as soon as it arrives.
async fn stream_to_stdout(
    client: &DeepSeekClient,
    request: &GenerationRequest,
) -> quill_rs::Result<()> {
    let prompt = build_prompt(request, TemplateKind::Stream);
    let mut chunks = client
        .stream_chunks(&prompt, &[], &request.model_id, Sampling::default())
        .await?;

    let mut stdout = io::stdout().lock();
    while let Some(item) = chunks.next_item().await? {
        // Write errors mean stdout was closed; stop quietly.
        if stdout.write_all(item.text().as_bytes()).is_err() || stdout.flush().is_err() {
            return Ok(());
        }
    }
    let _ = writeln!(stdout);
    Ok(())
}
