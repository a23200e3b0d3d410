//! Serve the research pipeline over HTTP.
//!
//! # Usage
//!
//! ```bash
//! OPENROUTER_KEY=sk-... cargo run -p diligent-web
//! OPENROUTER_KEY=sk-... cargo run -p diligent-web -- --port 8080 --model anthropic/claude-sonnet-4
//! OPENROUTER_KEY=sk-... cargo run -p diligent-web -- --templates-dir ./templates --log-sessions
//! ```
//!
//! Then start a run:
//!
//! ```bash
//! curl -X POST localhost:3001/api/research \
//!   -H 'content-type: application/json' \
//!   -d '{"mode": "dara", "topic": "oat milk", "region": "Scandinavia"}'
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use diligent::OpenRouterClient;
use diligent::config::PipelineConfig;
use diligent::service::ResearchService;
use diligent_web::{WebConfig, spawn_web};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// HTTP API for research chains and artifacts.
#[derive(Parser)]
#[command(about = "HTTP JSON API for the diligent research pipeline")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Listen on all interfaces instead of localhost.
    #[arg(long)]
    public: bool,

    /// LLM model to use (overrides DILIGENT_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// Directory containing DARA.md and DeepSpec_Prompt_Library.md.
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Record every prompt and response under the logs directory.
    #[arg(long)]
    log_sessions: bool,

    /// Static front-end directory served for non-API paths.
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = PipelineConfig::from_env();
    if let Some(model) = &args.model {
        config = config.with_model(model);
    }
    if let Some(dir) = &args.templates_dir {
        config = config.with_templates_dir(dir);
    }
    if args.log_sessions {
        config = config.with_session_logging(true);
    }

    let client = OpenRouterClient::from_env().map_err(|e| format!("API client: {e}"))?;
    let service = Arc::new(ResearchService::new(client, config));

    let host = if args.public { [0, 0, 0, 0] } else { [127, 0, 0, 1] };
    let web_config = WebConfig {
        bind_addr: (host, args.port).into(),
        static_dir: args.static_dir,
    };
    let addr = spawn_web(service, web_config)
        .await
        .map_err(|e| format!("failed to bind: {e}"))?;
    info!("Listening on http://{addr}");
    println!("API: http://{addr}/api/research");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to wait for Ctrl-C: {e}"))?;
    info!("Shutting down");
    Ok(())
}
