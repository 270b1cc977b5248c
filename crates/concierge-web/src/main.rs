//! HTTP service for concierge features.
//!
//! # Usage
//!
//! ```bash
//! OPENROUTER_KEY=sk-... cargo run -p concierge-web
//! OPENROUTER_KEY=sk-... cargo run -p concierge-web -- --port 8080 --live-search
//! OPENROUTER_KEY=sk-... cargo run -p concierge-web -- --model google/gemini-2.5-flash
//! ```
//!
//! Then call the API, e.g.:
//!
//! ```bash
//! curl -s localhost:3001/api/restaurant-search \
//!   -H 'content-type: application/json' \
//!   -d '{"message": "渋谷で個室のあるデート向けディナー"}'
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use concierge_rs::OpenRouterClient;
use concierge_rs::agent::{ConciergeConfig, LoggingHandler};
use concierge_rs::agents::Concierge;
use concierge_rs::api::RetryConfig;
use concierge_rs::logging::init_logging;
use concierge_web::{AppState, WebConfig, spawn_web};
use tracing::info;

/// Concierge HTTP service.
#[derive(Parser)]
#[command(about = "Serve concierge agents and search workflows over HTTP")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Bind on all interfaces instead of localhost.
    #[arg(long)]
    public: bool,

    /// Model for every step (overrides CONCIERGE_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// Use live web search instead of the fixed restaurant table.
    #[arg(long)]
    live_search: bool,

    /// Retries per step for transient API errors.
    #[arg(long)]
    retries: Option<u32>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn build_config(args: &Args) -> Result<ConciergeConfig, String> {
    let mut config = ConciergeConfig::from_env();
    if let Some(model) = &args.model {
        config.defaults.model = model.clone();
    }
    if args.live_search {
        config.live_search = true;
    }
    if let Some(retries) = args.retries {
        config.defaults.retry = RetryConfig::with_retries(retries);
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = build_config(&args)?;
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "Set OPENROUTER_KEY env var to your OpenRouter API key")?;
    let client = OpenRouterClient::with_headers(api_key, &config.referer, &config.title)
        .map_err(|e| e.to_string())?;

    info!(
        "Model: {}, live search: {}, top {}",
        config.defaults.model, config.live_search, config.top_n
    );
    let concierge = Concierge::new(Arc::new(client), config).with_handler(Arc::new(LoggingHandler));

    let host = if args.public { [0, 0, 0, 0] } else { [127, 0, 0, 1] };
    let web_config = WebConfig {
        bind_addr: SocketAddr::from((host, args.port)),
    };
    let addr = spawn_web(AppState::new(concierge), web_config)
        .await
        .map_err(|e| format!("failed to bind port {}: {e}", args.port))?;
    println!("Concierge API: http://{addr}/api/health");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for Ctrl-C: {e}"))?;
    info!("Shutting down");
    Ok(())
}
