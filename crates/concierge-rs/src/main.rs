//! Run concierge features from the command line.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Chat, streamed as it is generated
//! concierge chat --stream "東京でおすすめの美術館は？"
//!
//! # Analysis report from stdin
//! cat sales.csv | concierge analyze --analysis-type trend
//!
//! # Restaurant search page, written to a file
//! concierge --top-n 3 --output dinner.html restaurants "渋谷で個室のあるデート向けディナー"
//!
//! # Live web search instead of the fixed table, full JSON envelope
//! concierge --live-search --json restaurants "銀座で接待"
//! ```

use clap::{Parser, Subcommand};
use concierge_rs::agent::{
    AgentResponse, CompositeEventHandler, ConciergeConfig, EventHandler, LoggingHandler,
    SessionState, StepContext, WorkflowEvent,
};
use concierge_rs::agents::service::session;
use concierge_rs::agents::{
    Concierge, DeviceType, Feature, Orchestrator, catalog, chat_agent, validate_message,
};
use concierge_rs::api::generate_trace_id;
use concierge_rs::api::streaming::{StreamEvent, collect_text, extract_usage};
use concierge_rs::api::RetryConfig;
use concierge_rs::logging::init_logging;
use concierge_rs::{OpenRouterClient, Plugin, format_citations};
use std::io::{self, IsTerminal, Read, Write};
use std::process;
use std::sync::Arc;

/// Run concierge features: chat, analysis, UI generation and venue search.
///
/// Reads the API key from the OPENROUTER_KEY environment variable.
#[derive(Parser)]
#[command(name = "concierge", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    // ── Model ──────────────────────────────────────────────────
    /// Model for every step (overrides CONCIERGE_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Maximum tokens per step
    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    /// Sampling temperature (0.0 – 2.0)
    #[arg(long, global = true)]
    temperature: Option<f32>,

    /// Retries per step for transient API errors
    #[arg(long, global = true)]
    retries: Option<u32>,

    // ── Search ─────────────────────────────────────────────────
    /// Use live web search instead of the fixed restaurant table
    #[arg(long, global = true)]
    live_search: bool,

    /// Number of venues to select
    #[arg(long, global = true)]
    top_n: Option<usize>,

    // ── Output ─────────────────────────────────────────────────
    /// Print the full JSON response envelope
    #[arg(long, global = true)]
    json: bool,

    /// Write the output to a file instead of stdout
    #[arg(long, short, global = true)]
    output: Option<String>,

    /// Session id reported in JSON output
    #[arg(long, global = true)]
    session_id: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// General conversation
    Chat {
        /// Message to send (read from stdin when omitted)
        message: Option<String>,

        /// Print the reply as it is generated
        #[arg(long)]
        stream: bool,

        /// Let the model search the web and list its sources
        #[arg(long)]
        web_search: bool,
    },
    /// Structured analysis report
    Analyze {
        /// Content to analyze (read from stdin when omitted)
        content: Option<String>,

        /// Focus of the report, e.g. trend, sentiment
        #[arg(long, default_value = "general")]
        analysis_type: String,
    },
    /// Objective comparison of options
    Compare {
        /// What to compare (read from stdin when omitted)
        content: Option<String>,
    },
    /// Generate an HTML page
    Ui {
        /// Description of the page (read from stdin when omitted)
        prompt: Option<String>,

        /// Target device: desktop, tablet, mobile or auto
        #[arg(long, default_value = "auto")]
        device: DeviceType,
    },
    /// Route a request to the right specialist and run it
    Route {
        /// Request (read from stdin when omitted)
        input: Option<String>,

        /// Only print the routing decision
        #[arg(long)]
        dry_run: bool,

        /// Analysis focus if the request is routed to analysis
        #[arg(long, default_value = "general")]
        analysis_type: String,

        /// Target device if the request is routed to UI generation
        #[arg(long, default_value = "auto")]
        device: DeviceType,
    },
    /// Restaurant recommendations as an HTML page
    Restaurants {
        /// Request, e.g. "渋谷で個室のあるデート向けディナー"
        request: Option<String>,
    },
    /// Tourism spot recommendations as an HTML page
    Tourism {
        /// Request, e.g. "秋の京都で紅葉を見たい"
        request: Option<String>,
    },
    /// List the available features
    Agents,
}

// ── Helpers ────────────────────────────────────────────────────────

/// The positional argument, or stdin when it is absent or `-`.
fn input_or_stdin(arg: Option<&str>) -> Result<String, String> {
    match arg {
        Some(text) if text != "-" => Ok(text.to_string()),
        _ => {
            if io::stdin().is_terminal() {
                return Err("no input given (pass it as an argument or pipe it on stdin)".to_string());
            }
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            Ok(buf)
        }
    }
}

/// Env config overridden by CLI flags.
fn build_config(cli: &Cli) -> Result<ConciergeConfig, String> {
    let mut config = ConciergeConfig::from_env();
    if let Some(model) = &cli.model {
        config.defaults.model = model.clone();
    }
    if let Some(max_tokens) = cli.max_tokens {
        config.defaults.max_tokens = max_tokens;
    }
    if let Some(temperature) = cli.temperature {
        config.defaults.temperature = temperature;
    }
    if let Some(retries) = cli.retries {
        config.defaults.retry = RetryConfig::with_retries(retries);
    }
    if cli.live_search {
        config.live_search = true;
    }
    if let Some(top_n) = cli.top_n {
        config.top_n = top_n;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn build_client(config: &ConciergeConfig) -> Result<OpenRouterClient, String> {
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable is not set".to_string())?;
    OpenRouterClient::with_headers(api_key, &config.referer, &config.title).map_err(|e| e.to_string())
}

/// Prints step progress to stderr.
struct CliEventHandler;

impl EventHandler for CliEventHandler {
    fn on_event(&self, event: &WorkflowEvent<'_>) {
        match event {
            WorkflowEvent::StepStart {
                index, total, step, ..
            } => {
                eprintln!("  [{index}/{total}] {step}");
            }
            WorkflowEvent::Retrying {
                step,
                attempt,
                max_retries,
                ..
            } => {
                eprintln!("  [retry {attempt}/{max_retries}] {step}");
            }
            WorkflowEvent::StepFailed { step, error } => {
                eprintln!("  [failed] {step}: {error}");
            }
            _ => {}
        }
    }
}

/// What to print for a response: the envelope with `--json`, else the
/// HTML for page features and the message or error for the rest.
fn render_response(response: &AgentResponse, json: bool) -> Result<String, String> {
    if json {
        return serde_json::to_string_pretty(response)
            .map_err(|e| format!("failed to format response: {e}"));
    }
    if let Some(html) = &response.html {
        return Ok(html.clone());
    }
    if response.success {
        Ok(response.message.clone().unwrap_or_default())
    } else {
        Err(response.error.clone().unwrap_or_else(|| "request failed".to_string()))
    }
}

fn write_output(text: &str, path: Option<&str>) -> Result<(), String> {
    match path {
        Some(path) => {
            std::fs::write(path, text).map_err(|e| format!("failed to write '{path}': {e}"))?;
            eprintln!("  Wrote {} bytes to {path}", text.len());
            Ok(())
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{text}").map_err(|e| format!("failed to write output: {e}"))
        }
    }
}

// ── Commands ───────────────────────────────────────────────────────

async fn chat(
    cli: &Cli,
    client: &OpenRouterClient,
    config: &ConciergeConfig,
    message: &str,
    stream: bool,
    web_search: bool,
) -> Result<String, String> {
    let message = validate_message(message).map_err(|e| e.to_string())?;
    let mut agent = chat_agent();
    if web_search {
        agent = agent.plugin(Plugin::web());
    }
    let state = SessionState::with_input(message);
    let started = std::time::Instant::now();

    let text = if stream {
        let request = agent.build_request(&state, &config.defaults);
        let echo = cli.output.is_none() && !cli.json;
        let events = client
            .chat_stream_live(&request, |event| {
                if echo && let StreamEvent::TextDelta(delta) = event {
                    print!("{delta}");
                    let _ = io::stdout().flush();
                }
            })
            .await
            .map_err(|e| e.to_string())?;
        if let Some(usage) = extract_usage(&events) {
            tracing::debug!(
                "Stream usage: prompt={:?}, completion={:?}",
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }
        if echo {
            println!();
            return Ok(String::new());
        }
        collect_text(&events)
    } else {
        let trace_id = generate_trace_id();
        let ctx = StepContext {
            backend: client,
            state: &state,
            defaults: &config.defaults,
            handler: &LoggingHandler,
            trace_id: &trace_id,
        };
        let reply = agent.invoke(ctx).await.map_err(|e| e.to_string())?;
        format!(
            "{}{}",
            reply.value.as_str().unwrap_or_default(),
            format_citations(&reply.completion.annotations)
        )
    };

    if cli.json {
        let response = AgentResponse::ok(Feature::BasicChat.slug(), session(cli.session_id.as_deref()), text)
            .with_timing(started.elapsed().as_millis() as u64);
        return render_response(&response, true);
    }
    Ok(text)
}

async fn route(
    cli: &Cli,
    concierge: &Concierge,
    client: &OpenRouterClient,
    input: &str,
    orchestrator: Orchestrator,
    dry_run: bool,
) -> Result<String, String> {
    if !dry_run {
        let response = concierge
            .orchestrate_with(&orchestrator, input, cli.session_id.as_deref())
            .await
            .map_err(|e| e.to_string())?;
        return render_response(&response, cli.json);
    }
    let input = validate_message(input).map_err(|e| e.to_string())?;
    let config = concierge.config();
    let decision = orchestrator
        .route(client, &config.defaults, input, &LoggingHandler)
        .await;
    if cli.json {
        serde_json::to_string_pretty(&decision).map_err(|e| format!("failed to format decision: {e}"))
    } else {
        Ok(format!(
            "{} (confidence {:.2}, by {:?})",
            decision.route, decision.confidence, decision.source
        ))
    }
}

fn list_agents(json: bool) -> Result<String, String> {
    let entries = catalog();
    if json {
        return serde_json::to_string_pretty(&entries).map_err(|e| format!("failed to format catalog: {e}"));
    }
    let width = entries.iter().map(|e| e.slug.len()).max().unwrap_or(0);
    Ok(entries
        .iter()
        .map(|e| format!("{:width$}  {}: {}", e.slug, e.name, e.description))
        .collect::<Vec<_>>()
        .join("\n"))
}

async fn run(cli: &Cli) -> Result<String, String> {
    if let Command::Agents = cli.command {
        return list_agents(cli.json);
    }

    let config = build_config(cli)?;
    let client = Arc::new(build_client(&config)?);

    let handler = CompositeEventHandler::new()
        .with_if(cli.verbose > 0, LoggingHandler)
        .with_if(cli.verbose == 0, CliEventHandler);
    let concierge = Concierge::new(client.clone(), config.clone()).with_handler(Arc::new(handler));
    let session = cli.session_id.as_deref();

    let response = match &cli.command {
        Command::Chat {
            message,
            stream,
            web_search,
        } => {
            let message = input_or_stdin(message.as_deref())?;
            return chat(cli, &client, &config, &message, *stream, *web_search).await;
        }
        Command::Route {
            input,
            dry_run,
            analysis_type,
            device,
        } => {
            let input = input_or_stdin(input.as_deref())?;
            let orchestrator = Orchestrator::new()
                .map_err(|e| e.to_string())?
                .with_analysis_type(analysis_type)
                .with_device(*device);
            return route(cli, &concierge, &client, &input, orchestrator, *dry_run).await;
        }
        Command::Analyze {
            content,
            analysis_type,
        } => {
            let content = input_or_stdin(content.as_deref())?;
            concierge.analyze(&content, Some(analysis_type), session).await
        }
        Command::Compare { content } => {
            let content = input_or_stdin(content.as_deref())?;
            concierge.compare(&content, session).await
        }
        Command::Ui { prompt, device } => {
            let prompt = input_or_stdin(prompt.as_deref())?;
            concierge.generate_ui(&prompt, *device, session).await
        }
        Command::Restaurants { request } => {
            let request = input_or_stdin(request.as_deref())?;
            concierge.search(Feature::RestaurantSearch, &request, session).await
        }
        Command::Tourism { request } => {
            let request = input_or_stdin(request.as_deref())?;
            concierge.search(Feature::TourismSpots, &request, session).await
        }
        Command::Agents => return list_agents(cli.json),
    }
    .map_err(|e| e.to_string())?;

    if !response.success {
        eprintln!("  Error: {}", response.error.as_deref().unwrap_or("request failed"));
    }
    render_response(&response, cli.json)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli).await {
        Ok(text) if text.is_empty() => {}
        Ok(text) => {
            if let Err(e) = write_output(&text, cli.output.as_deref()) {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
