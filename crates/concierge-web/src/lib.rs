//! HTTP service for concierge-rs features.
//!
//! `concierge-web` exposes the chat, analysis, comparison, UI-generation and
//! orchestrator agents and the two search workflows as a JSON API, plus an
//! in-memory store for saved search pages.
//!
//! # Quick start
//!
//! ```ignore
//! use concierge_rs::agent::ConciergeConfig;
//! use concierge_rs::agents::Concierge;
//! use concierge_rs::OpenRouterClient;
//! use concierge_web::{AppState, WebConfig, spawn_web};
//! use std::sync::Arc;
//!
//! let config = ConciergeConfig::from_env();
//! let client = OpenRouterClient::new(std::env::var("OPENROUTER_KEY")?)?;
//! let state = AppState::new(Concierge::new(Arc::new(client), config));
//!
//! let addr = spawn_web(state, WebConfig::default()).await?;
//! println!("API: http://{addr}/api/health");
//! ```
//!
//! # Endpoints
//!
//! | Method | Path | Body / query |
//! |--------|------|--------------|
//! | GET | `/api/health` | |
//! | GET | `/api/agents` | |
//! | POST | `/api/chat` | `{message, session_id?}` |
//! | POST | `/api/agent` | `{message, session_id?}` |
//! | POST | `/api/analysis` | `{content, analysis_type?, session_id?}` |
//! | POST | `/api/comparison` | `{content, session_id?}` |
//! | POST | `/api/ui-generation` | `{prompt, ui_type?, session_id?}` |
//! | POST | `/api/restaurant-search` | `{message, session_id?}` |
//! | POST | `/api/tourism-spots` | `{message, session_id?}` |
//! | POST | `/api/restaurant-search/save` | `{html_content, query, search_params?, title?}` |
//! | POST | `/api/tourism-spots/save` | same as above |
//! | GET | `/api/restaurant-search/history` | `?limit&tag&search` |
//! | GET, PATCH, DELETE | `/api/restaurant-search/saved/{id}` | `?html=true`, `{title?, tags?}` |

mod api;
mod server;
pub mod store;

pub use api::{ApiError, AppState, SearchResponse};
pub use server::build_router;
pub use store::{ResultKind, SavedResult, SavedResultStore};

use std::net::SocketAddr;

/// Configuration for the web server.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down.
pub async fn spawn_web(state: AppState, config: WebConfig) -> std::io::Result<SocketAddr> {
    let router = server::build_router(state);
    server::start_server(router, config.bind_addr).await
}
