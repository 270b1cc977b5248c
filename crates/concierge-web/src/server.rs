//! Axum server setup and router construction.

use std::net::SocketAddr;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::api::{self, AppState};

/// Build the full axum router.
///
/// Status routes, the single-agent routes, the two search routes and the
/// saved-result routes, all under `/api`.
pub fn build_router(state: AppState) -> Router {
    // Browser frontends are served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(api::get_health))
        .route("/api/agents", get(api::get_agents))
        .route("/api/chat", post(api::post_chat))
        .route("/api/agent", post(api::post_agent))
        .route("/api/analysis", post(api::post_analysis))
        .route("/api/comparison", post(api::post_comparison))
        .route("/api/ui-generation", post(api::post_ui_generation))
        .route("/api/restaurant-search", post(api::post_restaurant_search))
        .route("/api/restaurant-search/save", post(api::post_restaurant_save))
        .route("/api/restaurant-search/history", get(api::get_restaurant_history))
        .route(
            "/api/restaurant-search/saved/{id}",
            get(api::get_restaurant_saved)
                .patch(api::patch_restaurant_saved)
                .delete(api::delete_restaurant_saved),
        )
        .route("/api/tourism-spots", post(api::post_tourism_spots))
        .route("/api/tourism-spots/save", post(api::post_tourism_save))
        .with_state(state)
        .layer(cors)
}

/// Bind `bind_addr`, serve `router` on a background task and return the
/// bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Server stopped: {e}");
        }
    });

    Ok(addr)
}
