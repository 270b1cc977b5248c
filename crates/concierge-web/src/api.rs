//! REST API endpoint handlers.
//!
//! Every agent endpoint answers with an [`AgentResponse`] envelope. Invalid
//! input is a 400 carrying a failed envelope; a workflow that fails at run
//! time is still a 200 with `success: false`. The search endpoints wrap the
//! envelope in a [`SearchResponse`] whose `result` is the HTML page.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use concierge_rs::Error;
use concierge_rs::agent::AgentResponse;
use concierge_rs::agents::service::session;
use concierge_rs::agents::{Concierge, DeviceType, Feature, FeatureInfo, catalog};
use concierge_rs::search::html::{is_complete_document, sanitize_html};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::store::{HistoryPage, HistoryQuery, ResultKind, SaveRequest, SavedResultStore, UpdateRequest};

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub concierge: Concierge,
    pub store: Arc<SavedResultStore>,
}

impl AppState {
    pub fn new(concierge: Concierge) -> Self {
        Self {
            concierge,
            store: Arc::new(SavedResultStore::new()),
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

/// Non-200 outcomes.
#[derive(Debug)]
pub enum ApiError {
    /// Input rejected before any agent ran.
    Rejected(AgentResponse),
    /// A malformed request outside the agent envelope (e.g. a save body).
    BadRequest(String),
    NotFound(String),
}

impl ApiError {
    fn rejected(feature: &str, session_id: Option<&str>, error: Error) -> Self {
        warn!("Rejected {feature} request: {error}");
        ApiError::Rejected(AgentResponse::failure(feature, session(session_id), error.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Rejected(envelope) => (StatusCode::BAD_REQUEST, Json(envelope)).into_response(),
            ApiError::BadRequest(error) => {
                (StatusCode::BAD_REQUEST, Json(json!({"success": false, "error": error}))).into_response()
            }
            ApiError::NotFound(error) => {
                (StatusCode::NOT_FOUND, Json(json!({"success": false, "error": error}))).into_response()
            }
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ── Request and response bodies ────────────────────────────────────

/// Body for chat, orchestrated and search requests.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub content: String,
    pub analysis_type: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ComparisonRequest {
    #[serde(default)]
    pub content: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UiGenerationRequest {
    #[serde(default)]
    pub prompt: String,
    /// Target device: `desktop`, `tablet`, `mobile` or `auto`.
    pub ui_type: Option<String>,
    pub session_id: Option<String>,
}

/// Reply of the search endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub success: bool,
    /// The HTML page, or a fallback page when the search failed.
    pub result: String,
    pub processing_mode: String,
    pub processing_time_ms: u64,
    pub session_id: String,
    pub timestamp: String,
    /// Whether `result` is a full document.
    pub workflow_complete: bool,
    pub final_agent: Option<String>,
    pub steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<AgentResponse> for SearchResponse {
    fn from(response: AgentResponse) -> Self {
        let result = response.html.unwrap_or_default();
        Self {
            success: response.success,
            workflow_complete: is_complete_document(&result),
            result,
            processing_mode: response.processing_mode,
            processing_time_ms: response.processing_time_ms,
            session_id: response.session_id,
            timestamp: response.timestamp,
            final_agent: response.steps.last().cloned(),
            steps: response.steps,
            error: response.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub model: String,
    pub live_search: bool,
}

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<FeatureInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    pub result_id: String,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub page: HistoryPage,
}

#[derive(Debug, Deserialize, Default)]
pub struct SavedQuery {
    /// Return the stored page itself instead of the JSON record.
    #[serde(default)]
    pub html: bool,
}

// ── Status ─────────────────────────────────────────────────────────

/// GET /api/health
pub async fn get_health(State(app): State<AppState>) -> Json<HealthResponse> {
    let config = app.concierge.config();
    Json(HealthResponse {
        status: "ok",
        service: "concierge-web",
        version: env!("CARGO_PKG_VERSION"),
        model: config.defaults.model.clone(),
        live_search: config.live_search,
    })
}

/// GET /api/agents — The feature catalog.
pub async fn get_agents() -> Json<AgentsResponse> {
    Json(AgentsResponse { agents: catalog() })
}

// ── Agents ─────────────────────────────────────────────────────────

/// POST /api/chat
pub async fn post_chat(State(app): State<AppState>, Json(body): Json<MessageRequest>) -> ApiResult<AgentResponse> {
    let session_id = body.session_id.as_deref();
    app.concierge
        .chat(&body.message, session_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::rejected(Feature::BasicChat.slug(), session_id, e))
}

/// POST /api/agent — Route the message to a specialist.
pub async fn post_agent(State(app): State<AppState>, Json(body): Json<MessageRequest>) -> ApiResult<AgentResponse> {
    let session_id = body.session_id.as_deref();
    app.concierge
        .orchestrate(&body.message, session_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::rejected("orchestrator", session_id, e))
}

/// POST /api/analysis
pub async fn post_analysis(
    State(app): State<AppState>,
    Json(body): Json<AnalysisRequest>,
) -> ApiResult<AgentResponse> {
    let session_id = body.session_id.as_deref();
    app.concierge
        .analyze(&body.content, body.analysis_type.as_deref(), session_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::rejected(Feature::Analysis.slug(), session_id, e))
}

/// POST /api/comparison
pub async fn post_comparison(
    State(app): State<AppState>,
    Json(body): Json<ComparisonRequest>,
) -> ApiResult<AgentResponse> {
    let session_id = body.session_id.as_deref();
    app.concierge
        .compare(&body.content, session_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::rejected(Feature::Comparison.slug(), session_id, e))
}

/// POST /api/ui-generation
pub async fn post_ui_generation(
    State(app): State<AppState>,
    Json(body): Json<UiGenerationRequest>,
) -> ApiResult<AgentResponse> {
    let session_id = body.session_id.as_deref();
    let reject = |e| ApiError::rejected(Feature::UiGeneration.slug(), session_id, e);
    let device: DeviceType = body.ui_type.as_deref().unwrap_or_default().parse().map_err(reject)?;
    app.concierge
        .generate_ui(&body.prompt, device, session_id)
        .await
        .map(Json)
        .map_err(reject)
}

// ── Search ─────────────────────────────────────────────────────────

async fn search(app: &AppState, feature: Feature, body: &MessageRequest) -> ApiResult<SearchResponse> {
    let session_id = body.session_id.as_deref();
    let response = app
        .concierge
        .search(feature, &body.message, session_id)
        .await
        .map_err(|e| ApiError::rejected(feature.slug(), session_id, e))?;
    info!(
        "{feature} finished in {}ms (success: {})",
        response.processing_time_ms, response.success
    );
    Ok(Json(response.into()))
}

/// POST /api/restaurant-search
pub async fn post_restaurant_search(
    State(app): State<AppState>,
    Json(body): Json<MessageRequest>,
) -> ApiResult<SearchResponse> {
    search(&app, Feature::RestaurantSearch, &body).await
}

/// POST /api/tourism-spots
pub async fn post_tourism_spots(
    State(app): State<AppState>,
    Json(body): Json<MessageRequest>,
) -> ApiResult<SearchResponse> {
    search(&app, Feature::TourismSpots, &body).await
}

// ── Saved results ──────────────────────────────────────────────────

fn save(app: &AppState, kind: ResultKind, body: SaveRequest) -> ApiResult<SaveResponse> {
    let saved = app
        .store
        .save(kind, body)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let base = match kind {
        ResultKind::Restaurant => "/restaurant-search",
        ResultKind::Tourism => "/tourism-spots",
    };
    info!("Saved {kind:?} result {}", saved.id);
    Ok(Json(SaveResponse {
        success: true,
        url: format!("{base}/saved/{}", saved.id),
        result_id: saved.id,
        title: saved.title,
    }))
}

/// POST /api/restaurant-search/save
pub async fn post_restaurant_save(
    State(app): State<AppState>,
    Json(body): Json<SaveRequest>,
) -> ApiResult<SaveResponse> {
    save(&app, ResultKind::Restaurant, body)
}

/// POST /api/tourism-spots/save
pub async fn post_tourism_save(
    State(app): State<AppState>,
    Json(body): Json<SaveRequest>,
) -> ApiResult<SaveResponse> {
    save(&app, ResultKind::Tourism, body)
}

/// GET /api/restaurant-search/history?limit&tag&search
pub async fn get_restaurant_history(
    State(app): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        success: true,
        page: app.store.history(ResultKind::Restaurant, &query),
    })
}

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("指定されたIDの結果が見つかりません: {id}"))
}

/// GET /api/restaurant-search/saved/{id}
///
/// With `?html=true` the stored page is returned as `text/html`.
pub async fn get_restaurant_saved(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SavedQuery>,
) -> Result<Response, ApiError> {
    let saved = app
        .store
        .get(ResultKind::Restaurant, &id)
        .ok_or_else(|| not_found(&id))?;
    if query.html {
        return Ok(Html(sanitize_html(&saved.html_content)).into_response());
    }
    Ok(Json(json!({"success": true, "result": saved})).into_response())
}

/// PATCH /api/restaurant-search/saved/{id} — Update the title or tags.
pub async fn patch_restaurant_saved(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRequest>,
) -> ApiResult<Value> {
    let updated = app
        .store
        .update(ResultKind::Restaurant, &id, body)
        .ok_or_else(|| not_found(&id))?;
    Ok(Json(json!({"success": true, "message": "更新しました", "title": updated.title})))
}

/// DELETE /api/restaurant-search/saved/{id}
pub async fn delete_restaurant_saved(State(app): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    if app.store.delete(ResultKind::Restaurant, &id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_from_envelope() {
        let envelope = AgentResponse::ok("restaurant_search", "s-1", "5 steps completed")
            .with_html("<!DOCTYPE html><html><body></body></html>")
            .with_steps(vec!["SimpleIntentAgent".into(), "HTMLExtractorAgent".into()]);
        let response = SearchResponse::from(envelope);
        assert!(response.success);
        assert!(response.workflow_complete);
        assert_eq!(response.final_agent.as_deref(), Some("HTMLExtractorAgent"));
        assert_eq!(response.session_id, "s-1");
    }

    #[test]
    fn partial_page_is_not_complete() {
        let envelope = AgentResponse::failure("tourism_spots", "s-2", "boom").with_html("<div>partial</div>");
        let response = SearchResponse::from(envelope);
        assert!(!response.success);
        assert!(!response.workflow_complete);
        assert_eq!(response.final_agent, None);
        assert_eq!(response.error.as_deref(), Some("boom"));
    }

    #[test]
    fn request_bodies_deserialize() {
        let req: UiGenerationRequest =
            serde_json::from_str(r#"{"prompt": "ログイン画面", "ui_type": "mobile"}"#).unwrap();
        assert_eq!(req.ui_type.as_deref(), Some("mobile"));
        assert!(req.session_id.is_none());

        let req: MessageRequest = serde_json::from_str(r#"{"session_id": "abc"}"#).unwrap();
        assert!(req.message.is_empty());
    }
}
