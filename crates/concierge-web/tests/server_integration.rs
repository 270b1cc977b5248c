//! Integration tests for the concierge-web server.
//!
//! These tests start a real axum server on a random port, backed by a
//! scripted model, and exercise the REST endpoints with reqwest.

use std::sync::Arc;

use concierge_rs::Error;
use concierge_rs::agent::ConciergeConfig;
use concierge_rs::agents::Concierge;
use concierge_rs::api::{RetryConfig, ScriptedBackend};
use concierge_web::{AppState, WebConfig, spawn_web};
use serde_json::{Value, json};

const PAGE: &str = "<!DOCTYPE html><html><body><h1>渋谷のおすすめ</h1></body></html>";

/// Replies for every agent the server can call.
fn scripted() -> ScriptedBackend {
    ScriptedBackend::new(|req| {
        let reply = match req.agent.as_deref().unwrap_or_default() {
            "basic_chat_agent" => "こんにちは！".to_string(),
            "request_router" => r#"{"route": "analysis", "confidence": 0.8}"#.to_string(),
            "analysis_specialist" => "## 分析結果サマリー\n売上は増加傾向です。".to_string(),
            "comparison_specialist" => {
                return Err(Error::Http {
                    status: 503,
                    body: "overloaded".into(),
                });
            }
            "ui_generation_specialist" => json!({"html": "<!DOCTYPE html><html><body><form><button>送信</button></form></body></html>"}).to_string(),
            "SimpleIntentAgent" => r#"{"area": "渋谷", "scene": "デート"}"#.to_string(),
            "SimpleSelectionAgent" => {
                r#"{"selected_restaurants": [{"name": "ビストロ・ルミエール", "reason": "夜景"}]}"#.to_string()
            }
            "SimpleDescriptionAgent" => "[]".to_string(),
            "SimpleUIAgent" => json!({"html": PAGE}).to_string(),
            // The tourism chain fails at intent extraction.
            _ => "not json".to_string(),
        };
        Ok(reply)
    })
}

/// Helper: spawn a test server on port 0 (random available port).
async fn spawn_test_server() -> String {
    let mut config = ConciergeConfig::default();
    config.defaults.retry = RetryConfig::none();
    let concierge = Concierge::new(Arc::new(scripted()), config);

    let web_config = WebConfig {
        bind_addr: ([127, 0, 0, 1], 0).into(),
    };
    let addr = spawn_web(AppState::new(concierge), web_config).await.unwrap();
    format!("http://{addr}")
}

async fn post(base: &str, path: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}{path}"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ── Status ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_and_catalog() {
    let base = spawn_test_server().await;

    let health: Value = reqwest::get(format!("{base}/api/health")).await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["live_search"], false);

    let agents: Value = reqwest::get(format!("{base}/api/agents")).await.unwrap().json().await.unwrap();
    let slugs: Vec<&str> = agents["agents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["slug"].as_str().unwrap())
        .collect();
    assert_eq!(
        slugs,
        vec!["basic_chat", "analysis", "comparison", "ui_generation", "restaurant_search", "tourism_spots"]
    );
}

// ── Agents ───────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_uses_given_session() {
    let base = spawn_test_server().await;
    let (status, body) = post(&base, "/api/chat", json!({"message": "やあ", "session_id": "s-42"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "こんにちは！");
    assert_eq!(body["session_id"], "s-42");
}

#[tokio::test]
async fn empty_message_is_400_with_envelope() {
    let base = spawn_test_server().await;
    let (status, body) = post(&base, "/api/chat", json!({"message": "   "})).await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["feature"], "basic_chat");
    assert!(body["session_id"].as_str().unwrap().starts_with("session-"));
}

#[tokio::test]
async fn oversized_ui_prompt_is_400() {
    let base = spawn_test_server().await;
    let (status, body) = post(&base, "/api/ui-generation", json!({"prompt": "画".repeat(3_001)})).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("3000"));

    let (status, _) = post(&base, "/api/ui-generation", json!({"prompt": "フォーム", "ui_type": "watch"})).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn ui_generation_returns_html_and_components() {
    let base = spawn_test_server().await;
    let (status, body) = post(&base, "/api/ui-generation", json!({"prompt": "問い合わせフォーム", "ui_type": "mobile"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(body["html"].as_str().unwrap().contains("<form>"));
    assert_eq!(body["message"], "form, button");
}

#[tokio::test]
async fn workflow_failure_is_200_with_success_false() {
    let base = spawn_test_server().await;
    let (status, body) = post(&base, "/api/comparison", json!({"content": "Rust vs Go"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn agent_endpoint_routes_to_specialist() {
    let base = spawn_test_server().await;
    let (status, body) = post(&base, "/api/agent", json!({"message": "今月の売上はどう？"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["feature"], "analysis");
    assert_eq!(body["processing_mode"], "orchestrated");
    assert!(body["message"].as_str().unwrap().starts_with("## 分析結果サマリー"));
}

// ── Search ───────────────────────────────────────────────────────────

#[tokio::test]
async fn restaurant_search_returns_complete_page() {
    let base = spawn_test_server().await;
    let (status, body) = post(&base, "/api/restaurant-search", json!({"message": "渋谷でデート"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["workflow_complete"], true);
    assert_eq!(body["processing_mode"], "sequential_agent");
    assert_eq!(body["final_agent"], "HTMLExtractorAgent");
    assert!(body["result"].as_str().unwrap().contains("渋谷のおすすめ"));
    assert_eq!(body["steps"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn failed_tourism_search_returns_fallback_page() {
    let base = spawn_test_server().await;
    let (status, body) = post(&base, "/api/tourism-spots", json!({"message": "京都"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], false);
    assert_eq!(body["processing_mode"], "fallback");
    assert_eq!(body["workflow_complete"], true);
}

// ── Saved results ────────────────────────────────────────────────────

#[tokio::test]
async fn save_list_fetch_and_rename() {
    let base = spawn_test_server().await;

    let (status, saved) = post(
        &base,
        "/api/restaurant-search/save",
        json!({"html_content": PAGE, "query": "渋谷でイタリアン", "search_params": {"area": "渋谷"}}),
    )
    .await;
    assert_eq!(status, 200);
    let id = saved["result_id"].as_str().unwrap().to_string();
    assert_eq!(saved["url"], format!("/restaurant-search/saved/{id}"));

    let history: Value = reqwest::get(format!("{base}/api/restaurant-search/history?search=イタリアン"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["total_count"], 1);
    assert_eq!(history["available_tags"], json!(["エリア:渋谷", "ジャンル:イタリアン"]));

    let html = reqwest::get(format!("{base}/api/restaurant-search/saved/{id}?html=true"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(html, PAGE);

    let resp = reqwest::Client::new()
        .patch(format!("{base}/api/restaurant-search/saved/{id}"))
        .json(&json!({"title": "記念日の候補"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let record: Value = reqwest::get(format!("{base}/api/restaurant-search/saved/{id}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(record["result"]["title"], "記念日の候補");
}

#[tokio::test]
async fn saved_page_is_served_without_scripts() {
    let base = spawn_test_server().await;
    let (status, saved) = post(
        &base,
        "/api/restaurant-search/save",
        json!({"html_content": "<p>候補</p><script>alert(document.cookie)</script>", "query": "渋谷"}),
    )
    .await;
    assert_eq!(status, 200);
    let id = saved["result_id"].as_str().unwrap();

    let resp = reqwest::get(format!("{base}/api/restaurant-search/saved/{id}?html=true"))
        .await
        .unwrap();
    assert!(resp.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
    assert_eq!(resp.text().await.unwrap(), "<p>候補</p>");
}

#[tokio::test]
async fn unknown_saved_id_is_404() {
    let base = spawn_test_server().await;
    let resp = reqwest::get(format!("{base}/api/restaurant-search/saved/nope")).await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = reqwest::Client::new()
        .patch(format!("{base}/api/restaurant-search/saved/nope"))
        .json(&json!({"title": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn save_without_query_is_400() {
    let base = spawn_test_server().await;
    let (status, body) = post(&base, "/api/tourism-spots/save", json!({"html_content": PAGE})).await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}
