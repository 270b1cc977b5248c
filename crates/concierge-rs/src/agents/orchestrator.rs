//! Routing free-form input to a specialist.
//!
//! A router agent classifies the request as `ui_generation`, `comparison`,
//! `analysis` or `chat` and reports a confidence. When the router fails or
//! is less than [`MIN_CONFIDENCE`] sure, [`route_by_keywords`] decides
//! instead. The chosen specialist then runs as a one-step workflow.

use crate::agent::config::AgentDefaults;
use crate::agent::events::EventHandler;
use crate::agent::llm_agent::LlmAgent;
use crate::agent::state::INPUT_KEY;
use crate::agent::workflow::{SequentialWorkflow, WorkflowResult};
use crate::agents::Feature;
use crate::agents::analysis::{DEFAULT_ANALYSIS_TYPE, analysis_agent, comparison_agent};
use crate::agents::chat::chat_agent;
use crate::agents::ui_generation::{DeviceType, ui_generation_agent};
use crate::{CompletionBackend, Error};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use tracing::{info, warn};

pub const ROUTER_AGENT: &str = "request_router";
pub const ROUTE_KEY: &str = "route";

/// Router answers below this confidence are overridden by keywords.
pub const MIN_CONFIDENCE: f64 = 0.5;

/// Where a request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    UiGeneration,
    Comparison,
    Analysis,
    Chat,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::UiGeneration => "ui_generation",
            Route::Comparison => "comparison",
            Route::Analysis => "analysis",
            Route::Chat => "chat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ui_generation" | "ui" => Some(Route::UiGeneration),
            "comparison" => Some(Route::Comparison),
            "analysis" => Some(Route::Analysis),
            "chat" | "basic_chat" => Some(Route::Chat),
            _ => None,
        }
    }

    pub fn feature(self) -> Feature {
        match self {
            Route::UiGeneration => Feature::UiGeneration,
            Route::Comparison => Feature::Comparison,
            Route::Analysis => Feature::Analysis,
            Route::Chat => Feature::BasicChat,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword lists checked in order. The first route with a hit wins.
const ROUTE_KEYWORDS: &[(Route, &[&str])] = &[
    (
        Route::UiGeneration,
        &["ui", "html", "フォーム", "ボタン", "画面", "コンポーネント"],
    ),
    (Route::Comparison, &["比較", "違い", "vs", "どちら", "選択"]),
    (Route::Analysis, &["分析", "レポート", "トレンド", "統計", "評価"]),
];

/// Route by keyword containment. Case-insensitive; defaults to chat.
pub fn route_by_keywords(text: &str) -> Route {
    let text = text.to_lowercase();
    ROUTE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map_or(Route::Chat, |(route, _)| *route)
}

/// How a route was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Model,
    Keywords,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteDecision {
    pub route: Route,
    pub confidence: f64,
    pub source: RouteSource,
}

impl RouteDecision {
    fn by_keywords(input: &str) -> Self {
        Self {
            route: route_by_keywords(input),
            confidence: 0.0,
            source: RouteSource::Keywords,
        }
    }
}

/// The router agent. Writes `{"route", "confidence"}` under `route`.
///
/// An unknown route name is reported with confidence 0 so the keyword
/// fallback takes over.
pub fn router_agent() -> LlmAgent {
    LlmAgent::new(ROUTER_AGENT, ROUTE_KEY)
        .description("Classifies a request for the orchestrator")
        .instruction(
            "Classify the user's request.\n\
             - \"ui_generation\": building UI, HTML, forms, buttons, screens or components\n\
             - \"comparison\": comparing options, differences, \"A vs B\", which to choose\n\
             - \"analysis\": analysis, reports, trends, statistics, evaluation\n\
             - \"chat\": anything else\n\
             Reply with JSON only: {\"route\": string, \"confidence\": number between 0 and 1}.",
        )
        .reads([INPUT_KEY])
        .json()
        .temperature(0.0)
        .max_tokens(100)
        .finalize(|_, value| {
            let route = value.get("route").and_then(Value::as_str).and_then(Route::parse);
            let confidence = value
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
                .clamp(0.0, 1.0);
            Ok(match route {
                Some(route) => json!({"route": route, "confidence": confidence}),
                None => json!({"route": Route::Chat, "confidence": 0.0}),
            })
        })
}

/// The outcome of [`Orchestrator::handle`].
#[derive(Debug, Clone)]
pub struct Orchestrated {
    pub decision: RouteDecision,
    pub result: WorkflowResult,
}

/// Routes input and runs the chosen specialist.
pub struct Orchestrator {
    router: SequentialWorkflow,
    analysis_type: String,
    device: DeviceType,
}

impl Orchestrator {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            router: SequentialWorkflow::single(router_agent())?,
            analysis_type: DEFAULT_ANALYSIS_TYPE.to_string(),
            device: DeviceType::Auto,
        })
    }

    pub fn with_analysis_type(mut self, analysis_type: impl Into<String>) -> Self {
        self.analysis_type = analysis_type.into();
        self
    }

    pub fn with_device(mut self, device: DeviceType) -> Self {
        self.device = device;
        self
    }

    /// Classify `input`. Never fails: router errors fall back to keywords.
    pub async fn route(
        &self,
        backend: &dyn CompletionBackend,
        defaults: &AgentDefaults,
        input: &str,
        handler: &dyn EventHandler,
    ) -> RouteDecision {
        let routed = match self.router.run(backend, defaults, input, handler).await {
            Ok(result) => result.output(ROUTE_KEY).cloned(),
            Err(e) => {
                warn!("Router failed, routing by keywords: {e}");
                return RouteDecision::by_keywords(input);
            }
        };

        let decision = routed.and_then(|v| {
            let route = Route::parse(v.get("route")?.as_str()?)?;
            let confidence = v.get("confidence")?.as_f64()?;
            Some(RouteDecision {
                route,
                confidence,
                source: RouteSource::Model,
            })
        });
        match decision {
            Some(d) if d.confidence >= MIN_CONFIDENCE => d,
            _ => RouteDecision::by_keywords(input),
        }
    }

    /// The one-step workflow for `route`.
    pub fn specialist(&self, route: Route) -> Result<SequentialWorkflow, Error> {
        match route {
            Route::UiGeneration => SequentialWorkflow::single(ui_generation_agent(self.device)),
            Route::Comparison => SequentialWorkflow::single(comparison_agent()),
            Route::Analysis => SequentialWorkflow::single(analysis_agent(&self.analysis_type)),
            Route::Chat => SequentialWorkflow::single(chat_agent()),
        }
    }

    /// Route `input`, then run the specialist on it.
    pub async fn handle(
        &self,
        backend: &dyn CompletionBackend,
        defaults: &AgentDefaults,
        input: &str,
        handler: &dyn EventHandler,
    ) -> Result<Orchestrated, Error> {
        let decision = self.route(backend, defaults, input, handler).await;
        info!(
            "Routing to {} ({:?}, confidence {:.2})",
            decision.route, decision.source, decision.confidence
        );
        let result = self
            .specialist(decision.route)?
            .run(backend, defaults, input, handler)
            .await?;
        Ok(Orchestrated { decision, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::events::NoopHandler;
    use crate::api::retry::RetryConfig;
    use crate::api::scripted::ScriptedBackend;

    fn defaults() -> AgentDefaults {
        AgentDefaults::default().with_retry(RetryConfig::none())
    }

    #[test]
    fn keyword_routes() {
        assert_eq!(route_by_keywords("ログインフォームを作って"), Route::UiGeneration);
        assert_eq!(route_by_keywords("Build an HTML page"), Route::UiGeneration);
        assert_eq!(route_by_keywords("Python vs Rust"), Route::Comparison);
        assert_eq!(route_by_keywords("売上のトレンドを分析"), Route::Analysis);
        assert_eq!(route_by_keywords("こんにちは"), Route::Chat);
        // UI keywords win over analysis keywords.
        assert_eq!(route_by_keywords("分析結果の画面"), Route::UiGeneration);
    }

    #[test]
    fn route_names_parse() {
        assert_eq!(Route::parse(" Analysis "), Some(Route::Analysis));
        assert_eq!(Route::parse("weather"), None);
        assert_eq!(Route::Chat.feature(), Feature::BasicChat);
    }

    #[tokio::test]
    async fn confident_router_decides() {
        let backend = ScriptedBackend::by_agent(
            vec![
                (ROUTER_AGENT, r#"{"route": "comparison", "confidence": 0.9}"#.into()),
                ("comparison_specialist", "## 比較対象".into()),
            ],
            "",
        );
        let orchestrator = Orchestrator::new().unwrap();
        let out = orchestrator
            .handle(&backend, &defaults(), "こんにちは", &NoopHandler)
            .await
            .unwrap();
        assert_eq!(out.decision.route, Route::Comparison);
        assert_eq!(out.decision.source, RouteSource::Model);
        assert_eq!(out.result.final_output(), "## 比較対象");
    }

    #[tokio::test]
    async fn low_confidence_falls_back_to_keywords() {
        let backend = ScriptedBackend::by_agent(
            vec![
                (ROUTER_AGENT, r#"{"route": "chat", "confidence": 0.3}"#.into()),
                ("analysis_specialist", "## 分析結果サマリー".into()),
            ],
            "",
        );
        let decision = Orchestrator::new()
            .unwrap()
            .route(&backend, &defaults(), "売上の統計", &NoopHandler)
            .await;
        assert_eq!(decision.route, Route::Analysis);
        assert_eq!(decision.source, RouteSource::Keywords);
    }

    #[tokio::test]
    async fn router_failure_falls_back_to_keywords() {
        let backend = ScriptedBackend::new(|req| match req.agent.as_deref() {
            Some(ROUTER_AGENT) => Err(Error::Http {
                status: 400,
                body: "bad request".into(),
            }),
            _ => Ok("了解です".into()),
        });
        let out = Orchestrator::new()
            .unwrap()
            .handle(&backend, &defaults(), "天気の話をしよう", &NoopHandler)
            .await
            .unwrap();
        assert_eq!(out.decision.route, Route::Chat);
        assert_eq!(out.decision.source, RouteSource::Keywords);
        assert_eq!(out.result.final_output(), "了解です");
    }
}
