//! Running a feature end to end and wrapping the outcome for callers.
//!
//! [`Concierge`] is what the CLI and the web service talk to. Invalid input
//! is an `Err`; a workflow that fails at run time is an `Ok` response with
//! `success: false` so callers always have an envelope to return. Search
//! features additionally carry a fallback page in `html` when they fail.

use crate::agent::config::ConciergeConfig;
use crate::agent::events::{EventHandler, NoopHandler};
use crate::agent::response::AgentResponse;
use crate::agent::workflow::{SequentialWorkflow, WorkflowResult};
use crate::agents::analysis::{analysis_agent, comparison_agent};
use crate::agents::chat::chat_agent;
use crate::agents::orchestrator::Orchestrator;
use crate::agents::ui_generation::{self, DeviceType, UiGeneration, ui_generation_agent};
use crate::agents::{Feature, validate_message, validate_ui_prompt};
use crate::search::chain::HTML_KEY;
use crate::search::html::fallback_page;
use crate::search::{restaurant_search_workflow, tourism_spots_workflow};
use crate::api::tracing::generate_trace_id;
use crate::{CompletionBackend, Error};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Runs features against one backend and configuration.
#[derive(Clone)]
pub struct Concierge {
    backend: Arc<dyn CompletionBackend>,
    config: ConciergeConfig,
    handler: Arc<dyn EventHandler>,
}

impl Concierge {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: ConciergeConfig) -> Self {
        Self {
            backend,
            config,
            handler: Arc::new(NoopHandler),
        }
    }

    /// Observe every workflow run with `handler`.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn config(&self) -> &ConciergeConfig {
        &self.config
    }

    async fn run(&self, workflow: &SequentialWorkflow, input: &str) -> Result<WorkflowResult, Error> {
        workflow
            .run(
                self.backend.as_ref(),
                &self.config.defaults,
                input,
                self.handler.as_ref(),
            )
            .await
    }

    /// Run a single-agent text feature.
    async fn run_text(
        &self,
        feature: Feature,
        workflow: Result<SequentialWorkflow, Error>,
        input: &str,
        session_id: String,
    ) -> AgentResponse {
        let started = Instant::now();
        let outcome = match workflow {
            Ok(workflow) => self.run(&workflow, input).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(result) => AgentResponse::from_result(feature.slug(), session_id, &result),
            Err(e) => {
                error!("{feature} failed: {e}");
                AgentResponse::failure(feature.slug(), session_id, e.to_string())
                    .with_timing(started.elapsed().as_millis() as u64)
            }
        }
    }

    pub async fn chat(&self, message: &str, session_id: Option<&str>) -> Result<AgentResponse, Error> {
        let message = validate_message(message)?;
        let workflow = SequentialWorkflow::single(chat_agent());
        Ok(self
            .run_text(Feature::BasicChat, workflow, message, session(session_id))
            .await)
    }

    pub async fn analyze(
        &self,
        content: &str,
        analysis_type: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<AgentResponse, Error> {
        let content = validate_message(content)?;
        let workflow = SequentialWorkflow::single(analysis_agent(analysis_type.unwrap_or_default()));
        Ok(self
            .run_text(Feature::Analysis, workflow, content, session(session_id))
            .await)
    }

    pub async fn compare(&self, content: &str, session_id: Option<&str>) -> Result<AgentResponse, Error> {
        let content = validate_message(content)?;
        let workflow = SequentialWorkflow::single(comparison_agent());
        Ok(self
            .run_text(Feature::Comparison, workflow, content, session(session_id))
            .await)
    }

    /// Generate a page. On success `html` holds the document and `message`
    /// the detected components.
    pub async fn generate_ui(
        &self,
        prompt: &str,
        device: DeviceType,
        session_id: Option<&str>,
    ) -> Result<AgentResponse, Error> {
        let prompt = validate_ui_prompt(prompt)?;
        let session_id = session(session_id);
        let started = Instant::now();
        let feature = Feature::UiGeneration.slug();

        let outcome = match SequentialWorkflow::single(ui_generation_agent(device)) {
            Ok(workflow) => self.run(&workflow, prompt).await,
            Err(e) => Err(e),
        };
        let response = outcome.and_then(|result| {
            let ui: UiGeneration = result.state.get_as(ui_generation::OUTPUT_KEY)?;
            Ok(AgentResponse::ok(feature, session_id.clone(), ui.components.join(", "))
                .with_html(ui.html)
                .with_timing(result.elapsed_ms)
                .with_steps(result.step_names()))
        });
        Ok(response.unwrap_or_else(|e| {
            error!("{feature} failed: {e}");
            AgentResponse::failure(feature, session_id, e.to_string())
                .with_timing(started.elapsed().as_millis() as u64)
        }))
    }

    /// Route free-form input through the default orchestrator.
    ///
    /// `feature` in the response is the specialist that answered; the mode
    /// is `orchestrated`.
    pub async fn orchestrate(&self, input: &str, session_id: Option<&str>) -> Result<AgentResponse, Error> {
        match Orchestrator::new() {
            Ok(orchestrator) => self.orchestrate_with(&orchestrator, input, session_id).await,
            Err(e) => {
                validate_message(input)?;
                error!("orchestrator failed: {e}");
                Ok(AgentResponse::failure("orchestrator", session(session_id), e.to_string()))
            }
        }
    }

    /// Like [`orchestrate`](Self::orchestrate) with a configured orchestrator.
    pub async fn orchestrate_with(
        &self,
        orchestrator: &Orchestrator,
        input: &str,
        session_id: Option<&str>,
    ) -> Result<AgentResponse, Error> {
        let input = validate_message(input)?;
        let session_id = session(session_id);
        let started = Instant::now();

        let outcome = orchestrator
            .handle(
                self.backend.as_ref(),
                &self.config.defaults,
                input,
                self.handler.as_ref(),
            )
            .await;
        let response = outcome.and_then(|out| {
            let feature = out.decision.route.feature();
            info!("Orchestrator answered with {feature}");
            let mut response = AgentResponse::from_result(feature.slug(), session_id.clone(), &out.result)
                .with_mode("orchestrated");
            if feature == Feature::UiGeneration {
                let ui: UiGeneration = out.result.state.get_as(ui_generation::OUTPUT_KEY)?;
                response.message = Some(ui.components.join(", "));
                response.html = Some(ui.html);
            }
            Ok(response)
        });
        Ok(response.unwrap_or_else(|e| {
            error!("orchestrator failed: {e}");
            AgentResponse::failure("orchestrator", session_id, e.to_string())
                .with_timing(started.elapsed().as_millis() as u64)
        }))
    }

    /// Run a search feature. The response always carries an HTML document:
    /// the workflow's on success, [`fallback_page`] on failure.
    pub async fn search(
        &self,
        feature: Feature,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<AgentResponse, Error> {
        let message = validate_message(message)?;
        let workflow = match feature {
            Feature::RestaurantSearch => restaurant_search_workflow(&self.config),
            Feature::TourismSpots => tourism_spots_workflow(&self.config),
            other => {
                return Err(Error::InvalidInput(format!("`{other}` is not a search feature")));
            }
        };
        let session_id = session(session_id);
        let started = Instant::now();

        let outcome = match workflow {
            Ok(workflow) => self.run(&workflow, message).await,
            Err(e) => Err(e),
        };
        Ok(match outcome {
            Ok(result) => {
                let html = result.state.get_str(HTML_KEY).unwrap_or_default().to_string();
                let mode = if self.config.live_search {
                    "sequential_agent_live"
                } else {
                    "sequential_agent"
                };
                AgentResponse::ok(feature.slug(), session_id, format!("{} steps completed", result.steps.len()))
                    .with_html(html)
                    .with_mode(mode)
                    .with_timing(result.elapsed_ms)
                    .with_steps(result.step_names())
            }
            Err(e) => {
                error!("{feature} failed: {e}");
                AgentResponse::failure(feature.slug(), session_id, e.to_string())
                    .with_html(fallback_page("検索中にエラーが発生しました。"))
                    .with_mode("fallback")
                    .with_timing(started.elapsed().as_millis() as u64)
            }
        })
    }
}

/// The caller's session id, or a fresh one.
pub fn session(session_id: Option<&str>) -> String {
    session_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("session-{}", generate_trace_id().trim_start_matches("tr-")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::retry::RetryConfig;
    use crate::api::scripted::ScriptedBackend;
    use crate::search::html::is_complete_document;

    fn concierge(backend: ScriptedBackend) -> Concierge {
        let mut config = ConciergeConfig::default();
        config.defaults.retry = RetryConfig::none();
        Concierge::new(Arc::new(backend), config)
    }

    #[tokio::test]
    async fn chat_envelope() {
        let c = concierge(ScriptedBackend::fixed("はい"));
        let resp = c.chat("質問です", Some("s-1")).await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.message.as_deref(), Some("はい"));
        assert_eq!(resp.session_id, "s-1");
        assert_eq!(resp.feature, "basic_chat");
        assert_eq!(resp.steps, vec!["basic_chat_agent"]);
    }

    #[tokio::test]
    async fn invalid_input_is_an_error() {
        let c = concierge(ScriptedBackend::fixed("はい"));
        assert!(matches!(c.chat("  ", None).await, Err(Error::InvalidInput(_))));
        assert!(c.generate_ui(&"x".repeat(3_001), DeviceType::Auto, None).await.is_err());
        assert!(c.search(Feature::BasicChat, "渋谷", None).await.is_err());
    }

    #[tokio::test]
    async fn workflow_failure_is_a_failed_envelope() {
        let c = concierge(ScriptedBackend::new(|_| {
            Err(Error::Http {
                status: 401,
                body: "unauthorized".into(),
            })
        }));
        let resp = c.analyze("データ", Some("trend"), None).await.unwrap();
        assert!(!resp.success);
        assert!(resp.error.as_deref().unwrap().contains("401"));
        assert!(resp.session_id.starts_with("session-"));
    }

    #[tokio::test]
    async fn failed_search_carries_fallback_page() {
        let c = concierge(ScriptedBackend::fixed("not json at all"));
        let resp = c.search(Feature::TourismSpots, "京都", None).await.unwrap();
        assert!(!resp.success);
        assert_eq!(resp.processing_mode, "fallback");
        assert!(is_complete_document(resp.html.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn ui_envelope_carries_html_and_components() {
        let page = r#"{"html": "<!DOCTYPE html><html><body><nav></nav><button>OK</button></body></html>"}"#;
        let c = concierge(ScriptedBackend::fixed(page));
        let resp = c.generate_ui("ナビ付きの画面", DeviceType::Mobile, None).await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.message.as_deref(), Some("navigation, button"));
        assert!(resp.html.unwrap().contains("<nav>"));
    }

    #[test]
    fn session_ids() {
        assert_eq!(session(Some(" abc ")), "abc");
        assert!(session(Some("")).starts_with("session-"));
        assert_ne!(session(None), session(None));
    }
}
