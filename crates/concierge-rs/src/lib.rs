//! Sequential LLM agent workflows for chat, analysis, UI generation and
//! venue search.
//!
//! `concierge-rs` runs declarative agents on top of the
//! [OpenRouter](https://openrouter.ai/) chat completions API. An agent is a
//! prompt configuration ([`LlmAgent`](agent::llm_agent::LlmAgent)): a name, a
//! model, an instruction and the state key its output is written to. Agents
//! are chained into a [`SequentialWorkflow`](agent::workflow::SequentialWorkflow)
//! that threads one shared [`SessionState`](agent::state::SessionState)
//! through every step.
//!
//! # Getting started
//!
//! ```ignore
//! use concierge_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), concierge_rs::Error> {
//!     let config = ConciergeConfig::from_env();
//!     let client = OpenRouterClient::new(std::env::var("OPENROUTER_KEY").unwrap_or_default())?;
//!
//!     let workflow = restaurant_search_workflow(&config)?;
//!     let result = workflow
//!         .run(&client, &config.defaults, "渋谷でデートにおすすめのディナー", &LoggingHandler)
//!         .await?;
//!
//!     println!("{}", result.final_output());
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Declare an agent:** [`LlmAgent`](agent::llm_agent::LlmAgent) and
//!   [`OutputFormat`](agent::llm_agent::OutputFormat). Native steps use
//!   [`FnStep`](agent::step::FnStep).
//! - **Chain agents:** [`SequentialWorkflow::builder`](agent::workflow::SequentialWorkflow::builder).
//!   `build()` rejects chains where a step reads a key no earlier step writes.
//! - **Observe a run:** implement [`EventHandler`](agent::events::EventHandler),
//!   or use [`LoggingHandler`](agent::events::LoggingHandler).
//! - **Ready-made agents:** [`agents`] (chat, analysis, comparison, UI
//!   generation, orchestrator) and [`search`] (restaurant and tourism
//!   workflows).
//! - **Swap the model service:** implement [`CompletionBackend`]. Tests use
//!   [`ScriptedBackend`](api::scripted::ScriptedBackend).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | Session state, steps, LLM agents, sequential workflows, events, config, response envelope |
//! | [`agents`] | Feature catalog, single-agent features, orchestrator |
//! | [`search`] | Search params, classifiers, lookup tables, selection, HTML extraction, search workflows |
//! | [`api`] | Retry with backoff, SSE streaming, cost tracking, scripted backend |

pub mod agent;
pub mod agents;
pub mod api;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod search;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub use error::Error;

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for every agent that does not override it.
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// ```
/// use concierge_rs::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct HtmlOutput {
///     html: String,
/// }
///
/// let schema = json_schema_for::<HtmlOutput>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"html".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body.
///
/// `agent` is never serialized. It names the agent that issued the request
/// so logs and scripted backends can tell steps apart.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    #[serde(skip)]
    pub agent: Option<String>,

    pub model: String,
    pub messages: Vec<Message>,

    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<Plugin>>,
}

impl ChatRequest {
    /// The system prompt, if the first message is a system message.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == MessageRole::System)
            .and_then(|m| m.content.as_deref())
    }

    /// The content of the last user message.
    pub fn user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .and_then(|m| m.content.as_deref())
    }
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

/// JSON output format type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ResponseFormatType {
    #[serde(rename = "json_object")]
    JsonObject,
    #[serde(rename = "json_schema")]
    JsonSchema,
}

/// Named schema attached to a `json_schema` response format.
#[derive(Serialize, Clone, Debug)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub strict: bool,
    pub schema: serde_json::Value,
}

/// Structured output mode.
#[derive(Serialize, Clone, Debug)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub fmt_type: ResponseFormatType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<JsonSchemaFormat>,
}

impl ResponseFormat {
    /// Free-form JSON object output.
    pub fn json_object() -> Self {
        Self {
            fmt_type: ResponseFormatType::JsonObject,
            json_schema: None,
        }
    }

    /// Output constrained to the given schema.
    pub fn json_schema(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            fmt_type: ResponseFormatType::JsonSchema,
            json_schema: Some(JsonSchemaFormat {
                name: name.into(),
                strict: true,
                schema,
            }),
        }
    }
}

// ── Plugin types ───────────────────────────────────────────────────

/// OpenRouter plugin configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "id")]
pub enum Plugin {
    /// Web search plugin. Used by live venue retrieval.
    #[serde(rename = "web")]
    Web {
        #[serde(skip_serializing_if = "Option::is_none")]
        max_results: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        search_prompt: Option<String>,
    },
}

impl Plugin {
    pub fn web() -> Self {
        Plugin::Web {
            max_results: None,
            search_prompt: None,
        }
    }

    pub fn web_with(max_results: Option<u32>, search_prompt: Option<String>) -> Self {
        Plugin::Web {
            max_results,
            search_prompt,
        }
    }
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    annotations: Option<Vec<Annotation>>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from a [`CompletionBackend`].
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub annotations: Vec<Annotation>,
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// A completion carrying only text. Handy for scripted backends.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

/// Token usage statistics.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// URL citation annotation returned by the web-search plugin.
#[derive(Deserialize, Debug, Clone)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub annotation_type: Option<String>,
    pub url_citation: Option<UrlCitation>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UrlCitation {
    pub url: String,
    pub title: Option<String>,
}

// ── Backend seam ───────────────────────────────────────────────────

/// Boxed future returned by [`CompletionBackend::complete`].
pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ChatCompletion, Error>> + Send + 'a>>;

/// Anything that can answer a chat completion request.
///
/// The workflow runner only talks to this trait, so the hosted model service
/// can be swapped for a scripted one in tests.
pub trait CompletionBackend: Send + Sync {
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> CompletionFuture<'a>;
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) referer: String,
    pub(crate) title: String,
}

impl OpenRouterClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Self::with_headers(api_key, "https://github.com/concierge-rs", "concierge-rs")
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("concierge-rs/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
        })
    }

    pub(crate) fn post(&self) -> reqwest::RequestBuilder {
        self.client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, Error> {
        debug!(
            "LLM request: agent={}, model={}, messages={}, max_tokens={}, temp={}",
            body.agent.as_deref().unwrap_or("-"),
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .post()
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_chat_response(&text)
    }
}

/// Decode a non-streaming chat completion body.
fn parse_chat_response(text: &str) -> Result<ChatCompletion, Error> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| Error::Decode(e.to_string()))?;

    if let Some(err) = parsed.error {
        return Err(Error::Api(err.message));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    let completion = match parsed.choices.and_then(|c| c.into_iter().next()) {
        Some(c) => ChatCompletion {
            content: c.message.content,
            usage: parsed.usage,
            annotations: c.message.annotations.unwrap_or_default(),
            finish_reason: c.finish_reason,
        },
        None => {
            debug!("LLM output: empty (no choices)");
            ChatCompletion {
                usage: parsed.usage,
                ..Default::default()
            }
        }
    };
    Ok(completion)
}

impl CompletionBackend for OpenRouterClient {
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> CompletionFuture<'a> {
        Box::pin(self.chat(request))
    }
}

// ── Citation formatting ────────────────────────────────────────────

/// Format web-search URL citations as a "Sources:" footer.
pub fn format_citations(annotations: &[Annotation]) -> String {
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<String> = annotations
        .iter()
        .filter(|a| a.annotation_type.as_deref() == Some("url_citation"))
        .filter_map(|a| a.url_citation.as_ref())
        .filter(|c| seen.insert(c.url.clone()))
        .map(|c| {
            let title = c.title.as_deref().unwrap_or(&c.url);
            format!("- [{title}]({})", c.url)
        })
        .collect();

    if unique.is_empty() {
        String::new()
    } else {
        format!("\n\nSources:\n{}", unique.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content.as_deref(), Some("hello"));

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);

        let assist = Message::assistant_text("prefill");
        assert_eq!(assist.role, MessageRole::Assistant);
    }

    #[test]
    fn chat_request_skips_agent_label_and_empty_fields() {
        let req = ChatRequest {
            agent: Some("SimpleIntentAgent".into()),
            model: "test-model".into(),
            messages: vec![Message::user("hi")],
            max_tokens: 100,
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("agent").is_none());
        assert!(json.get("temperature").is_none());
        assert!(json.get("plugins").is_none());
        assert!(json.get("response_format").is_none());
        assert_eq!(json["max_tokens"], 100);
    }

    #[test]
    fn prompt_accessors() {
        let req = ChatRequest {
            messages: vec![Message::system("sys"), Message::user("question")],
            ..Default::default()
        };
        assert_eq!(req.system_prompt(), Some("sys"));
        assert_eq!(req.user_prompt(), Some("question"));
    }

    #[test]
    fn json_schema_response_format_serializes_schema() {
        let fmt = ResponseFormat::json_schema("HtmlOutput", serde_json::json!({"type": "object"}));
        let json = serde_json::to_value(&fmt).unwrap();
        assert_eq!(json["type"], "json_schema");
        assert_eq!(json["json_schema"]["name"], "HtmlOutput");
        assert_eq!(json["json_schema"]["strict"], true);

        let plain = serde_json::to_value(ResponseFormat::json_object()).unwrap();
        assert_eq!(plain["type"], "json_object");
        assert!(plain.get("json_schema").is_none());
    }

    #[test]
    fn web_plugin_serializes_with_id() {
        let json = serde_json::to_value(Plugin::web_with(Some(5), None)).unwrap();
        assert_eq!(json["id"], "web");
        assert_eq!(json["max_results"], 5);
    }

    #[test]
    fn parse_response_extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"content":"hello"},"finish_reason":"stop"}],
                       "usage":{"prompt_tokens":10,"completion_tokens":2,"total_tokens":12}}"#;
        let completion = parse_chat_response(body).unwrap();
        assert_eq!(completion.content.as_deref(), Some("hello"));
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert_eq!(completion.usage.unwrap().total_tokens, Some(12));
    }

    #[test]
    fn parse_response_surfaces_api_error() {
        let body = r#"{"error":{"message":"model not found"}}"#;
        let err = parse_chat_response(body).unwrap_err();
        assert!(matches!(err, Error::Api(ref m) if m == "model not found"));
    }

    #[test]
    fn format_citations_deduplicates() {
        let ann = Annotation {
            annotation_type: Some("url_citation".into()),
            url_citation: Some(UrlCitation {
                url: "https://example.com".into(),
                title: Some("Example".into()),
            }),
        };
        let result = format_citations(&[ann.clone(), ann]);
        assert_eq!(result.matches("example.com").count(), 1);
        assert!(result.starts_with("\n\nSources:"));
    }
}
