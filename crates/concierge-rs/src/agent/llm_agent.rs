//! Declarative LLM agents.
//!
//! An [`LlmAgent`] is a prompt configuration: a name, an instruction, the
//! state keys it reads and the key it writes. Running it builds one chat
//! request from the current [`SessionState`], sends it, and turns the reply
//! into a JSON value according to its [`OutputFormat`].

use crate::agent::config::AgentDefaults;
use crate::agent::output::{parse_json_lenient, validate_against_schema};
use crate::agent::state::{INPUT_KEY, SessionState};
use crate::agent::step::{Step, StepContext, StepFuture, StepOutcome};
use crate::{ChatCompletion, ChatRequest, Error, Message, Plugin, ResponseFormat};
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// How an agent's reply is turned into a state value.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    /// The trimmed reply, stored as a JSON string.
    Text,
    /// Any JSON value. Requested with `response_format: json_object`.
    Json,
    /// JSON validated against `schema`. Requested with `json_schema`.
    Schema { name: String, schema: Value },
}

type FinalizeFn = dyn Fn(&SessionState, Value) -> Result<Value, Error> + Send + Sync;

/// A declarative agent. Implements [`Step`].
#[derive(Clone)]
pub struct LlmAgent {
    pub name: String,
    pub description: String,
    pub instruction: String,
    /// Overrides [`AgentDefaults::model`].
    pub model: Option<String>,
    pub output_key: String,
    pub reads: Vec<String>,
    pub output: OutputFormat,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub plugins: Vec<Plugin>,
    finalize: Option<Arc<FinalizeFn>>,
}

/// The parsed value of one agent call, with the raw completion.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub value: Value,
    pub completion: ChatCompletion,
    pub model: String,
}

impl LlmAgent {
    pub fn new(name: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction: String::new(),
            model: None,
            output_key: output_key.into(),
            reads: Vec::new(),
            output: OutputFormat::Text,
            temperature: None,
            max_tokens: None,
            plugins: Vec::new(),
            finalize: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn reads<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reads = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn json(self) -> Self {
        self.output(OutputFormat::Json)
    }

    pub fn schema(self, name: impl Into<String>, schema: Value) -> Self {
        self.output(OutputFormat::Schema {
            name: name.into(),
            schema,
        })
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Post-process the parsed value before it is written to the state.
    pub fn finalize(
        mut self,
        f: impl Fn(&SessionState, Value) -> Result<Value, Error> + Send + Sync + 'static,
    ) -> Self {
        self.finalize = Some(Arc::new(f));
        self
    }

    /// The system prompt for the current state.
    ///
    /// Global instruction first, then the instruction with `{key}`
    /// placeholders filled in, then one section per read key.
    pub fn system_prompt(&self, state: &SessionState, defaults: &AgentDefaults) -> String {
        let mut parts = Vec::new();
        if let Some(global) = defaults
            .global_instruction
            .as_deref()
            .filter(|g| !g.trim().is_empty())
        {
            parts.push(global.trim().to_string());
        }
        parts.push(render_placeholders(&self.instruction, state));

        for key in self.reads.iter().filter(|k| k.as_str() != INPUT_KEY) {
            if let Some(value) = state.render(key) {
                parts.push(format!("## {key}\n{value}"));
            }
        }
        parts.join("\n\n")
    }

    /// Build the chat request this agent would send for `state`.
    pub fn build_request(&self, state: &SessionState, defaults: &AgentDefaults) -> ChatRequest {
        let response_format = match &self.output {
            OutputFormat::Text => None,
            OutputFormat::Json => Some(ResponseFormat::json_object()),
            OutputFormat::Schema { name, schema } => {
                Some(ResponseFormat::json_schema(name.clone(), schema.clone()))
            }
        };

        ChatRequest {
            agent: Some(self.name.clone()),
            model: self.model.clone().unwrap_or_else(|| defaults.model.clone()),
            messages: vec![
                Message::system(self.system_prompt(state, defaults)),
                Message::user(state.input()),
            ],
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            response_format,
            plugins: (!self.plugins.is_empty()).then(|| self.plugins.clone()),
        }
    }

    /// Turn the reply text into the value written to the state.
    pub fn parse_output(&self, state: &SessionState, text: &str) -> Result<Value, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyResponse(self.name.clone()));
        }

        let value = match &self.output {
            OutputFormat::Text => Value::String(text.to_string()),
            OutputFormat::Json => parse_json_lenient(text).ok_or_else(|| self.invalid("reply is not JSON"))?,
            OutputFormat::Schema { schema, .. } => {
                let value = parse_json_lenient(text).ok_or_else(|| self.invalid("reply is not JSON"))?;
                validate_against_schema(schema, &value).map_err(|errors| self.invalid(&errors.join("; ")))?;
                value
            }
        };

        match &self.finalize {
            Some(f) => f(state, value),
            None => Ok(value),
        }
    }

    fn invalid(&self, reason: &str) -> Error {
        Error::InvalidOutput {
            agent: self.name.clone(),
            key: self.output_key.clone(),
            reason: reason.to_string(),
        }
    }

    /// Build, send and parse one call.
    pub async fn invoke(&self, ctx: StepContext<'_>) -> Result<AgentReply, Error> {
        let request = self.build_request(ctx.state, ctx.defaults);
        let completion = ctx.complete(&self.name, &request).await?;
        let text = completion.content.as_deref().unwrap_or_default();
        debug!("{} replied with {} chars", self.name, text.len());
        let value = self.parse_output(ctx.state, text)?;
        Ok(AgentReply {
            value,
            completion,
            model: request.model,
        })
    }
}

impl Step for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn output_key(&self) -> &str {
        &self.output_key
    }

    fn reads(&self) -> &[String] {
        &self.reads
    }

    fn run<'a>(&'a self, ctx: StepContext<'a>) -> StepFuture<'a> {
        Box::pin(async move {
            let reply = self.invoke(ctx).await?;
            Ok(StepOutcome {
                value: reply.value,
                usage: reply.completion.usage,
                model: Some(reply.model),
            })
        })
    }
}

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").ok());

/// Replace `{key}` with the rendered state value. Unknown keys are left as is.
fn render_placeholders(template: &str, state: &SessionState) -> String {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &regex::Captures<'_>| {
        state
            .render(&caps[1])
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::events::NoopHandler;
    use crate::api::scripted::ScriptedBackend;
    use crate::{MessageRole, ResponseFormatType};
    use serde_json::json;

    fn state() -> SessionState {
        let mut state = SessionState::with_input("渋谷でデート");
        state.insert("search_params", json!({"area": "渋谷"}));
        state.insert("area_note", json!("駅近"));
        state
    }

    #[test]
    fn placeholders_filled_only_for_known_keys() {
        let out = render_placeholders("場所: {area_note} / 不明: {unknown} / {not a key}", &state());
        assert_eq!(out, "場所: 駅近 / 不明: {unknown} / {not a key}");
    }

    #[test]
    fn system_prompt_layers_global_instruction_and_reads() {
        let agent = LlmAgent::new("RestaurantSelectionAgent", "selected_restaurants")
            .instruction("Pick the best.")
            .reads(["user_input", "search_params"]);
        let defaults = AgentDefaults::default().with_global_instruction("日本語で回答してください。");

        let prompt = agent.system_prompt(&state(), &defaults);
        assert!(prompt.starts_with("日本語で回答してください。\n\nPick the best."));
        assert!(prompt.contains("## search_params\n{\n  \"area\": \"渋谷\"\n}"));
        assert!(!prompt.contains("## user_input"));
    }

    #[test]
    fn request_uses_defaults_unless_overridden() {
        let defaults = AgentDefaults::default();
        let plain = LlmAgent::new("ChatAgent", "response").build_request(&state(), &defaults);
        assert_eq!(plain.model, defaults.model);
        assert_eq!(plain.max_tokens, 4096);
        assert_eq!(plain.agent.as_deref(), Some("ChatAgent"));
        assert!(plain.plugins.is_none());
        assert!(plain.response_format.is_none());
        assert_eq!(plain.messages[1].role, MessageRole::User);
        assert_eq!(plain.user_prompt(), Some("渋谷でデート"));

        let tuned = LlmAgent::new("Search", "results")
            .model("openai/gpt-4o-mini")
            .temperature(0.2)
            .max_tokens(512)
            .plugin(Plugin::web())
            .json()
            .build_request(&state(), &defaults);
        assert_eq!(tuned.model, "openai/gpt-4o-mini");
        assert_eq!(tuned.max_tokens, 512);
        assert!((tuned.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(tuned.plugins.unwrap().len(), 1);
        assert_eq!(tuned.response_format.unwrap().fmt_type, ResponseFormatType::JsonObject);
    }

    #[test]
    fn parse_output_by_format() {
        let s = state();
        let text = LlmAgent::new("A", "k");
        assert_eq!(text.parse_output(&s, "  hi \n").unwrap(), json!("hi"));
        assert!(matches!(text.parse_output(&s, "   "), Err(Error::EmptyResponse(_))));

        let json_agent = LlmAgent::new("A", "k").json();
        assert_eq!(
            json_agent.parse_output(&s, "```json\n{\"x\": 1}\n```").unwrap(),
            json!({"x": 1})
        );
        let err = json_agent.parse_output(&s, "not json").unwrap_err();
        assert!(matches!(err, Error::InvalidOutput { ref key, .. } if key == "k"));
    }

    #[test]
    fn schema_output_validated() {
        let agent = LlmAgent::new("HTMLGeneratorAgent", "structured_html").schema(
            "HtmlOutput",
            json!({"type": "object", "properties": {"html": {"type": "string"}}, "required": ["html"]}),
        );
        let s = state();
        assert!(agent.parse_output(&s, r#"{"html": "<html></html>"}"#).is_ok());
        assert!(matches!(
            agent.parse_output(&s, r#"{"page": "x"}"#),
            Err(Error::InvalidOutput { .. })
        ));
    }

    #[test]
    fn finalize_sees_state_and_value() {
        let agent = LlmAgent::new("A", "k").json().finalize(|state, mut value| {
            value["input"] = json!(state.input());
            Ok(value)
        });
        let out = agent.parse_output(&state(), r#"{"x": 1}"#).unwrap();
        assert_eq!(out, json!({"x": 1, "input": "渋谷でデート"}));
    }

    #[tokio::test]
    async fn runs_as_step() {
        let backend = ScriptedBackend::fixed("こんにちは").with_usage(12, 3);
        let s = state();
        let defaults = AgentDefaults::default();
        let agent = LlmAgent::new("ChatAgent", "response");
        let ctx = StepContext {
            backend: &backend,
            state: &s,
            defaults: &defaults,
            handler: &NoopHandler,
            trace_id: "tr-test",
        };

        let outcome = agent.run(ctx).await.unwrap();
        assert_eq!(outcome.value, json!("こんにちは"));
        assert_eq!(outcome.usage.unwrap().total_tokens, Some(15));
        assert_eq!(outcome.model.as_deref(), Some(defaults.model.as_str()));
    }
}
