//! The [`Step`] trait and the context a step runs with.
//!
//! A workflow is an ordered list of steps. [`LlmAgent`](super::llm_agent::LlmAgent)
//! is the usual step; [`FnStep`] wraps native logic over the state, and
//! domain crates can implement [`Step`] directly when a step has to mix both.

use crate::agent::config::AgentDefaults;
use crate::agent::events::{EventHandler, WorkflowEvent};
use crate::agent::state::SessionState;
use crate::api::retry::complete_with_retry;
use crate::{ChatCompletion, ChatRequest, CompletionBackend, Error, UsageInfo};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`Step::run`].
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<StepOutcome, Error>> + Send + 'a>>;

/// Everything a step can see while it runs.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub backend: &'a dyn CompletionBackend,
    pub state: &'a SessionState,
    pub defaults: &'a AgentDefaults,
    pub handler: &'a dyn EventHandler,
    pub trace_id: &'a str,
}

impl<'a> StepContext<'a> {
    /// Send `request` on behalf of `step`, retrying transient failures and
    /// reporting each retry as a [`WorkflowEvent::Retrying`].
    pub async fn complete(&self, step: &str, request: &ChatRequest) -> Result<ChatCompletion, Error> {
        let retry = &self.defaults.retry;
        let handler = self.handler;
        complete_with_retry(self.backend, request, retry, |attempt, delay, error| {
            let error = error.to_string();
            handler.on_event(&WorkflowEvent::Retrying {
                step,
                attempt,
                max_retries: retry.max_retries,
                delay_ms: delay.as_millis() as u64,
                error: &error,
            });
        })
        .await
    }
}

/// What a step produced.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Written to the step's output key.
    pub value: Value,
    /// Token usage, for steps that called the model.
    pub usage: Option<UsageInfo>,
    /// The model that produced `value`, for steps that called one.
    pub model: Option<String>,
}

impl StepOutcome {
    /// An outcome from native logic: no model, no usage.
    pub fn native(value: Value) -> Self {
        Self {
            value,
            usage: None,
            model: None,
        }
    }
}

/// One unit of a sequential workflow.
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// The state key this step writes.
    fn output_key(&self) -> &str;

    /// State keys this step reads. Each must be written before the step runs.
    fn reads(&self) -> &[String];

    fn run<'a>(&'a self, ctx: StepContext<'a>) -> StepFuture<'a>;
}

type NativeFn = dyn Fn(&SessionState) -> Result<Value, Error> + Send + Sync;

/// A step backed by a native closure over the state.
///
/// ```ignore
/// let step = FnStep::new("HTMLExtractorAgent", "html", |state| {
///     Ok(json!(extract_html(&state.render("structured_html").unwrap_or_default())))
/// })
/// .reads(["structured_html"]);
/// ```
pub struct FnStep {
    name: String,
    description: String,
    output_key: String,
    reads: Vec<String>,
    f: Box<NativeFn>,
}

impl FnStep {
    pub fn new(
        name: impl Into<String>,
        output_key: impl Into<String>,
        f: impl Fn(&SessionState) -> Result<Value, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            output_key: output_key.into(),
            reads: Vec::new(),
            f: Box::new(f),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
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
}

impl Step for FnStep {
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
        Box::pin(async move { (self.f)(ctx.state).map(StepOutcome::native) })
    }
}
