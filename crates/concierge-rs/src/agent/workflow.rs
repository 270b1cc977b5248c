//! Sequential workflows: a fixed, ordered list of steps over one shared state.
//!
//! ```ignore
//! let workflow = SequentialWorkflow::builder("restaurant_search")
//!     .step(intent_agent())
//!     .step(retrieval)
//!     .step(selection_agent(5))
//!     .build()?;
//!
//! let result = workflow.run(&client, &defaults, "渋谷でデート", &LoggingHandler).await?;
//! println!("{}", result.final_output());
//! ```
//!
//! `build()` checks the key wiring up front: every key a step reads must be
//! the input key or the output key of an earlier step. A workflow that
//! builds therefore never fails at run time with a missing key.

use crate::agent::config::AgentDefaults;
use crate::agent::events::{EventHandler, WorkflowEvent};
use crate::agent::state::{INPUT_KEY, SessionState};
use crate::agent::step::{Step, StepContext};
use crate::api::tracing::{CostTracker, generate_span_id, generate_trace_id};
use crate::{CompletionBackend, Error};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

/// Builder for [`SequentialWorkflow`].
pub struct SequentialWorkflowBuilder {
    name: String,
    description: String,
    input_key: String,
    steps: Vec<Box<dyn Step>>,
}

impl SequentialWorkflowBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// State key the raw input is stored under. Default: `user_input`.
    pub fn input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }

    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn boxed_step(mut self, step: Box<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Validate the key wiring and produce the workflow.
    pub fn build(self) -> Result<SequentialWorkflow, Error> {
        if self.steps.is_empty() {
            return Err(Error::EmptyWorkflow(self.name));
        }

        let mut written: Vec<&str> = vec![self.input_key.as_str()];
        for step in &self.steps {
            if let Some(missing) = step.reads().iter().find(|k| !written.contains(&k.as_str())) {
                return Err(Error::MissingStateKey {
                    step: step.name().to_string(),
                    key: missing.clone(),
                });
            }
            written.push(step.output_key());
        }

        Ok(SequentialWorkflow {
            name: self.name,
            description: self.description,
            input_key: self.input_key,
            steps: self.steps,
        })
    }
}

/// A static, ordered chain of steps.
pub struct SequentialWorkflow {
    name: String,
    description: String,
    input_key: String,
    steps: Vec<Box<dyn Step>>,
}

/// Timing and usage for one completed step.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StepReport {
    pub name: String,
    pub output_key: String,
    pub elapsed_ms: u64,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// The result of a complete [`SequentialWorkflow::run`].
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub workflow: String,
    pub trace_id: String,
    pub state: SessionState,
    pub steps: Vec<StepReport>,
    pub cost: CostTracker,
    pub elapsed_ms: u64,
}

impl WorkflowResult {
    pub fn output(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// The rendered output of the last step.
    pub fn final_output(&self) -> String {
        self.steps
            .last()
            .and_then(|s| self.state.render(&s.output_key))
            .unwrap_or_default()
    }

    /// Name of the last step that ran.
    pub fn final_step(&self) -> Option<&str> {
        self.steps.last().map(|s| s.name.as_str())
    }

    pub fn total_tokens(&self) -> u64 {
        self.cost.total_tokens()
    }

    /// Names of the steps that ran, in order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }
}

impl SequentialWorkflow {
    pub fn builder(name: impl Into<String>) -> SequentialWorkflowBuilder {
        SequentialWorkflowBuilder {
            name: name.into(),
            description: String::new(),
            input_key: INPUT_KEY.to_string(),
            steps: Vec::new(),
        }
    }

    /// A workflow with a single step.
    pub fn single(step: impl Step + 'static) -> Result<Self, Error> {
        let name = step.name().to_string();
        let description = step.description().to_string();
        Self::builder(name).description(description).step(step).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn steps(&self) -> impl Iterator<Item = &dyn Step> {
        self.steps.iter().map(|s| s.as_ref())
    }

    /// Output keys in execution order.
    pub fn output_keys(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.output_key()).collect()
    }

    /// Run every step in order against a fresh state seeded with `input`.
    pub async fn run(
        &self,
        backend: &dyn CompletionBackend,
        defaults: &AgentDefaults,
        input: &str,
        handler: &dyn EventHandler,
    ) -> Result<WorkflowResult, Error> {
        let mut state = SessionState::new();
        state.insert(self.input_key.clone(), Value::String(input.to_string()));
        self.run_with_state(backend, defaults, state, handler).await
    }

    /// Run every step in order against `state`. Stops at the first failure.
    pub async fn run_with_state(
        &self,
        backend: &dyn CompletionBackend,
        defaults: &AgentDefaults,
        mut state: SessionState,
        handler: &dyn EventHandler,
    ) -> Result<WorkflowResult, Error> {
        let trace_id = generate_trace_id();
        let started = Instant::now();
        let total = self.steps.len();
        let mut cost = CostTracker::new();
        let mut reports = Vec::with_capacity(total);

        handler.on_event(&WorkflowEvent::WorkflowStart {
            workflow: &self.name,
            trace_id: &trace_id,
            steps: total,
        });

        for (i, step) in self.steps.iter().enumerate() {
            handler.on_event(&WorkflowEvent::StepStart {
                index: i + 1,
                total,
                step: step.name(),
                output_key: step.output_key(),
            });

            let step_started = Instant::now();
            let ctx = StepContext {
                backend,
                state: &state,
                defaults,
                handler,
                trace_id: &trace_id,
            };
            let outcome = match step.run(ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let error = e.to_string();
                    handler.on_event(&WorkflowEvent::StepFailed {
                        step: step.name(),
                        error: &error,
                    });
                    return Err(e);
                }
            };
            let elapsed_ms = step_started.elapsed().as_millis() as u64;

            let (prompt_tokens, completion_tokens) = match &outcome.usage {
                Some(usage) => {
                    let model = outcome.model.as_deref().unwrap_or(&defaults.model);
                    cost.record_usage(model, usage);
                    let p = usage.prompt_tokens.unwrap_or(0);
                    let c = usage.completion_tokens.unwrap_or(0);
                    handler.on_event(&WorkflowEvent::TokenUsage {
                        step: step.name(),
                        prompt_tokens: p,
                        completion_tokens: c,
                    });
                    (p, c)
                }
                None => (0, 0),
            };

            debug!(
                "[{}] {} wrote `{}`",
                generate_span_id(&trace_id, i + 1),
                step.name(),
                step.output_key()
            );
            state.insert(step.output_key(), outcome.value);

            handler.on_event(&WorkflowEvent::StepFinished {
                step: step.name(),
                output_key: step.output_key(),
                elapsed_ms,
            });

            reports.push(StepReport {
                name: step.name().to_string(),
                output_key: step.output_key().to_string(),
                elapsed_ms,
                prompt_tokens,
                completion_tokens,
                model: outcome.model,
            });
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        handler.on_event(&WorkflowEvent::WorkflowFinished {
            workflow: &self.name,
            trace_id: &trace_id,
            elapsed_ms,
            total_tokens: cost.total_tokens(),
        });

        Ok(WorkflowResult {
            workflow: self.name.clone(),
            trace_id,
            state,
            steps: reports,
            cost,
            elapsed_ms,
        })
    }
}
