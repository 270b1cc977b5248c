//! Agent runtime: declarative agents chained into sequential workflows.
//!
//! - [`workflow::SequentialWorkflow`]: the runner. Start here.
//! - [`llm_agent::LlmAgent`]: a prompt configuration that runs as one step.
//! - [`step`]: the [`Step`] trait, [`StepContext`] and [`FnStep`] for native
//!   logic.
//! - [`state::SessionState`]: the shared key-value context.
//! - [`events`]: [`EventHandler`] trait and [`WorkflowEvent`] enum for
//!   observing a run. Includes [`LoggingHandler`], [`CompositeEventHandler`]
//!   and [`FnEventHandler`].
//! - [`config`]: [`AgentDefaults`] and [`ConciergeConfig`].
//! - [`response::AgentResponse`]: the JSON envelope returned to callers.
//! - [`output`]: lenient JSON parsing and schema validation of replies.

pub mod config;
pub mod events;
pub mod llm_agent;
pub mod output;
pub mod response;
pub mod state;
pub mod step;
pub mod workflow;

pub use config::{AgentDefaults, ConciergeConfig};
pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
    WorkflowEvent,
};
pub use llm_agent::{AgentReply, LlmAgent, OutputFormat};
pub use response::AgentResponse;
pub use state::{INPUT_KEY, SessionState};
pub use step::{FnStep, Step, StepContext, StepFuture, StepOutcome};
pub use workflow::{SequentialWorkflow, StepReport, WorkflowResult};
