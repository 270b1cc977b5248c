//! Convenience re-exports for common `concierge-rs` types.
//!
//! ```ignore
//! use concierge_rs::prelude::*;
//! ```
//!
//! Covers building and running workflows: the client, the agent runtime,
//! event handlers, the catalog and the two search workflows. Search
//! internals (parsers, tables, HTML helpers) stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    ChatCompletion, ChatRequest, CompletionBackend, Error, Message, OpenRouterClient, Plugin,
    json_schema_for,
};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    AgentDefaults, AgentResponse, CompositeEventHandler, ConciergeConfig, EventHandler, FnEventHandler,
    FnStep, LlmAgent, LoggingHandler, NoopHandler, OutputFormat, SequentialWorkflow, SessionState,
    Step, StepContext, WorkflowEvent, WorkflowResult,
};
pub use crate::api::{RetryConfig, ScriptedBackend};

// ── Catalog ─────────────────────────────────────────────────────────
pub use crate::agents::{Concierge, DeviceType, Feature, Orchestrator, Route};

// ── Search ──────────────────────────────────────────────────────────
pub use crate::search::{restaurant_search_workflow, tourism_spots_workflow};
