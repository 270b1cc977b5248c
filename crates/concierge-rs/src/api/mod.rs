//! API interaction layer: retry, streaming, cost tracking and a scripted
//! backend.
//!
//! These modules sit between the workflow runner and the model service:
//!
//! - [`retry`]: transient error detection (429, 5xx, network failures) with
//!   exponential backoff and jitter. Never retries 400/401 errors.
//! - [`streaming`]: SSE parser for incremental text deltas.
//! - [`tracing`]: correlation IDs, per-model pricing tables, and the
//!   cumulative [`CostTracker`].
//! - [`scripted`]: [`ScriptedBackend`] for running workflows without network
//!   access.

pub mod retry;
pub mod scripted;
pub mod streaming;
pub mod tracing;

pub use retry::{RetryConfig, complete_with_retry};
pub use scripted::ScriptedBackend;
pub use tracing::{CostTracker, generate_span_id, generate_trace_id, pricing_for_model};
