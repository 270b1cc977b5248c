//! Events and handlers for [`SequentialWorkflow`](super::workflow::SequentialWorkflow) runs.
//!
//! The runner reports the lifecycle of a run through [`WorkflowEvent`]
//! variants, from workflow start through each step to completion. Callers
//! implement [`EventHandler`] to observe these events for logging, progress
//! output, metrics, or any other side effects.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |
//! | Custom `impl EventHandler` | Full control (progress bars, metrics) |

use tracing::{debug, info, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the runner during a workflow run.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent<'a> {
    /// A run is starting.
    WorkflowStart {
        workflow: &'a str,
        trace_id: &'a str,
        steps: usize,
    },
    /// A step is about to run. `index` is 1-based.
    StepStart {
        index: usize,
        total: usize,
        step: &'a str,
        output_key: &'a str,
    },
    /// A step finished and its output was written to the state.
    StepFinished {
        step: &'a str,
        output_key: &'a str,
        elapsed_ms: u64,
    },
    /// Token usage reported by the model service for one step.
    TokenUsage {
        step: &'a str,
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    /// A transient error occurred and the call will be retried.
    Retrying {
        step: &'a str,
        attempt: u32,
        max_retries: u32,
        delay_ms: u64,
        error: &'a str,
    },
    /// A step failed. The run stops here.
    StepFailed { step: &'a str, error: &'a str },
    /// Every step completed.
    WorkflowFinished {
        workflow: &'a str,
        trace_id: &'a str,
        elapsed_ms: u64,
        total_tokens: u64,
    },
}

impl WorkflowEvent<'_> {
    /// Total tokens of a `TokenUsage` event, `None` for all others.
    pub fn total_tokens(&self) -> Option<u64> {
        if let WorkflowEvent::TokenUsage {
            prompt_tokens,
            completion_tokens,
            ..
        } = self
        {
            Some(*prompt_tokens as u64 + *completion_tokens as u64)
        } else {
            None
        }
    }
}

/// Handler for workflow events.
///
/// Events are informational: handlers observe the run but cannot steer it.
/// The default implementation ignores everything.
///
/// # Example
///
/// ```ignore
/// struct Progress;
///
/// impl EventHandler for Progress {
///     fn on_event(&self, event: &WorkflowEvent<'_>) {
///         if let WorkflowEvent::StepStart { index, total, step, .. } = event {
///             eprintln!("[{index}/{total}] {step}");
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &WorkflowEvent<'_>) {
        let _ = event;
    }
}

/// An event handler that ignores all events.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let WorkflowEvent::StepFinished { step, elapsed_ms, .. } = event {
///         println!("{step} took {elapsed_ms}ms");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&WorkflowEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&WorkflowEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&WorkflowEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &WorkflowEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that delegates to multiple inner handlers, in
/// registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(show_progress, Progress);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    /// Add a handler from an `Option`. `None` is a no-op.
    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &WorkflowEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &WorkflowEvent<'_>) {
        match event {
            WorkflowEvent::WorkflowStart {
                workflow,
                trace_id,
                steps,
            } => {
                info!("[{trace_id}] Starting workflow {workflow} ({steps} steps)");
            }
            WorkflowEvent::StepStart {
                index,
                total,
                step,
                output_key,
            } => {
                info!("[step {index}/{total}] {step} -> {output_key}");
            }
            WorkflowEvent::StepFinished {
                step, elapsed_ms, ..
            } => {
                debug!("{step} finished in {elapsed_ms}ms");
            }
            WorkflowEvent::TokenUsage {
                step,
                prompt_tokens,
                completion_tokens,
            } => {
                debug!("{step} tokens: prompt={prompt_tokens}, completion={completion_tokens}");
            }
            WorkflowEvent::Retrying {
                step,
                attempt,
                max_retries,
                delay_ms,
                error,
            } => {
                warn!("{step}: {error}. Retrying ({attempt}/{max_retries}) in {delay_ms}ms");
            }
            WorkflowEvent::StepFailed { step, error } => {
                warn!("{step} failed: {error}");
            }
            WorkflowEvent::WorkflowFinished {
                workflow,
                trace_id,
                elapsed_ms,
                total_tokens,
            } => {
                info!(
                    "[{trace_id}] Workflow {workflow} finished in {elapsed_ms}ms ({total_tokens} tokens)"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn total_tokens_only_for_usage() {
        let usage = WorkflowEvent::TokenUsage {
            step: "ChatAgent",
            prompt_tokens: 100,
            completion_tokens: 20,
        };
        assert_eq!(usage.total_tokens(), Some(120));

        let failed = WorkflowEvent::StepFailed {
            step: "ChatAgent",
            error: "boom",
        };
        assert_eq!(failed.total_tokens(), None);
    }

    #[test]
    fn composite_dispatches_to_all_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let a = seen.clone();
        let b = seen.clone();

        let handler = CompositeEventHandler::new()
            .with(FnEventHandler::new(move |_| a.lock().unwrap().push("a")))
            .with_if(false, NoopHandler)
            .with_opt(Some(FnEventHandler::new(move |_| b.lock().unwrap().push("b"))))
            .with_opt(None::<NoopHandler>);

        assert_eq!(handler.len(), 2);
        handler.on_event(&WorkflowEvent::StepFailed {
            step: "x",
            error: "y",
        });
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn logging_handler_accepts_every_event() {
        let events = [
            WorkflowEvent::WorkflowStart {
                workflow: "w",
                trace_id: "tr-1",
                steps: 2,
            },
            WorkflowEvent::StepStart {
                index: 1,
                total: 2,
                step: "s",
                output_key: "k",
            },
            WorkflowEvent::Retrying {
                step: "s",
                attempt: 1,
                max_retries: 2,
                delay_ms: 10,
                error: "HTTP 503",
            },
            WorkflowEvent::WorkflowFinished {
                workflow: "w",
                trace_id: "tr-1",
                elapsed_ms: 5,
                total_tokens: 0,
            },
        ];
        for event in &events {
            LoggingHandler.on_event(event);
        }
    }
}
