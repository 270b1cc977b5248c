//! A [`CompletionBackend`] that answers from a closure instead of the network.
//!
//! Used by tests and by the web crate's integration tests to run whole
//! workflows deterministically.

use crate::{ChatCompletion, ChatRequest, CompletionBackend, CompletionFuture, Error, UsageInfo};
use std::sync::Mutex;

type Responder = dyn Fn(&ChatRequest) -> Result<String, Error> + Send + Sync;

/// Scripted model backend. Every request is recorded.
pub struct ScriptedBackend {
    responder: Box<Responder>,
    requests: Mutex<Vec<ChatRequest>>,
    usage: Option<UsageInfo>,
}

impl ScriptedBackend {
    /// Answer every request with `responder(request)`.
    pub fn new(
        responder: impl Fn(&ChatRequest) -> Result<String, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            usage: None,
        }
    }

    /// Answer by agent name. Requests from agents not in `replies` get `default`.
    pub fn by_agent(replies: Vec<(&str, String)>, default: impl Into<String>) -> Self {
        let replies: Vec<(String, String)> = replies
            .into_iter()
            .map(|(agent, reply)| (agent.to_string(), reply))
            .collect();
        let default = default.into();
        Self::new(move |req| {
            let agent = req.agent.as_deref().unwrap_or_default();
            Ok(replies
                .iter()
                .find(|(name, _)| name == agent)
                .map(|(_, reply)| reply.clone())
                .unwrap_or_else(|| default.clone()))
        })
    }

    /// Always reply with the same text.
    pub fn fixed(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Attach the same usage figures to every completion.
    pub fn with_usage(mut self, prompt_tokens: u32, completion_tokens: u32) -> Self {
        self.usage = Some(UsageInfo {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
            total_tokens: Some(prompt_tokens + completion_tokens),
        });
        self
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Agent labels of received requests, in order.
    pub fn agents_called(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.agent.unwrap_or_default())
            .collect()
    }
}

impl CompletionBackend for ScriptedBackend {
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> CompletionFuture<'a> {
        Box::pin(async move {
            if let Ok(mut log) = self.requests.lock() {
                log.push(request.clone());
            }
            let text = (self.responder)(request)?;
            Ok(ChatCompletion {
                usage: self.usage.clone(),
                finish_reason: Some("stop".into()),
                ..ChatCompletion::text(text)
            })
        })
    }
}
