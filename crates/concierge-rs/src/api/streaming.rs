//! Server-Sent Events (SSE) streaming for the OpenRouter chat completions API.
//!
//! Provides [`StreamEvent`] and [`OpenRouterClient::chat_stream_live`], which
//! hands each text delta to a callback as it arrives. `concierge chat --stream`
//! prints deltas through it.

use crate::{ChatRequest, Error, OpenRouterClient, UsageInfo};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// A single event from an SSE stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// An incremental text content delta.
    TextDelta(String),
    /// An incremental reasoning delta, for models that expose one.
    ReasoningDelta(String),
    /// Token usage information (sent in the final chunk).
    Usage(UsageInfo),
    /// The stream is complete.
    Done,
}

#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
    reasoning: Option<String>,
}

impl OpenRouterClient {
    /// Send a streaming chat request, invoking `on_event` for each event as
    /// it arrives off the wire.
    ///
    /// The full event list is also returned so the caller can assemble the
    /// text and usage afterwards.
    pub async fn chat_stream_live(
        &self,
        body: &ChatRequest,
        mut on_event: impl FnMut(&StreamEvent),
    ) -> Result<Vec<StreamEvent>, Error> {
        let mut stream_body = serde_json::to_value(body)
            .map_err(|e| Error::Decode(format!("failed to serialize request: {e}")))?;
        stream_body["stream"] = serde_json::Value::Bool(true);

        debug!(
            "Sending live streaming chat request: agent={}, model={}",
            body.agent.as_deref().unwrap_or("-"),
            body.model
        );

        let mut resp = self
            .post()
            .json(&stream_body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("streaming request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let mut events = Vec::new();
        let mut buffer = String::new();
        let mut done = false;

        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| Error::Transport(format!("failed to read streaming chunk: {e}")))?
        {
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline_pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline_pos).collect();
                if feed_line(line.trim(), &mut events, &mut on_event) {
                    done = true;
                    break;
                }
            }

            if done {
                break;
            }
        }

        // Incomplete final line.
        let remaining = buffer.trim().to_string();
        if !done && !remaining.is_empty() {
            feed_line(&remaining, &mut events, &mut on_event);
        }

        if !events.iter().any(|e| matches!(e, StreamEvent::Done)) {
            let ev = StreamEvent::Done;
            on_event(&ev);
            events.push(ev);
        }

        debug!("Live stream completed with {} events", events.len());
        Ok(events)
    }
}

/// Handle one SSE line. Returns `true` once the terminating `[DONE]` marker
/// has been seen.
fn feed_line(
    line: &str,
    events: &mut Vec<StreamEvent>,
    on_event: &mut impl FnMut(&StreamEvent),
) -> bool {
    if line.is_empty() || line.starts_with(':') {
        return false;
    }
    if line == "data: [DONE]" {
        let ev = StreamEvent::Done;
        on_event(&ev);
        events.push(ev);
        return true;
    }
    if let Some(data) = line.strip_prefix("data: ") {
        let before = events.len();
        parse_sse_data(data, events);
        for ev in &events[before..] {
            on_event(ev);
        }
    }
    false
}

/// Parse a single SSE `data:` payload into stream events.
fn parse_sse_data(data: &str, events: &mut Vec<StreamEvent>) {
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            if let Some(usage) = chunk.usage {
                events.push(StreamEvent::Usage(usage));
            }

            for choice in chunk.choices.unwrap_or_default() {
                if let Some(delta) = choice.delta {
                    if let Some(content) = delta.content
                        && !content.is_empty()
                    {
                        events.push(StreamEvent::TextDelta(content));
                    }
                    if let Some(reasoning) = delta.reasoning
                        && !reasoning.is_empty()
                    {
                        events.push(StreamEvent::ReasoningDelta(reasoning));
                    }
                }
                if choice.finish_reason.is_some() {
                    trace!("Stream finish_reason: {:?}", choice.finish_reason);
                }
            }
        }
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e} (data: {data})");
        }
    }
}

/// Assemble a complete text string from a sequence of stream events.
pub fn collect_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta(delta) => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

/// Extract usage info from stream events (if present).
pub fn extract_usage(events: &[StreamEvent]) -> Option<UsageInfo> {
    events.iter().rev().find_map(|e| match e {
        StreamEvent::Usage(usage) => Some(usage.clone()),
        _ => None,
    })
}
