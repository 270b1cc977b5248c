//! The uniform JSON envelope returned by the CLI (`--json`) and the web API.

use crate::agent::workflow::WorkflowResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Result envelope for every feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub feature: String,
    pub processing_mode: String,
    pub session_id: String,
    /// RFC 3339.
    pub timestamp: String,
    pub source: String,
    pub processing_time_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
}

impl AgentResponse {
    /// A successful response carrying `message`.
    pub fn ok(feature: impl Into<String>, session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            html: None,
            error: None,
            feature: feature.into(),
            processing_mode: "sequential_agent".to_string(),
            session_id: session_id.into(),
            timestamp: Utc::now().to_rfc3339(),
            source: "concierge-rs".to_string(),
            processing_time_ms: 0,
            steps: Vec::new(),
        }
    }

    /// A failed response carrying `error`.
    pub fn failure(feature: impl Into<String>, session_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            processing_mode: "error".to_string(),
            ..Self::ok(feature, session_id, String::new())
        }
    }

    /// A successful response built from a finished run: the final output
    /// becomes `message`, timings and step names are copied over.
    pub fn from_result(feature: impl Into<String>, session_id: impl Into<String>, result: &WorkflowResult) -> Self {
        Self::ok(feature, session_id, result.final_output())
            .with_timing(result.elapsed_ms)
            .with_steps(result.step_names())
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_timing(mut self, processing_time_ms: u64) -> Self {
        self.processing_time_ms = processing_time_ms;
        self
    }

    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.processing_mode = mode.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn ok_envelope() {
        let resp = AgentResponse::ok("basic_chat", "s-1", "こんにちは").with_timing(42);
        assert!(resp.success);
        assert_eq!(resp.message.as_deref(), Some("こんにちは"));
        assert_eq!(resp.processing_time_ms, 42);
        assert!(DateTime::parse_from_rfc3339(&resp.timestamp).is_ok());

        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("error").is_none());
        assert!(json.get("steps").is_none());
        assert_eq!(json["processing_mode"], "sequential_agent");
    }

    #[test]
    fn failure_envelope() {
        let resp = AgentResponse::failure("analysis", "s-2", "timeout");
        assert!(!resp.success);
        assert!(resp.message.is_none());
        assert_eq!(resp.error.as_deref(), Some("timeout"));
        assert_eq!(resp.processing_mode, "error");
        assert_eq!(resp.feature, "analysis");
    }
}
