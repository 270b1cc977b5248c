//! Crate-wide error type.

use thiserror::Error;

/// Every failure a client call, agent step or workflow can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("OpenRouter API HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("agent `{0}` returned an empty response")]
    EmptyResponse(String),

    #[error("agent `{agent}` produced invalid output for `{key}`: {reason}")]
    InvalidOutput {
        agent: String,
        key: String,
        reason: String,
    },

    #[error("step `{step}` reads `{key}`, which no earlier step writes")]
    MissingStateKey { step: String, key: String },

    #[error("workflow `{0}` has no steps")]
    EmptyWorkflow(String),

    #[error("state key `{key}` could not be read as {expected}: {reason}")]
    StateKey {
        key: String,
        expected: &'static str,
        reason: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the failure is worth retrying: network errors and
    /// 429/500/502/503/504 responses. Client errors (400, 401, ...) never are.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_detected() {
        assert!(Error::Transport("connection reset".into()).is_transient());
        for status in [429, 500, 502, 503, 504] {
            let err = Error::Http {
                status,
                body: String::new(),
            };
            assert!(err.is_transient(), "HTTP {status} should be transient");
        }
    }

    #[test]
    fn permanent_errors_not_retried() {
        for status in [400, 401, 403, 404, 422] {
            let err = Error::Http {
                status,
                body: "bad".into(),
            };
            assert!(!err.is_transient(), "HTTP {status} should be permanent");
        }
        assert!(!Error::Decode("eof".into()).is_transient());
        assert!(!Error::EmptyResponse("ChatAgent".into()).is_transient());
    }

    #[test]
    fn display_includes_status() {
        let err = Error::Http {
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "OpenRouter API HTTP 429: rate limited");
    }
}
