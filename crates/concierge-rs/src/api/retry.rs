//! Automatic retry with exponential backoff and jitter.
//!
//! Retries transient failures (429, 500, 502, 503, 504, network errors) with
//! configurable exponential backoff. Never retries 400 (bad request) or 401
//! (auth) errors. See [`Error::is_transient`].

use crate::{ChatCompletion, ChatRequest, CompletionBackend, Error};
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = no retries, just fail immediately).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::with_retries(0)
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic jitter keyed on the attempt number.
            let jitter_factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                3 => 0.85,
                _ => 0.80,
            };
            Duration::from_secs_f64(capped * jitter_factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

/// Send `request` through `backend`, retrying transient failures.
///
/// `on_retry(attempt, delay, error)` is called before each sleep. Attempts
/// are 1-indexed from the caller's point of view.
pub async fn complete_with_retry(
    backend: &dyn CompletionBackend,
    request: &ChatRequest,
    retry: &RetryConfig,
    mut on_retry: impl FnMut(u32, Duration, &Error),
) -> Result<ChatCompletion, Error> {
    let mut attempt = 0;
    loop {
        match backend.complete(request).await {
            Ok(completion) => return Ok(completion),
            Err(e) if e.is_transient() && attempt < retry.max_retries => {
                let delay = retry.delay_for_attempt(attempt);
                attempt += 1;
                warn!(
                    "Transient error from {} (attempt {}/{}), retrying in {:.1}s: {e}",
                    request.agent.as_deref().unwrap_or("request"),
                    attempt,
                    retry.max_retries,
                    delay.as_secs_f64(),
                );
                on_retry(attempt, delay, &e);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::scripted::ScriptedBackend;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant(retries: u32) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::ZERO,
            jitter: false,
            ..RetryConfig::with_retries(retries)
        }
    }

    #[test]
    fn default_config_retries_twice() {
        assert_eq!(RetryConfig::default().max_retries, 2);
        assert_eq!(RetryConfig::none().max_retries, 0);
    }

    #[test]
    fn delay_increases_exponentially() {
        let config = RetryConfig {
            jitter: false,
            ..RetryConfig::with_retries(5)
        };
        let d0 = config.delay_for_attempt(0);
        let d1 = config.delay_for_attempt(1);
        let d2 = config.delay_for_attempt(2);

        assert!(d1 > d0, "d1={d1:?} should be > d0={d0:?}");
        assert!(d2 > d1, "d2={d2:?} should be > d1={d1:?}");
    }

    #[test]
    fn delay_capped_at_max() {
        let config = RetryConfig {
            jitter: false,
            max_delay: Duration::from_secs(2),
            ..RetryConfig::with_retries(10)
        };
        assert!(config.delay_for_attempt(10) <= Duration::from_secs(2));
    }

    #[test]
    fn jitter_reduces_delay() {
        let jittered = RetryConfig::with_retries(3);
        let plain = RetryConfig {
            jitter: false,
            ..RetryConfig::with_retries(3)
        };
        assert!(jittered.delay_for_attempt(2) <= plain.delay_for_attempt(2));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let backend = ScriptedBackend::new(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::Http {
                    status: 503,
                    body: "unavailable".into(),
                })
            } else {
                Ok("ok".into())
            }
        });

        let mut retries = Vec::new();
        let out = complete_with_retry(&backend, &ChatRequest::default(), &instant(2), |n, _, _| {
            retries.push(n)
        })
        .await
        .unwrap();

        assert_eq!(out.content.as_deref(), Some("ok"));
        assert_eq!(retries, vec![1]);
        assert_eq!(backend.request_count(), 2);
    }

    #[tokio::test]
    async fn permanent_error_not_retried() {
        let backend = ScriptedBackend::new(|_| {
            Err(Error::Http {
                status: 401,
                body: "unauthorized".into(),
            })
        });

        let err = complete_with_retry(&backend, &ChatRequest::default(), &instant(3), |_, _, _| {
            panic!("must not retry")
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Http { status: 401, .. }));
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let backend = ScriptedBackend::new(|_| Err(Error::Transport("timed out".into())));

        let err = complete_with_retry(&backend, &ChatRequest::default(), &instant(2), |_, _, _| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(backend.request_count(), 3);
    }
}
