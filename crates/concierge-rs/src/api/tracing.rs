//! Correlation IDs and cost tracking for workflow runs.
//!
//! Assigns a unique `trace_id` to each workflow run and a `span_id` to each
//! step within it. Tracks cumulative token usage and estimated cost.

use crate::UsageInfo;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique trace ID for a workflow run.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tr-{ts:x}-{count:04x}")
}

/// Generate a span ID for a step within a run.
pub fn generate_span_id(trace_id: &str, step: usize) -> String {
    format!("{trace_id}:s{step}")
}

/// Per-model pricing for cost estimation (USD per 1M tokens).
#[derive(Debug, Clone)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    /// Estimate cost for given token counts.
    pub fn estimate_cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (completion_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    }
}

/// Lookup approximate pricing for a model by name.
///
/// Matches on the segment after the last `/` so that org prefixes like
/// `"my-org/custom-flash-finetune"` don't cause false positives.
pub fn pricing_for_model(model: &str) -> ModelPricing {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();

    // Approximate. Good enough to compare runs, not for billing.
    let (input, output) = if name.contains("gemini") && name.contains("flash-lite") {
        (0.075, 0.30)
    } else if name.contains("gemini") && name.contains("flash") {
        (0.10, 0.40)
    } else if name.contains("gemini") {
        (1.25, 10.0)
    } else if name.contains("opus") {
        (15.0, 75.0)
    } else if name.contains("sonnet") {
        (3.0, 15.0)
    } else if name.contains("haiku") {
        (0.80, 4.0)
    } else if name.contains("4o-mini") {
        (0.15, 0.60)
    } else if name.contains("gpt-4") {
        (2.50, 10.0)
    } else if name.contains("deepseek") {
        (0.27, 1.10)
    } else {
        return ModelPricing::default();
    };

    ModelPricing {
        input_per_million: input,
        output_per_million: output,
    }
}

/// Cumulative cost tracker for one workflow run.
#[derive(Debug, Default, Clone)]
pub struct CostTracker {
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub estimated_cost_usd: f64,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record token usage for one model call.
    pub fn record(&mut self, prompt_tokens: u32, completion_tokens: u32, pricing: &ModelPricing) {
        self.total_prompt_tokens += prompt_tokens as u64;
        self.total_completion_tokens += completion_tokens as u64;
        self.estimated_cost_usd += pricing.estimate_cost(prompt_tokens, completion_tokens);
    }

    /// Record a [`UsageInfo`] returned for `model`.
    pub fn record_usage(&mut self, model: &str, usage: &UsageInfo) {
        self.record(
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            &pricing_for_model(model),
        );
    }

    /// Total tokens consumed.
    pub fn total_tokens(&self) -> u64 {
        self.total_prompt_tokens + self.total_completion_tokens
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        format!(
            "tokens: {} prompt + {} completion = {} total, est. cost: ${:.4}",
            self.total_prompt_tokens,
            self.total_completion_tokens,
            self.total_tokens(),
            self.estimated_cost_usd,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_unique() {
        let id1 = generate_trace_id();
        let id2 = generate_trace_id();
        assert_ne!(id1, id2);
        assert!(id1.starts_with("tr-"));
    }

    #[test]
    fn span_id_includes_step() {
        let span = generate_span_id("tr-abc123-0000", 3);
        assert_eq!(span, "tr-abc123-0000:s3");
    }

    #[test]
    fn cost_estimation() {
        let pricing = ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        };
        let cost = pricing.estimate_cost(1_000_000, 100_000);
        assert!((cost - 4.5).abs() < 0.01);
    }

    #[test]
    fn cost_tracker_accumulates_usage() {
        let mut tracker = CostTracker::new();
        tracker.record_usage(
            "google/gemini-2.0-flash-001",
            &UsageInfo {
                prompt_tokens: Some(1000),
                completion_tokens: Some(500),
                total_tokens: Some(1500),
            },
        );
        tracker.record(2000, 1000, &ModelPricing::default());
        assert_eq!(tracker.total_prompt_tokens, 3000);
        assert_eq!(tracker.total_completion_tokens, 1500);
        assert_eq!(tracker.total_tokens(), 4500);
        assert!(tracker.estimated_cost_usd > 0.0);
        assert!(tracker.summary().contains("4500 total"));
    }

    #[test]
    fn pricing_lookup_known_models() {
        let flash = pricing_for_model("google/gemini-2.0-flash-001");
        assert!(flash.input_per_million < 1.0);

        let pro = pricing_for_model("google/gemini-2.5-pro");
        assert!(pro.input_per_million > flash.input_per_million);

        let unknown = pricing_for_model("some-unknown-model");
        assert!(unknown.input_per_million > 0.0);
    }
}
