//! The agent catalog: every feature the CLI and the web service expose.
//!
//! Single-agent features ([`chat`], [`analysis`], [`ui_generation`]) run as
//! one-step workflows. The two search features are the six-step chains in
//! [`crate::search`]. [`orchestrator`] routes free-form input to one of the
//! single-agent features, and [`service::Concierge`] runs any feature and
//! wraps the outcome in an [`AgentResponse`](crate::agent::AgentResponse).

pub mod analysis;
pub mod chat;
pub mod orchestrator;
pub mod service;
pub mod ui_generation;

pub use analysis::{analysis_agent, comparison_agent};
pub use chat::chat_agent;
pub use orchestrator::{Orchestrator, Route, RouteDecision, route_by_keywords};
pub use service::Concierge;
pub use ui_generation::{DeviceType, detect_components, ui_generation_agent};

use crate::Error;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Longest accepted chat message or analysis input, in characters.
pub const MAX_MESSAGE_CHARS: usize = 10_000;
/// Longest accepted UI-generation prompt, in characters.
pub const MAX_UI_PROMPT_CHARS: usize = 3_000;

/// A user-facing feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    BasicChat,
    Analysis,
    Comparison,
    UiGeneration,
    RestaurantSearch,
    TourismSpots,
}

/// One catalog entry, as listed by `concierge agents` and `GET /api/agents`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeatureInfo {
    pub slug: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::BasicChat,
        Feature::Analysis,
        Feature::Comparison,
        Feature::UiGeneration,
        Feature::RestaurantSearch,
        Feature::TourismSpots,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Feature::BasicChat => "basic_chat",
            Feature::Analysis => "analysis",
            Feature::Comparison => "comparison",
            Feature::UiGeneration => "ui_generation",
            Feature::RestaurantSearch => "restaurant_search",
            Feature::TourismSpots => "tourism_spots",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::BasicChat => "Basic Chat",
            Feature::Analysis => "Analysis Report",
            Feature::Comparison => "Comparison",
            Feature::UiGeneration => "UI Generation",
            Feature::RestaurantSearch => "Restaurant Search",
            Feature::TourismSpots => "Tourism Spots",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Feature::BasicChat => "General conversation and questions",
            Feature::Analysis => "Structured analysis reports with prioritized recommendations",
            Feature::Comparison => "Objective comparison of options with pros, cons and a recommendation",
            Feature::UiGeneration => "A complete HTML page from a description, optimized per device",
            Feature::RestaurantSearch => "Restaurant recommendations rendered as an HTML page",
            Feature::TourismSpots => "Tourism spot recommendations rendered as an HTML page",
        }
    }

    /// Whether the feature returns an HTML document.
    pub fn produces_html(self) -> bool {
        matches!(
            self,
            Feature::UiGeneration | Feature::RestaurantSearch | Feature::TourismSpots
        )
    }

    pub fn info(self) -> FeatureInfo {
        FeatureInfo {
            slug: self.slug(),
            name: self.name(),
            description: self.description(),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.slug() == s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("unknown feature `{s}`")))
    }
}

/// Every feature, in display order.
pub fn catalog() -> Vec<FeatureInfo> {
    Feature::ALL.into_iter().map(Feature::info).collect()
}

/// Trim `text` and check it is non-empty and at most `max_chars` long.
pub fn validate_input<'a>(text: &'a str, what: &str, max_chars: usize) -> Result<&'a str, Error> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidInput(format!("{what} must not be empty")));
    }
    let len = text.chars().count();
    if len > max_chars {
        return Err(Error::InvalidInput(format!(
            "{what} is {len} characters, the limit is {max_chars}"
        )));
    }
    Ok(text)
}

/// Chat messages, analysis content and search requests.
pub fn validate_message(text: &str) -> Result<&str, Error> {
    validate_input(text, "message", MAX_MESSAGE_CHARS)
}

pub fn validate_ui_prompt(text: &str) -> Result<&str, Error> {
    validate_input(text, "prompt", MAX_UI_PROMPT_CHARS)
}
