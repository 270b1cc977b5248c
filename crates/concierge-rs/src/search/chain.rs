//! The six-step search chain shared by the restaurant and tourism workflows.
//!
//! Both workflows differ only in their parameter type, their venue type and
//! the wording of their prompts. [`SearchKind`] captures those differences;
//! the step builders here are generic over it. Retrieval is the one step
//! each workflow supplies itself.

use crate::agent::llm_agent::LlmAgent;
use crate::agent::state::{INPUT_KEY, SessionState};
use crate::agent::step::FnStep;
use crate::search::html::{extract_html_value, render_cards_page, sanitize_html};
use crate::search::selection::{Candidate, normalize_selection, selected_items};
use crate::{Error, json_schema_for};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const PARAMS_KEY: &str = "search_params";
pub const RESULTS_KEY: &str = "search_results";
pub const DESCRIPTIONS_KEY: &str = "descriptions";
pub const STRUCTURED_HTML_KEY: &str = "structured_html";
pub const HTML_KEY: &str = "html";

/// What differs between the search workflows.
pub trait SearchKind: Send + Sync + 'static {
    type Params: Clone + Serialize + DeserializeOwned;
    type Item: Candidate + Send + Sync;

    /// Workflow name, e.g. `restaurant_search`.
    const WORKFLOW: &'static str;
    /// Field of the retrieval output holding the candidate list.
    const LIST_KEY: &'static str;
    /// State key the selection step writes.
    const SELECTED_KEY: &'static str;
    /// Agent names, in chain order, excluding retrieval.
    const AGENTS: ChainAgents;

    const INTENT_INSTRUCTION: &'static str;
    const SELECTION_INSTRUCTION: &'static str;
    const DESCRIPTION_INSTRUCTION: &'static str;
    const UI_INSTRUCTION: &'static str;

    fn params_from_value(value: &Value) -> Self::Params;

    fn keywords(params: &Self::Params) -> Vec<&str>;

    /// Heading of the natively rendered page.
    fn page_title(params: &Self::Params) -> String;
}

/// Agent names of one chain.
pub struct ChainAgents {
    pub intent: &'static str,
    pub selection: &'static str,
    pub description: &'static str,
    pub ui: &'static str,
    pub extractor: &'static str,
}

/// Structured output of the UI step.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct HtmlOutput {
    /// One complete single-line HTML document.
    pub html: String,
}

/// Typed params from the intent step's output, or defaults when missing.
pub fn params_from_state<K: SearchKind>(state: &SessionState) -> K::Params {
    K::params_from_value(state.get(PARAMS_KEY).unwrap_or(&Value::Null))
}

/// Candidates from the retrieval step's output.
pub fn candidates_from_state<K: SearchKind>(state: &SessionState) -> Vec<K::Item> {
    state
        .get(RESULTS_KEY)
        .and_then(|results| results.get(K::LIST_KEY))
        .and_then(|list| serde_json::from_value(list.clone()).ok())
        .unwrap_or_default()
}

// ── Step builders ──────────────────────────────────────────────────

/// Step 1: user request → typed params under `search_params`.
pub fn intent_agent<K: SearchKind>() -> LlmAgent {
    LlmAgent::new(K::AGENTS.intent, PARAMS_KEY)
        .description("Extracts search conditions from the request")
        .instruction(K::INTENT_INSTRUCTION)
        .reads([INPUT_KEY])
        .json()
        .temperature(0.0)
        .finalize(|_, value| {
            let params = K::params_from_value(&value);
            serde_json::to_value(params).map_err(|e| Error::Decode(e.to_string()))
        })
}

/// Step 3: choose `top_n` venues from the candidates.
pub fn selection_agent<K: SearchKind>(top_n: usize) -> LlmAgent {
    LlmAgent::new(K::AGENTS.selection, K::SELECTED_KEY)
        .description(format!("Picks the best {top_n} candidates"))
        .instruction(format!(
            "{}\nSelect exactly {top_n} items.",
            K::SELECTION_INSTRUCTION
        ))
        .reads([INPUT_KEY, PARAMS_KEY, RESULTS_KEY])
        .json()
        .finalize(move |state, value| {
            let params = params_from_state::<K>(state);
            let candidates = candidates_from_state::<K>(state);
            let selected = selected_items(&value, K::SELECTED_KEY);
            let picked = normalize_selection(&selected, &candidates, &K::keywords(&params), top_n);
            debug!(
                "{}: {} selected by model, {} after normalization",
                K::AGENTS.selection,
                selected.len(),
                picked.len()
            );
            serde_json::to_value(picked).map_err(|e| Error::Decode(e.to_string()))
        })
}

/// Step 4: one description per selected venue, as `[{name, description}]`.
pub fn description_agent<K: SearchKind>() -> LlmAgent {
    LlmAgent::new(K::AGENTS.description, DESCRIPTIONS_KEY)
        .description("Writes a short description of each selected venue")
        .instruction(K::DESCRIPTION_INSTRUCTION)
        .reads([PARAMS_KEY, K::SELECTED_KEY])
        .json()
        .finalize(|_, value| Ok(Value::Array(normalize_descriptions(&value))))
}

/// Step 5: the model's HTML document, as `{"html": …}`.
pub fn ui_agent<K: SearchKind>() -> LlmAgent {
    LlmAgent::new(K::AGENTS.ui, STRUCTURED_HTML_KEY)
        .description("Lays the selection out as one HTML document")
        .instruction(K::UI_INSTRUCTION)
        .reads([PARAMS_KEY, K::SELECTED_KEY, DESCRIPTIONS_KEY])
        .schema("html_output", json_schema_for::<HtmlOutput>())
        .max_tokens(8192)
}

/// Step 6: pull a sanitized document out of `structured_html`.
///
/// When the UI step produced no document, a page is rendered from the
/// selection and descriptions instead.
pub fn extractor_step<K: SearchKind>() -> FnStep {
    FnStep::new(K::AGENTS.extractor, HTML_KEY, |state| {
        let extracted = state.get(STRUCTURED_HTML_KEY).and_then(extract_html_value);
        let html = match extracted {
            Some(html) => sanitize_html(&html),
            None => {
                warn!("{}: no HTML document in model output, rendering natively", K::AGENTS.extractor);
                render_selection::<K>(state)
            }
        };
        Ok(Value::String(html))
    })
    .description("Extracts and sanitizes the final HTML document")
    .reads([STRUCTURED_HTML_KEY, PARAMS_KEY, K::SELECTED_KEY, DESCRIPTIONS_KEY])
}

/// Render the current selection as a card page.
pub fn render_selection<K: SearchKind>(state: &SessionState) -> String {
    let params = params_from_state::<K>(state);
    let selected: Vec<K::Item> = state
        .get(K::SELECTED_KEY)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let descriptions = description_map(state.get(DESCRIPTIONS_KEY));

    let cards: Vec<_> = selected
        .iter()
        .map(|item| {
            let mut card = item.to_card();
            if let Some(text) = descriptions.get(item.name()) {
                card.description = text.clone();
            }
            card
        })
        .collect();
    render_cards_page(&K::page_title(&params), &cards)
}

/// Accepts `[{name, description}]`, `{"descriptions": [...]}`, or a
/// `{name: description}` map.
fn normalize_descriptions(value: &Value) -> Vec<Value> {
    let items = selected_items(value, DESCRIPTIONS_KEY);
    if !items.is_empty() {
        return items
            .iter()
            .filter_map(|item| {
                let name = item.get("name").and_then(Value::as_str)?;
                let description = item.get("description").and_then(Value::as_str).unwrap_or_default();
                Some(json!({"name": name, "description": description}))
            })
            .collect();
    }
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(name, text)| Some(json!({"name": name, "description": text.as_str()?})))
                .collect()
        })
        .unwrap_or_default()
}

fn description_map(value: Option<&Value>) -> HashMap<String, String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str()?;
                    let text = item.get("description")?.as_str()?;
                    (!text.trim().is_empty()).then(|| (name.to_string(), text.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}
