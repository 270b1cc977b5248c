//! The restaurant search workflow.
//!
//! ```text
//! SimpleIntentAgent       user_input            → search_params
//! RestaurantRetrieval     search_params         → search_results
//! SimpleSelectionAgent    search_results        → selected_restaurants
//! SimpleDescriptionAgent  selected_restaurants  → descriptions
//! SimpleUIAgent           descriptions          → structured_html
//! HTMLExtractorAgent      structured_html       → html
//! ```

use crate::agent::config::ConciergeConfig;
use crate::agent::llm_agent::LlmAgent;
use crate::agent::step::{Step, StepContext, StepFuture, StepOutcome};
use crate::agent::workflow::SequentialWorkflow;
use crate::search::catalog::{Restaurant, fallback_restaurants, fixed_restaurants};
use crate::search::chain::{
    ChainAgents, PARAMS_KEY, RESULTS_KEY, SearchKind, description_agent, extractor_step,
    intent_agent, params_from_state, selection_agent, ui_agent,
};
use crate::search::params::RestaurantParams;
use crate::search::parse::{MAX_RESULTS, parse_search_results};
use crate::{Annotation, Error, Plugin};
use serde_json::{Value, json};
use tracing::{info, warn};

pub const WORKFLOW: &str = "restaurant_search";
pub const SELECTED_KEY: &str = "selected_restaurants";

/// Restaurant flavour of the search chain.
pub struct RestaurantSearch;

impl SearchKind for RestaurantSearch {
    type Params = RestaurantParams;
    type Item = Restaurant;

    const WORKFLOW: &'static str = WORKFLOW;
    const LIST_KEY: &'static str = "restaurants";
    const SELECTED_KEY: &'static str = SELECTED_KEY;
    const AGENTS: ChainAgents = ChainAgents {
        intent: "SimpleIntentAgent",
        selection: "SimpleSelectionAgent",
        description: "SimpleDescriptionAgent",
        ui: "SimpleUIAgent",
        extractor: "HTMLExtractorAgent",
    };

    const INTENT_INSTRUCTION: &'static str = "\
Extract restaurant search conditions from the user's request.
Reply with one JSON object: {\"area\": string, \"scene\": string, \"time\": string, \"requests\": [string]}.
area is a Japanese place name (default 東京), scene the occasion such as デート or 接待 (default デート),
time the meal time if mentioned, requests any extra wishes such as 個室 or 夜景.";

    const SELECTION_INSTRUCTION: &'static str = "\
Choose the restaurants from search_results that best fit search_params.
Reply with JSON: {\"selected_restaurants\": [{\"name\", \"area\", \"genre\", \"description\", \"url\", \"reason\"}]}.
Copy fields from the candidates unchanged and give a one-sentence reason in Japanese for each pick.";

    const DESCRIPTION_INSTRUCTION: &'static str = "\
Write an appealing two-sentence Japanese description for each restaurant in selected_restaurants,
tailored to the scene in search_params.
Reply with JSON: {\"descriptions\": [{\"name\": string, \"description\": string}]}.";

    const UI_INSTRUCTION: &'static str = "\
Build one complete HTML document presenting the selected restaurants as cards.
Use inline styles only, a responsive card grid, the descriptions provided and a link button per restaurant when it has a URL.
No scripts. The document must start with <!DOCTYPE html>, end with </html>, and fit on a single line.
Reply with JSON: {\"html\": string}.";

    fn params_from_value(value: &Value) -> RestaurantParams {
        RestaurantParams::from_value(value)
    }

    fn keywords(params: &RestaurantParams) -> Vec<&str> {
        params.keywords()
    }

    fn page_title(params: &RestaurantParams) -> String {
        format!("{}で{}におすすめのレストラン", params.area, params.scene)
    }
}

/// Retrieval step: the fixed table, or live web search with fallback.
pub struct RestaurantRetrieval {
    live: bool,
    reads: Vec<String>,
    search_agent: LlmAgent,
}

impl RestaurantRetrieval {
    pub fn new(live: bool) -> Self {
        let search_agent = LlmAgent::new("RestaurantWebSearchAgent", RESULTS_KEY)
            .reads([PARAMS_KEY])
            .plugin(Plugin::web_with(Some(MAX_RESULTS as u32), None))
            .temperature(0.2);
        Self {
            live,
            reads: vec![PARAMS_KEY.to_string()],
            search_agent,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    async fn search_live(&self, ctx: StepContext<'_>, params: &RestaurantParams) -> StepOutcome {
        let query = params.search_query();
        let agent = self.search_agent.clone().instruction(format!(
            "Search the web for restaurants matching \"{query}\".\n\
             List up to {MAX_RESULTS} real restaurants. For each one write the name on the first line, \
             its URL on the next line, then one or two lines of description. \
             Separate restaurants with a blank line. No other text."
        ));

        match agent.invoke(ctx).await {
            Ok(reply) => {
                let text = with_citations(reply.value.as_str().unwrap_or_default(), &reply.completion.annotations);
                let venues = parse_search_results(&text, &params.area);
                let value = if venues.is_empty() {
                    warn!("Live search for {query:?} returned no parseable results, using fallback");
                    fallback_results(params, &query, None)
                } else {
                    info!("Live search for {query:?} found {} restaurants", venues.len());
                    results_value(&venues, &query, "success", "live")
                };
                StepOutcome {
                    value,
                    usage: reply.completion.usage,
                    model: Some(reply.model),
                }
            }
            Err(e) => {
                warn!("Live search for {query:?} failed: {e}, using fallback");
                StepOutcome::native(fallback_results(params, &query, Some(&e)))
            }
        }
    }
}

impl Step for RestaurantRetrieval {
    fn name(&self) -> &str {
        "RestaurantRetrieval"
    }

    fn description(&self) -> &str {
        "Finds candidate restaurants for the search conditions"
    }

    fn output_key(&self) -> &str {
        RESULTS_KEY
    }

    fn reads(&self) -> &[String] {
        &self.reads
    }

    fn run<'a>(&'a self, ctx: StepContext<'a>) -> StepFuture<'a> {
        Box::pin(async move {
            let params = params_from_state::<RestaurantSearch>(ctx.state);
            if self.live {
                return Ok(self.search_live(ctx, &params).await);
            }
            let venues = fixed_restaurants();
            Ok(StepOutcome::native(results_value(
                &venues,
                &params.search_query(),
                "success",
                "fixed",
            )))
        })
    }
}

fn results_value(venues: &[Restaurant], query: &str, status: &str, mode: &str) -> Value {
    json!({
        "restaurants": venues,
        "total_found": venues.len(),
        "search_query": query,
        "status": status,
        "mode": mode,
    })
}

fn fallback_results(params: &RestaurantParams, query: &str, error: Option<&Error>) -> Value {
    let mut value = results_value(&fallback_restaurants(params), query, "fallback", "live");
    if let Some(e) = error {
        value["error"] = Value::String(e.to_string());
    }
    value
}

/// Append web-search citations as extra entries so the parser sees them.
fn with_citations(text: &str, annotations: &[Annotation]) -> String {
    let mut out = text.to_string();
    for citation in annotations.iter().filter_map(|a| a.url_citation.as_ref()) {
        if out.contains(&citation.url) {
            continue;
        }
        if let Some(title) = citation.title.as_deref().filter(|t| !t.trim().is_empty()) {
            out.push_str(&format!("\n\n{title}\n{}", citation.url));
        }
    }
    out
}

/// The six-step restaurant search workflow.
pub fn restaurant_search_workflow(config: &ConciergeConfig) -> Result<SequentialWorkflow, Error> {
    SequentialWorkflow::builder(WORKFLOW)
        .description("Finds restaurants for a request and renders them as an HTML page")
        .step(intent_agent::<RestaurantSearch>())
        .step(RestaurantRetrieval::new(config.live_search))
        .step(selection_agent::<RestaurantSearch>(config.top_n))
        .step(description_agent::<RestaurantSearch>())
        .step(ui_agent::<RestaurantSearch>())
        .step(extractor_step::<RestaurantSearch>())
        .build()
}
