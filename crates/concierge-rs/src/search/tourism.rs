//! The tourism-spot search workflow.
//!
//! Same chain as the restaurant search, writing `selected_spots`. Retrieval
//! always uses the fixed area/category table.

use crate::agent::config::ConciergeConfig;
use crate::agent::step::FnStep;
use crate::agent::workflow::SequentialWorkflow;
use crate::search::catalog::{TourismSpot, tourism_spots};
use crate::search::chain::{
    ChainAgents, PARAMS_KEY, RESULTS_KEY, SearchKind, description_agent, extractor_step,
    intent_agent, params_from_state, selection_agent, ui_agent,
};
use crate::search::params::TourismParams;
use crate::Error;
use serde_json::{Value, json};

pub const WORKFLOW: &str = "tourism_spots";
pub const SELECTED_KEY: &str = "selected_spots";

/// Tourism flavour of the search chain.
pub struct TourismSearch;

impl SearchKind for TourismSearch {
    type Params = TourismParams;
    type Item = TourismSpot;

    const WORKFLOW: &'static str = WORKFLOW;
    const LIST_KEY: &'static str = "tourism_spots";
    const SELECTED_KEY: &'static str = SELECTED_KEY;
    const AGENTS: ChainAgents = ChainAgents {
        intent: "TourismIntentAgent",
        selection: "TourismSelectionAgent",
        description: "TourismDescriptionAgent",
        ui: "TourismUIAgent",
        extractor: "TourismHTMLExtractorAgent",
    };

    const INTENT_INSTRUCTION: &'static str = "\
Extract sightseeing conditions from the user's request.
Reply with one JSON object: {\"area\": string, \"category\": string, \"season\": string, \"requests\": [string]}.
area is a Japanese city (default 東京), category one of 歴史, 自然, 現代, 文化 (default 歴史),
season the season if mentioned, requests any extra wishes such as 写真撮影 or 子連れ.";

    const SELECTION_INSTRUCTION: &'static str = "\
Choose the spots from search_results that best fit search_params.
Reply with JSON: {\"selected_spots\": [{\"name\", \"reason\"}]}.
Use candidate names exactly and give a one-sentence reason in Japanese for each pick.";

    const DESCRIPTION_INSTRUCTION: &'static str = "\
Write an inviting two-sentence Japanese description for each spot in selected_spots,
mentioning what makes it worth visiting in the requested season.
Reply with JSON: {\"descriptions\": [{\"name\": string, \"description\": string}]}.";

    const UI_INSTRUCTION: &'static str = "\
Build one complete HTML document presenting the selected tourism spots as cards with
their category, access, best season and atmosphere.
Use inline styles only and a responsive card grid. No scripts.
The document must start with <!DOCTYPE html>, end with </html>, and fit on a single line.
Reply with JSON: {\"html\": string}.";

    fn params_from_value(value: &Value) -> TourismParams {
        TourismParams::from_value(value)
    }

    fn keywords(params: &TourismParams) -> Vec<&str> {
        params.keywords()
    }

    fn page_title(params: &TourismParams) -> String {
        format!("{}のおすすめ観光スポット", params.area)
    }
}

/// Retrieval step over the fixed tourism table.
pub fn tourism_retrieval() -> FnStep {
    FnStep::new("TourismRetrieval", RESULTS_KEY, |state| {
        let params = params_from_state::<TourismSearch>(state);
        let spots = tourism_spots(&params);
        Ok(json!({
            "tourism_spots": spots,
            "total_found": spots.len(),
            "search_query": params.search_query(),
            "status": "success",
            "mode": "fixed",
        }))
    })
    .description("Looks up tourism spots for the area and category")
    .reads([PARAMS_KEY])
}

/// The six-step tourism-spot workflow.
pub fn tourism_spots_workflow(config: &ConciergeConfig) -> Result<SequentialWorkflow, Error> {
    SequentialWorkflow::builder(WORKFLOW)
        .description("Finds tourism spots for a request and renders them as an HTML page")
        .step(intent_agent::<TourismSearch>())
        .step(tourism_retrieval())
        .step(selection_agent::<TourismSearch>(config.top_n))
        .step(description_agent::<TourismSearch>())
        .step(ui_agent::<TourismSearch>())
        .step(extractor_step::<TourismSearch>())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::config::AgentDefaults;
    use crate::agent::events::NoopHandler;
    use crate::api::retry::RetryConfig;
    use crate::api::scripted::ScriptedBackend;
    use crate::search::chain::HTML_KEY;

    #[test]
    fn workflow_writes_selected_spots() {
        let workflow = tourism_spots_workflow(&ConciergeConfig::default()).unwrap();
        let keys = workflow.output_keys();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys[2], SELECTED_KEY);
        assert_eq!(keys[5], HTML_KEY);
    }

    #[tokio::test]
    async fn kyoto_nature_end_to_end() {
        let backend = ScriptedBackend::by_agent(
            vec![
                ("TourismIntentAgent", r#"{"area": "京都", "category": "自然", "season": "秋"}"#.into()),
                ("TourismSelectionAgent", r#"["嵐山", "嵐山"]"#.into()),
                ("TourismUIAgent", r#"{"html": "```html\n<!DOCTYPE html><html><body>京都</body></html>\n```"}"#.into()),
            ],
            "{}",
        );
        let defaults = AgentDefaults::default().with_retry(RetryConfig::none());
        let config = ConciergeConfig {
            top_n: 3,
            ..Default::default()
        };
        let result = tourism_spots_workflow(&config)
            .unwrap()
            .run(&backend, &defaults, "秋の京都で紅葉", &NoopHandler)
            .await
            .unwrap();

        let results = result.output(RESULTS_KEY).unwrap();
        assert_eq!(results["status"], "success");
        assert_eq!(results["tourism_spots"][0]["area"], "京都");

        let selected = result.output(SELECTED_KEY).unwrap().as_array().unwrap();
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0]["name"], "嵐山");
        assert_eq!(selected[0]["best_season"], "春・秋");

        assert_eq!(
            result.final_output(),
            "<!DOCTYPE html><html><body>京都</body></html>"
        );
    }

    #[tokio::test]
    async fn ui_failure_stops_the_chain() {
        let backend = ScriptedBackend::by_agent(vec![("TourismUIAgent", "not json".into())], "{}");
        let defaults = AgentDefaults::default().with_retry(RetryConfig::none());
        let err = tourism_spots_workflow(&ConciergeConfig::default())
            .unwrap()
            .run(&backend, &defaults, "東京観光", &NoopHandler)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidOutput { ref agent, .. } if agent == "TourismUIAgent"));
    }
}
