//! Run the restaurant search workflow directly and inspect every step.
//!
//! Builds the six-step chain, runs it against OpenRouter, prints what each
//! step wrote to the session state and saves the final page.
//!
//! # Usage
//!
//! ```bash
//! OPENROUTER_KEY=sk-... cargo run --example restaurant_workflow
//! OPENROUTER_KEY=sk-... cargo run --example restaurant_workflow -- "銀座で接待向けの和食"
//! ```

use concierge_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<(), String> {
    // 1. Create the OpenRouter client.
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "Set OPENROUTER_KEY env var to your OpenRouter API key")?;
    let client = OpenRouterClient::new(api_key).map_err(|e| e.to_string())?;

    // 2. Configure from the environment (CONCIERGE_MODEL, CONCIERGE_TOP_N, ...).
    let config = ConciergeConfig::from_env();
    config.validate().map_err(|e| e.to_string())?;

    // 3. Build and run the chain.
    let request = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "渋谷で個室のあるデート向けディナー".to_string());
    let workflow = restaurant_search_workflow(&config).map_err(|e| e.to_string())?;
    let result = workflow
        .run(&client, &config.defaults, &request, &LoggingHandler)
        .await
        .map_err(|e| e.to_string())?;

    // 4. Print each step's output key and timing.
    for step in &result.steps {
        println!("{:<28} -> {:<22} {:>6}ms", step.name, step.output_key, step.elapsed_ms);
    }
    if let Some(params) = result.output("search_params") {
        println!("\nsearch_params: {params}");
    }

    // 5. Save the page.
    std::fs::write("restaurants.html", result.final_output()).map_err(|e| e.to_string())?;
    println!(
        "\nWrote restaurants.html | {} | {}ms",
        result.cost.summary(),
        result.elapsed_ms
    );

    Ok(())
}
