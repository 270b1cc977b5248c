//! UI generation: a complete HTML page from a description.

use crate::agent::llm_agent::LlmAgent;
use crate::agent::state::INPUT_KEY;
use crate::search::html::{clean_html_content, extract_html_value, sanitize_html};
use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const UI_AGENT: &str = "ui_generation_specialist";
pub const OUTPUT_KEY: &str = "ui_result";

/// Target device of a generated page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Tablet,
    Mobile,
    #[default]
    Auto,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Tablet => "tablet",
            DeviceType::Mobile => "mobile",
            DeviceType::Auto => "auto",
        }
    }

    fn layout_hint(self) -> &'static str {
        match self {
            DeviceType::Desktop => "a wide layout that uses sidebars and multi-column grids",
            DeviceType::Tablet => "a medium-width layout with large touch targets",
            DeviceType::Mobile => "a single-column, touch-friendly layout kept simple",
            DeviceType::Auto => "a responsive layout that works on every screen size",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(DeviceType::Desktop),
            "tablet" => Ok(DeviceType::Tablet),
            "mobile" => Ok(DeviceType::Mobile),
            "auto" | "" => Ok(DeviceType::Auto),
            other => Err(Error::InvalidInput(format!(
                "unknown device type `{other}` (expected desktop, tablet, mobile or auto)"
            ))),
        }
    }
}

/// What the UI step writes to the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiGeneration {
    pub html: String,
    pub ui_type: DeviceType,
    pub components: Vec<String>,
    pub responsive: bool,
}

/// The UI agent for `device`. JSON output `{"html": …}`, cleaned and
/// sanitized into a [`UiGeneration`] under `ui_result`.
pub fn ui_generation_agent(device: DeviceType) -> LlmAgent {
    let instruction = format!(
        "You generate user interfaces as plain HTML styled with Tailwind CSS from the CDN \
         <link href=\"https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css\" rel=\"stylesheet\">.\n\
         Target device: {device}. Use {}.\n\
         Use semantic, accessible markup and Japanese placeholder text. No JavaScript.\n\
         Reply with one JSON object {{\"html\": string}} whose html is a complete document \
         from <!DOCTYPE html> to </html>. Do not wrap the JSON in code fences.",
        device.layout_hint()
    );
    LlmAgent::new(UI_AGENT, OUTPUT_KEY)
        .description("A complete HTML page from a description")
        .instruction(instruction)
        .reads([INPUT_KEY])
        .json()
        .max_tokens(8192)
        .finalize(move |_, value| finish_ui(&value, device))
}

fn finish_ui(value: &Value, device: DeviceType) -> Result<Value, Error> {
    let html = extract_html_value(value)
        .or_else(|| value.get("html").and_then(Value::as_str).map(clean_html_content))
        .filter(|html| html.contains('<'))
        .ok_or_else(|| Error::InvalidOutput {
            agent: UI_AGENT.to_string(),
            key: OUTPUT_KEY.to_string(),
            reason: "reply contains no HTML".to_string(),
        })?;
    let html = sanitize_html(&html);
    let components = detect_components(&html)
        .into_iter()
        .map(String::from)
        .collect();

    serde_json::to_value(UiGeneration {
        html,
        ui_type: device,
        components,
        responsive: true,
    })
    .map_err(|e| Error::Decode(e.to_string()))
}

/// Component names and the markup that reveals them, in report order.
const COMPONENTS: &[(&str, &[&str])] = &[
    ("header", &["<header"]),
    ("navigation", &["<nav"]),
    ("form", &["<form"]),
    ("input", &["<input", "<textarea", "<select"]),
    ("button", &["<button", "type=\"submit\"", "type='submit'"]),
    ("table", &["<table"]),
    ("list", &["<ul", "<ol"]),
    ("image", &["<img"]),
    ("card", &["card", "shadow"]),
    ("modal", &["modal", "<dialog"]),
    ("footer", &["<footer"]),
];

/// UI components present in `html`, in a fixed order.
pub fn detect_components(html: &str) -> Vec<&'static str> {
    let lower = html.to_lowercase();
    COMPONENTS
        .iter()
        .filter(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(name, _)| *name)
        .collect()
}
