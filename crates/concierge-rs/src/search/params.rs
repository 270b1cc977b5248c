//! Typed search parameters extracted by the intent step.
//!
//! Models return these as loosely shaped JSON: missing fields, empty strings,
//! a single string where a list is expected. [`RestaurantParams::from_value`]
//! and [`TourismParams::from_value`] accept all of that and fill defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_AREA: &str = "東京";
pub const DEFAULT_SCENE: &str = "デート";
pub const DEFAULT_CATEGORY: &str = "歴史";

fn default_area() -> String {
    DEFAULT_AREA.to_string()
}

fn default_scene() -> String {
    DEFAULT_SCENE.to_string()
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// Restaurant search conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantParams {
    #[serde(default = "default_area")]
    pub area: String,
    #[serde(default = "default_scene")]
    pub scene: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub requests: Vec<String>,
}

impl Default for RestaurantParams {
    fn default() -> Self {
        Self {
            area: default_area(),
            scene: default_scene(),
            time: String::new(),
            requests: Vec::new(),
        }
    }
}

impl RestaurantParams {
    /// Read params from model output, falling back to defaults field by field.
    pub fn from_value(value: &Value) -> Self {
        Self {
            area: text_field(value, "area").unwrap_or_else(default_area),
            scene: text_field(value, "scene").unwrap_or_else(default_scene),
            time: text_field(value, "time").unwrap_or_default(),
            requests: list_field(value, "requests"),
        }
    }

    /// Query string such as `"渋谷 デート ディナー レストラン 個室"`.
    pub fn search_query(&self) -> String {
        join_query(
            [self.area.as_str(), self.scene.as_str(), self.time.as_str(), "レストラン"],
            &self.requests,
        )
    }

    /// All words worth matching candidates against.
    pub fn keywords(&self) -> Vec<&str> {
        let mut words = vec![self.area.as_str(), self.scene.as_str(), self.time.as_str()];
        words.extend(self.requests.iter().map(String::as_str));
        words.retain(|w| !w.is_empty());
        words
    }
}

/// Tourism-spot search conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourismParams {
    #[serde(default = "default_area")]
    pub area: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub season: String,
    #[serde(default)]
    pub requests: Vec<String>,
}

impl Default for TourismParams {
    fn default() -> Self {
        Self {
            area: default_area(),
            category: default_category(),
            season: String::new(),
            requests: Vec::new(),
        }
    }
}

impl TourismParams {
    pub fn from_value(value: &Value) -> Self {
        Self {
            area: text_field(value, "area").unwrap_or_else(default_area),
            category: text_field(value, "category").unwrap_or_else(default_category),
            season: text_field(value, "season").unwrap_or_default(),
            requests: list_field(value, "requests"),
        }
    }

    /// Query string such as `"京都 歴史 春 観光スポット 写真撮影"`.
    pub fn search_query(&self) -> String {
        join_query(
            [self.area.as_str(), self.category.as_str(), self.season.as_str(), "観光スポット"],
            &self.requests,
        )
    }

    pub fn keywords(&self) -> Vec<&str> {
        let mut words = vec![self.area.as_str(), self.category.as_str(), self.season.as_str()];
        words.extend(self.requests.iter().map(String::as_str));
        words.retain(|w| !w.is_empty());
        words
    }
}

fn join_query<'a>(head: [&'a str; 4], requests: &'a [String]) -> String {
    head.into_iter()
        .chain(requests.iter().map(String::as_str))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A non-empty string field. Numbers are accepted and stringified.
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A list of strings. A single string is split on `、` and `,`.
fn list_field(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) => s
            .split(['、', ','])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}
