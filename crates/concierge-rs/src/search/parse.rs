//! Parsing of free-text live-search results into restaurant candidates.

use crate::search::catalog::Restaurant;
use crate::search::genre::guess_genre;
use std::collections::HashSet;

/// Most candidates kept from one search.
pub const MAX_RESULTS: usize = 10;
const MAX_DESCRIPTION_CHARS: usize = 200;

#[derive(Default)]
struct Entry {
    name: String,
    url: String,
    description: Vec<String>,
}

/// Parse blank-line separated entries.
///
/// Within an entry an `http…` line is the URL, the first other line is the
/// title (cut at the first `-` or `|`), and the rest is description.
/// Entries without a title are dropped, duplicate names keep the first.
pub fn parse_search_results(text: &str, area: &str) -> Vec<Restaurant> {
    let mut entries = Vec::new();
    let mut current = Entry::default();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.name.is_empty() {
                entries.push(std::mem::take(&mut current));
            } else {
                current = Entry::default();
            }
            continue;
        }
        if line.starts_with("http") {
            current.url = line.to_string();
        } else if current.name.is_empty() {
            current.name = extract_name(line);
        } else {
            current.description.push(line.to_string());
        }
    }
    if !current.name.is_empty() {
        entries.push(current);
    }

    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.name.clone()))
        .take(MAX_RESULTS)
        .map(|e| to_restaurant(e, area))
        .collect()
}

/// The part of a title before the first `-` or `|`.
fn extract_name(title: &str) -> String {
    let head = title.split(['-', '|']).next().unwrap_or_default().trim();
    if head.is_empty() {
        title.trim().to_string()
    } else {
        head.to_string()
    }
}

fn to_restaurant(entry: Entry, area: &str) -> Restaurant {
    let description = entry.description.join(" ");
    let genre = guess_genre(&format!("{} {}", entry.name, description));

    let description: String = description.chars().take(MAX_DESCRIPTION_CHARS).collect();
    let description = if description.trim().is_empty() {
        format!("{area}にある{genre}レストラン")
    } else {
        description.trim().to_string()
    };

    let url = if entry.url.is_empty() {
        google_search_url(&entry.name, area)
    } else {
        entry.url
    };

    Restaurant {
        name: entry.name,
        area: area.to_string(),
        genre: genre.to_string(),
        description,
        url: Some(url),
        features: Vec::new(),
        price_range: None,
        source: Some("web_search".to_string()),
        reason: None,
    }
}

fn google_search_url(name: &str, area: &str) -> String {
    let query = format!("{name} {area}");
    reqwest::Url::parse_with_params("https://www.google.com/search", &[("q", query.as_str())])
        .map(String::from)
        .unwrap_or_else(|_| format!("https://www.google.com/search?q={name}+{area}"))
}
