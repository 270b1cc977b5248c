//! Normalizing the selection step's output to exactly `n` venues.
//!
//! The selection model may return fewer venues than asked, repeat one, or
//! return bare names. [`normalize_selection`] dedupes what it returned, then
//! tops the list up from the retrieved candidates ranked by how many search
//! keywords they mention.

use crate::search::catalog::{Restaurant, TourismSpot};
use crate::search::html::Card;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;

/// A venue that can be selected.
pub trait Candidate: Clone + Serialize + DeserializeOwned {
    fn name(&self) -> &str;

    /// Text matched against search keywords.
    fn search_text(&self) -> String;

    fn reason(&self) -> Option<&str>;

    fn set_reason(&mut self, reason: String);

    /// Reason given to venues added by the top-up.
    fn default_reason() -> &'static str;

    /// The card shown for this venue on a rendered page.
    fn to_card(&self) -> Card;
}

impl Candidate for Restaurant {
    fn name(&self) -> &str {
        &self.name
    }

    fn search_text(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.name,
            self.area,
            self.genre,
            self.description,
            self.features.join(" ")
        )
    }

    fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    fn set_reason(&mut self, reason: String) {
        self.reason = Some(reason);
    }

    fn default_reason() -> &'static str {
        "検索条件に合うおすすめのお店"
    }

    fn to_card(&self) -> Card {
        let mut tags = self.features.clone();
        if let Some(price) = &self.price_range {
            tags.push(price.clone());
        }
        Card {
            title: self.name.clone(),
            subtitle: [self.area.as_str(), self.genre.as_str()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" / "),
            description: self.description.clone(),
            reason: self.reason.clone(),
            tags,
            url: self.url.clone(),
        }
    }
}

impl Candidate for TourismSpot {
    fn name(&self) -> &str {
        &self.name
    }

    fn search_text(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.name,
            self.area,
            self.category,
            self.description,
            self.best_season,
            self.features.join(" ")
        )
    }

    fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    fn set_reason(&mut self, reason: String) {
        self.reason = Some(reason);
    }

    fn default_reason() -> &'static str {
        "検索条件に合うおすすめのスポット"
    }

    fn to_card(&self) -> Card {
        let mut tags = self.features.clone();
        if !self.best_season.is_empty() {
            tags.push(format!("ベストシーズン: {}", self.best_season));
        }
        Card {
            title: self.name.clone(),
            subtitle: [self.area.as_str(), self.category.as_str(), self.access.as_str()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" / "),
            description: self.description.clone(),
            reason: self.reason.clone(),
            tags,
            url: None,
        }
    }
}

/// Number of keywords `candidate` mentions.
pub fn relevance_score<T: Candidate>(candidate: &T, keywords: &[&str]) -> usize {
    let text = candidate.search_text().to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.is_empty() && text.contains(&k.to_lowercase()))
        .count()
}

/// Pull the list of selected items out of model output.
///
/// Accepts a bare array, an object holding the array under `key`, or an
/// object whose only array field is the list.
pub fn selected_items(value: &Value, key: &str) -> Vec<Value> {
    if let Some(items) = value.as_array() {
        return items.clone();
    }
    if let Some(items) = value.get(key).and_then(Value::as_array) {
        return items.clone();
    }
    value
        .as_object()
        .and_then(|obj| obj.values().find_map(Value::as_array))
        .cloned()
        .unwrap_or_default()
}

/// Dedupe `selected` by name, keep at most `n`, then fill up to `n` from
/// `candidates` in descending keyword relevance.
///
/// Selected items are resolved to the candidate of the same name, keeping
/// the model's `reason`. Names that match no candidate are dropped, unless
/// there are no candidates at all, in which case an item is kept when it
/// deserializes as `T`.
pub fn normalize_selection<T: Candidate>(
    selected: &[Value],
    candidates: &[T],
    keywords: &[&str],
    n: usize,
) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut out: Vec<T> = Vec::with_capacity(n);

    for item in selected {
        if out.len() >= n {
            break;
        }
        let Some(venue) = resolve_item(item, candidates) else {
            continue;
        };
        if venue.name().trim().is_empty() || !seen.insert(venue.name().to_string()) {
            continue;
        }
        out.push(venue);
    }

    if out.len() < n {
        let mut ranked: Vec<(usize, &T)> = candidates
            .iter()
            .map(|c| (relevance_score(c, keywords), c))
            .collect();
        // Stable: ties keep candidate order.
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, candidate) in ranked {
            if out.len() >= n {
                break;
            }
            if !seen.insert(candidate.name().to_string()) {
                continue;
            }
            let mut venue = candidate.clone();
            if venue.reason().is_none() {
                venue.set_reason(T::default_reason().to_string());
            }
            out.push(venue);
        }
    }
    out
}

fn resolve_item<T: Candidate>(item: &Value, candidates: &[T]) -> Option<T> {
    let name = match item {
        Value::String(s) => Some(s.as_str()),
        other => other.get("name").and_then(Value::as_str),
    }?;

    let mut venue = if candidates.is_empty() {
        serde_json::from_value::<T>(item.clone()).ok()?
    } else {
        candidates.iter().find(|c| c.name() == name).cloned()?
    };
    if let Some(reason) = item.get("reason").and_then(Value::as_str) {
        venue.set_reason(reason.to_string());
    }
    Some(venue)
}
