//! In-memory store for saved search result pages.
//!
//! Each saved page keeps the HTML, the query that produced it, tags derived
//! from the query and search params, and timestamps. Results are kept in
//! insertion order so history can be listed newest first without relying on
//! timestamp resolution.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use concierge_rs::api::generate_trace_id;
use concierge_rs::search::sanitize_html;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Saved pages larger than this are rejected.
pub const MAX_HTML_BYTES: usize = 1024 * 1024;
/// Queries longer than this (in characters) are rejected.
pub const MAX_QUERY_CHARS: usize = 1_000;
/// Default and maximum page size for [`SavedResultStore::history`].
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const MAX_HISTORY_LIMIT: usize = 100;
/// Results kept per store; saving past this evicts the oldest.
pub const MAX_SAVED_RESULTS: usize = 200;

/// Which search produced a saved page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Restaurant,
    Tourism,
}

impl ResultKind {
    fn default_title(self, query: &str) -> String {
        let label = match self {
            ResultKind::Restaurant => "レストラン検索結果",
            ResultKind::Tourism => "観光スポット検索結果",
        };
        let head: String = query.chars().take(20).collect();
        let ellipsis = if query.chars().count() > 20 { "..." } else { "" };
        format!("{label} - {head}{ellipsis}")
    }

    /// Param keys turned into `label:value` tags, in order.
    fn param_tags(self) -> &'static [(&'static str, &'static str)] {
        match self {
            ResultKind::Restaurant => &[("area", "エリア"), ("scene", "シーン"), ("time", "時間")],
            ResultKind::Tourism => &[("area", "エリア"), ("category", "カテゴリ"), ("season", "季節")],
        }
    }

    /// Keyword groups for the one inferred tag. The first group with a hit wins.
    fn keyword_tags(self) -> (&'static str, &'static [(&'static str, &'static [&'static str])]) {
        match self {
            ResultKind::Restaurant => (
                "ジャンル",
                &[
                    ("フレンチ", &["フレンチ", "フランス料理"]),
                    ("イタリアン", &["イタリアン", "パスタ", "ピザ"]),
                    ("和食", &["和食", "日本料理", "寿司"]),
                    ("中華", &["中華", "中国料理"]),
                    ("カフェ", &["カフェ", "コーヒー"]),
                ],
            ),
            ResultKind::Tourism => (
                "カテゴリ",
                &[
                    ("歴史", &["歴史", "史跡", "文化財", "遺跡", "城"]),
                    ("自然", &["自然", "公園", "山", "海", "川", "花"]),
                    ("現代", &["現代", "タワー", "ビル", "ショッピング", "都市"]),
                    ("文化", &["文化", "美術館", "博物館", "神社", "寺"]),
                ],
            ),
        }
    }
}

/// Tags for a saved page: one per present search param, then at most one
/// inferred from the query's keywords.
pub fn extract_tags(kind: ResultKind, query: &str, search_params: &Value) -> Vec<String> {
    let mut tags: Vec<String> = kind
        .param_tags()
        .iter()
        .filter_map(|(key, label)| {
            let value = match search_params.get(key)? {
                Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                Value::Null | Value::String(_) => return None,
                other => other.to_string(),
            };
            Some(format!("{label}:{value}"))
        })
        .collect();

    let (label, groups) = kind.keyword_tags();
    let query = query.to_lowercase();
    if let Some((name, _)) = groups
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| query.contains(k)))
    {
        tags.push(format!("{label}:{name}"));
    }
    tags
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedResultMetadata {
    pub processing_time_ms: u64,
    pub agent_version: String,
}

/// One saved page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedResult {
    pub id: String,
    pub kind: ResultKind,
    pub query: String,
    pub search_params: Value,
    pub title: String,
    pub html_content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: SavedResultMetadata,
}

/// Input to [`SavedResultStore::save`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub html_content: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub search_params: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub processing_time_ms: Option<u64>,
}

/// Why a save was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("HTMLコンテンツとクエリは必須です")]
    MissingContent,
    #[error("HTMLコンテンツが大きすぎます（最大1MB）")]
    HtmlTooLarge,
    #[error("クエリが長すぎます（最大{MAX_QUERY_CHARS}文字）")]
    QueryTooLong,
}

/// Filters for [`SavedResultStore::history`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub results: Vec<SavedResult>,
    /// Every tag on the returned results, sorted and deduplicated.
    pub available_tags: Vec<String>,
    pub total_count: usize,
}

/// Changes applied by [`SavedResultStore::update`]. Absent or empty fields
/// are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRequest {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct SavedResultStore {
    results: Mutex<Vec<SavedResult>>,
    capacity: usize,
}

impl Default for SavedResultStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SAVED_RESULTS)
    }
}

impl SavedResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding at most `capacity` results (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SavedResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn save(&self, kind: ResultKind, request: SaveRequest) -> Result<SavedResult, StoreError> {
        let query = request.query.trim();
        if request.html_content.trim().is_empty() || query.is_empty() {
            return Err(StoreError::MissingContent);
        }
        if request.html_content.len() > MAX_HTML_BYTES {
            return Err(StoreError::HtmlTooLarge);
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(StoreError::QueryTooLong);
        }

        let search_params = request.search_params.unwrap_or_else(|| Value::Object(Default::default()));
        let now = Utc::now();
        let result = SavedResult {
            id: format!("res-{}", generate_trace_id().trim_start_matches("tr-")),
            kind,
            query: query.to_string(),
            tags: extract_tags(kind, query, &search_params),
            search_params,
            title: request
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| kind.default_title(query)),
            html_content: sanitize_html(&request.html_content),
            created_at: now,
            updated_at: now,
            metadata: SavedResultMetadata {
                processing_time_ms: request.processing_time_ms.unwrap_or(0),
                agent_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        let mut results = self.lock();
        if results.len() >= self.capacity {
            let excess = results.len() + 1 - self.capacity;
            results.drain(..excess);
        }
        results.push(result.clone());
        Ok(result)
    }

    pub fn get(&self, kind: ResultKind, id: &str) -> Option<SavedResult> {
        self.lock().iter().find(|r| r.kind == kind && r.id == id).cloned()
    }

    /// Apply `update` to a saved result. `None` when the id is unknown.
    pub fn update(&self, kind: ResultKind, id: &str, update: UpdateRequest) -> Option<SavedResult> {
        let mut results = self.lock();
        let result = results.iter_mut().find(|r| r.kind == kind && r.id == id)?;
        if let Some(title) = update.title.filter(|t| !t.trim().is_empty()) {
            result.title = title.trim().to_string();
        }
        if let Some(tags) = update.tags {
            result.tags = tags;
        }
        result.updated_at = Utc::now();
        Some(result.clone())
    }

    /// Remove a saved result. Returns whether it existed.
    pub fn delete(&self, kind: ResultKind, id: &str) -> bool {
        let mut results = self.lock();
        let before = results.len();
        results.retain(|r| !(r.kind == kind && r.id == id));
        results.len() != before
    }

    /// Saved results of `kind`, newest first.
    ///
    /// `tag` must match exactly; `search` is a case-insensitive substring of
    /// the query or title. At most `limit` results (default 10, capped at
    /// 100) are returned.
    pub fn history(&self, kind: ResultKind, query: &HistoryQuery) -> HistoryPage {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .min(MAX_HISTORY_LIMIT);
        let tag = query.tag.as_deref().filter(|t| !t.is_empty());
        let search = query
            .search
            .as_deref()
            .map(str::to_lowercase)
            .filter(|s| !s.is_empty());

        let results: Vec<SavedResult> = self
            .lock()
            .iter()
            .rev()
            .filter(|r| r.kind == kind)
            .filter(|r| tag.is_none_or(|tag| r.tags.iter().any(|t| t == tag)))
            .filter(|r| {
                search.as_deref().is_none_or(|s| {
                    r.query.to_lowercase().contains(s) || r.title.to_lowercase().contains(s)
                })
            })
            .take(limit)
            .cloned()
            .collect();

        let available_tags: BTreeSet<&str> = results
            .iter()
            .flat_map(|r| r.tags.iter().map(String::as_str))
            .collect();
        HistoryPage {
            available_tags: available_tags.into_iter().map(String::from).collect(),
            total_count: results.len(),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(query: &str, params: Value) -> SaveRequest {
        SaveRequest {
            html_content: "<!DOCTYPE html><html></html>".into(),
            query: query.into(),
            search_params: Some(params),
            ..Default::default()
        }
    }

    #[test]
    fn tags_from_params_and_keywords() {
        let tags = extract_tags(
            ResultKind::Restaurant,
            "渋谷で美味しいパスタ",
            &json!({"area": "渋谷", "scene": "デート", "time": null}),
        );
        assert_eq!(tags, vec!["エリア:渋谷", "シーン:デート", "ジャンル:イタリアン"]);

        let tags = extract_tags(ResultKind::Tourism, "京都のお寺と紅葉", &json!({"season": "秋"}));
        assert_eq!(tags, vec!["季節:秋", "カテゴリ:文化"]);
    }

    #[test]
    fn default_title_truncates_query() {
        let store = SavedResultStore::new();
        let long = "あ".repeat(25);
        let saved = store.save(ResultKind::Tourism, request(&long, json!({}))).unwrap();
        assert_eq!(saved.title, format!("観光スポット検索結果 - {}...", "あ".repeat(20)));
    }

    #[test]
    fn save_validates_input() {
        let store = SavedResultStore::new();
        assert_eq!(
            store.save(ResultKind::Restaurant, request("  ", json!({}))),
            Err(StoreError::MissingContent)
        );
        let mut big = request("渋谷", json!({}));
        big.html_content = "x".repeat(MAX_HTML_BYTES + 1);
        assert_eq!(store.save(ResultKind::Restaurant, big), Err(StoreError::HtmlTooLarge));
        assert_eq!(
            store.save(ResultKind::Restaurant, request(&"q".repeat(1_001), json!({}))),
            Err(StoreError::QueryTooLong)
        );
    }

    #[test]
    fn history_newest_first_with_filters() {
        let store = SavedResultStore::new();
        store.save(ResultKind::Restaurant, request("銀座で寿司", json!({"area": "銀座"}))).unwrap();
        store.save(ResultKind::Restaurant, request("渋谷でカフェ", json!({"area": "渋谷"}))).unwrap();
        store.save(ResultKind::Tourism, request("京都", json!({}))).unwrap();
        let newest = store
            .save(ResultKind::Restaurant, request("Shibuya ピザ", json!({"area": "渋谷"})))
            .unwrap();

        let page = store.history(ResultKind::Restaurant, &HistoryQuery::default());
        assert_eq!(page.total_count, 3);
        assert_eq!(page.results[0].id, newest.id);
        assert_eq!(
            page.available_tags,
            vec!["エリア:渋谷", "エリア:銀座", "ジャンル:イタリアン", "ジャンル:カフェ", "ジャンル:和食"]
        );

        let by_tag = store.history(
            ResultKind::Restaurant,
            &HistoryQuery {
                tag: Some("エリア:渋谷".into()),
                limit: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(by_tag.total_count, 1);
        assert_eq!(by_tag.results[0].query, "Shibuya ピザ");

        let by_search = store.history(
            ResultKind::Restaurant,
            &HistoryQuery {
                search: Some("shibuya".into()),
                ..Default::default()
            },
        );
        assert_eq!(by_search.total_count, 1);
    }

    #[test]
    fn history_limit_is_capped() {
        let store = SavedResultStore::new();
        for i in 0..105 {
            store.save(ResultKind::Restaurant, request(&format!("q{i}"), json!({}))).unwrap();
        }
        let page = store.history(
            ResultKind::Restaurant,
            &HistoryQuery {
                limit: Some(500),
                ..Default::default()
            },
        );
        assert_eq!(page.total_count, MAX_HISTORY_LIMIT);
    }

    #[test]
    fn update_and_delete() {
        let store = SavedResultStore::new();
        let saved = store.save(ResultKind::Restaurant, request("新宿", json!({}))).unwrap();

        let updated = store
            .update(
                ResultKind::Restaurant,
                &saved.id,
                UpdateRequest {
                    title: Some("金曜の候補".into()),
                    tags: None,
                },
            )
            .unwrap();
        assert_eq!(updated.title, "金曜の候補");
        assert_eq!(updated.tags, saved.tags);
        assert!(store.get(ResultKind::Tourism, &saved.id).is_none());
        assert!(store.update(ResultKind::Restaurant, "missing", UpdateRequest::default()).is_none());

        assert!(store.delete(ResultKind::Restaurant, &saved.id));
        assert!(!store.delete(ResultKind::Restaurant, &saved.id));
    }

    #[test]
    fn saved_html_is_sanitized() {
        let store = SavedResultStore::new();
        let mut req = request("渋谷", json!({}));
        req.html_content = "<p>一覧</p><script>alert(document.cookie)</script><img src='a.png' onerror='x()'>".into();
        let saved = store.save(ResultKind::Restaurant, req).unwrap();
        assert_eq!(saved.html_content, "<p>一覧</p><img src='a.png'>");
    }

    #[test]
    fn oldest_result_is_evicted_at_capacity() {
        let store = SavedResultStore::with_capacity(2);
        let first = store.save(ResultKind::Restaurant, request("一件目", json!({}))).unwrap();
        store.save(ResultKind::Tourism, request("二件目", json!({}))).unwrap();
        let third = store.save(ResultKind::Restaurant, request("三件目", json!({}))).unwrap();

        assert!(store.get(ResultKind::Restaurant, &first.id).is_none());
        let page = store.history(ResultKind::Restaurant, &HistoryQuery::default());
        assert_eq!(page.total_count, 1);
        assert_eq!(page.results[0].id, third.id);
    }
}
