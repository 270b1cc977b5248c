//! Keyword classifiers for restaurant genres and tourism categories.

/// Genres in match order. The first genre with a keyword hit wins.
pub const GENRE_KEYWORDS: &[(&str, &[&str])] = &[
    ("フレンチ", &["フレンチ", "フランス", "ビストロ"]),
    ("イタリアン", &["イタリアン", "イタリア", "パスタ", "ピザ"]),
    ("和食", &["和食", "日本料理", "懐石", "割烹"]),
    ("中華", &["中華", "中国料理", "北京", "上海", "広東"]),
    ("焼肉", &["焼肉", "焼き肉", "やきにく"]),
    ("寿司", &["寿司", "すし", "鮨"]),
    ("カフェ", &["カフェ", "cafe", "coffee"]),
    ("バー", &["バー", "bar", "ワイン"]),
];

/// Genre used when nothing matches.
pub const DEFAULT_GENRE: &str = "レストラン";

/// Guess a restaurant genre from free text.
pub fn guess_genre(text: &str) -> &'static str {
    let text = text.to_lowercase();
    GENRE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map_or(DEFAULT_GENRE, |(genre, _)| *genre)
}

/// Tourism categories.
pub const CATEGORY_HISTORY: &str = "歴史";
pub const CATEGORY_NATURE: &str = "自然";
pub const CATEGORY_MODERN: &str = "現代";
pub const CATEGORY_CULTURE: &str = "文化";

/// Guess a spot's category from its name.
pub fn spot_category(name: &str) -> &'static str {
    let has_any = |words: &[&str]| words.iter().any(|w| name.contains(w));
    if has_any(&["寺", "神社", "城", "宮"]) {
        CATEGORY_HISTORY
    } else if has_any(&["公園", "山", "川", "海"]) {
        CATEGORY_NATURE
    } else if has_any(&["タワー", "スタジオ", "センター"]) {
        CATEGORY_MODERN
    } else {
        CATEGORY_CULTURE
    }
}

/// Feature tags for a category. Every category shares the two base tags.
pub fn features_for_category(category: &str) -> Vec<String> {
    let extra: [&str; 2] = if category.contains(CATEGORY_HISTORY) {
        ["文化財", "由緒ある"]
    } else if category.contains(CATEGORY_NATURE) {
        ["四季が美しい", "リラックス"]
    } else if category.contains(CATEGORY_MODERN) {
        ["最新技術", "エンターテイメント"]
    } else {
        ["伝統文化", "体験可能"]
    };
    ["写真撮影可", "アクセス良好"]
        .into_iter()
        .chain(extra)
        .map(String::from)
        .collect()
}

pub fn best_season(category: &str) -> &'static str {
    if category.contains(CATEGORY_NATURE) {
        "春・秋"
    } else {
        "通年"
    }
}

pub fn atmosphere(category: &str) -> &'static str {
    if category.contains(CATEGORY_HISTORY) {
        "荘厳で静寂"
    } else if category.contains(CATEGORY_NATURE) {
        "開放的で癒される"
    } else if category.contains(CATEGORY_MODERN) {
        "活気あふれる"
    } else {
        "文化的で洗練された"
    }
}
