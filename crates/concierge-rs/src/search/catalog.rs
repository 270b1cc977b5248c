//! Venue types and the static lookup tables used when live search is off.

use crate::search::genre::{atmosphere, best_season, features_for_category, spot_category};
use crate::search::params::{DEFAULT_AREA, RestaurantParams, TourismParams};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

// ── Venue types ────────────────────────────────────────────────────

/// A restaurant candidate or selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub name: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Why the selection step picked it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Restaurant {
    fn fixed(name: &str, area: &str, genre: &str, description: &str, slug: &str) -> Self {
        Self {
            name: name.to_string(),
            area: area.to_string(),
            genre: genre.to_string(),
            description: description.to_string(),
            url: Some(format!("https://example.com/{slug}")),
            features: Vec::new(),
            price_range: None,
            source: None,
            reason: None,
        }
    }
}

/// A tourism-spot candidate or selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourismSpot {
    pub name: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default)]
    pub access: String,
    #[serde(default)]
    pub best_season: String,
    #[serde(default)]
    pub atmosphere: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ── Restaurants ────────────────────────────────────────────────────

/// The fixed restaurant table.
pub fn fixed_restaurants() -> Vec<Restaurant> {
    vec![
        Restaurant::fixed("ビストロ・ルミエール", "渋谷", "フレンチ", "落ち着いた雰囲気で楽しむ本格フレンチ", "lumiere"),
        Restaurant::fixed("日本料理 花月", "銀座", "和食", "季節の食材を活かした繊細な和食", "kagetsu"),
        Restaurant::fixed("トラットリア・ミラノ", "六本木", "イタリアン", "本場の味を楽しめるイタリアン", "milano"),
        Restaurant::fixed("龍華楼", "新宿", "中華", "伝統的な中華料理の名店", "ryukaku"),
        Restaurant::fixed("ステーキハウス神戸", "表参道", "ステーキ", "最高級の神戸牛を提供", "kobe"),
        Restaurant::fixed("寿司 次郎", "築地", "寿司", "新鮮な魚介を使った江戸前寿司", "jiro"),
        Restaurant::fixed("カフェ・ド・パリ", "代官山", "カフェ", "パリの雰囲気を楽しめるおしゃれなカフェ", "paris"),
        Restaurant::fixed("焼肉 牛角", "池袋", "焼肉", "上質な和牛を堪能できる焼肉店", "gyukaku"),
        Restaurant::fixed("そば処 更科", "浅草", "そば", "伝統の手打ちそばが自慢の老舗", "sarashina"),
        Restaurant::fixed("スペイン料理 オラ", "恵比寿", "スペイン料理", "本格的なパエリアが楽しめる", "hola"),
    ]
}

/// Venue names per genre for [`fallback_restaurants`].
const FALLBACK_NAMES: &[(&str, &[&str])] = &[
    ("フレンチ", &["ルミエール", "シェ・ピエール", "ラ・ベルテ", "ル・ジャルダン", "ビストロ・ソレイユ"]),
    ("和食", &["季節料理 花月", "割烹 なだ万", "和ダイニング 雅", "日本料理 青山", "料亭 花鳥風月"]),
    ("イタリアン", &["トラットリア・ミラノ", "ピッツェリア・ナポリ", "リストランテ・ローマ", "オステリア・ヴェネツィア"]),
    ("中華", &["龍華楼", "福満園", "天香閣", "金龍軒", "華味軒"]),
];

/// Four generated restaurants, one per genre, for when live search finds nothing.
pub fn fallback_restaurants(params: &RestaurantParams) -> Vec<Restaurant> {
    fallback_restaurants_with(params, &mut rand::thread_rng())
}

/// [`fallback_restaurants`] with a caller-supplied RNG.
pub fn fallback_restaurants_with(params: &RestaurantParams, rng: &mut impl Rng) -> Vec<Restaurant> {
    let area = params.area.as_str();
    let scene = params.scene.as_str();

    FALLBACK_NAMES
        .iter()
        .enumerate()
        .map(|(i, (genre, names))| {
            let name = names.choose(rng).copied().unwrap_or("レストラン");
            let features = if i % 2 == 0 {
                ["個室あり", "予約可"]
            } else {
                ["カウンター席", "テラス席"]
            };
            Restaurant {
                name: format!("{name} {area}店"),
                area: format!("{area}駅周辺"),
                genre: genre.to_string(),
                description: format!(
                    "{area}で{scene}に人気の{genre}レストラン。落ち着いた雰囲気と確かな味で評判"
                ),
                url: None,
                features: features.iter().map(|f| f.to_string()).collect(),
                price_range: Some("¥4,000-8,000".to_string()),
                source: Some("fallback".to_string()),
                reason: None,
            }
        })
        .collect()
}

// ── Tourism spots ──────────────────────────────────────────────────

type SpotTable = &'static [(&'static str, &'static [(&'static str, &'static str)])];

/// Area → category → (name, description), in table order.
const TOURISM_DATABASE: &[(&str, SpotTable)] = &[
    (
        "東京",
        &[
            (
                "歴史",
                &[
                    ("浅草寺", "東京最古の寺院として親しまれる由緒ある観光地"),
                    ("明治神宮", "明治天皇を祀る神社で都心のオアシス"),
                    ("東京国立博物館", "日本と東洋の文化財を展示する国内最大の博物館"),
                ],
            ),
            (
                "自然",
                &[
                    ("上野恩賜公園", "桜の名所として有名で多くの文化施設も併設"),
                    ("新宿御苑", "都心にある広大な庭園で四季を感じられる"),
                ],
            ),
            (
                "現代",
                &[
                    ("東京スカイツリー", "東京の新しいシンボルタワー"),
                    ("お台場", "未来的な街並みとエンターテイメントが楽しめる"),
                ],
            ),
            (
                "文化",
                &[
                    ("歌舞伎座", "伝統的な歌舞伎を楽しめる劇場"),
                    ("国立新美術館", "現代アートの展示で有名な美術館"),
                ],
            ),
        ],
    ),
    (
        "京都",
        &[
            (
                "歴史",
                &[
                    ("清水寺", "世界遺産に登録された古都京都の象徴的な寺院"),
                    ("金閣寺", "金色に輝く美しい舎利殿で有名"),
                    ("伏見稲荷大社", "千本鳥居で有名な稲荷神社の総本宮"),
                ],
            ),
            (
                "自然",
                &[
                    ("嵐山", "美しい竹林と渡月橋で有名な景勝地"),
                    ("哲学の道", "桜並木が美しい散歩道"),
                ],
            ),
            (
                "文化",
                &[
                    ("祇園", "舞妓さんが歩く伝統的な花街"),
                    ("二条城", "徳川将軍の京都での居住地として使われた城"),
                ],
            ),
        ],
    ),
    (
        "大阪",
        &[
            (
                "歴史",
                &[
                    ("大阪城", "豊臣秀吉が築いた名城"),
                    ("住吉大社", "全国の住吉神社の総本社"),
                ],
            ),
            (
                "現代",
                &[
                    ("通天閣", "大阪のシンボルタワー"),
                    ("ユニバーサル・スタジオ・ジャパン", "人気のテーマパーク"),
                ],
            ),
            ("文化", &[("道頓堀", "大阪の食文化とエンターテイメントが集まる繁華街")]),
        ],
    ),
];

const MAX_SPOTS: usize = 6;

/// Areas with tourism data.
pub fn tourism_areas() -> impl Iterator<Item = &'static str> {
    TOURISM_DATABASE.iter().map(|(area, _)| *area)
}

/// Up to six spots for the requested area, preferring the requested category.
///
/// Takes up to three spots from the requested category, then up to two from
/// each other category in table order while fewer than six are collected.
/// Unknown areas fall back to 東京. Enrichment (features, season,
/// atmosphere) follows the requested category; `category` on each spot is
/// derived from its name.
pub fn tourism_spots(params: &TourismParams) -> Vec<TourismSpot> {
    let Some(&(area, table)) = TOURISM_DATABASE
        .iter()
        .find(|(area, _)| *area == params.area)
        .or_else(|| TOURISM_DATABASE.iter().find(|(area, _)| *area == DEFAULT_AREA))
    else {
        return Vec::new();
    };
    let category = params.category.as_str();

    let mut picked: Vec<(&str, &str)> = Vec::new();
    if let Some((_, spots)) = table.iter().find(|(cat, _)| *cat == category) {
        picked.extend(spots.iter().take(3).copied());
    }
    for (cat, spots) in table.iter() {
        if *cat != category && picked.len() < MAX_SPOTS {
            picked.extend(spots.iter().take(2).copied());
        }
    }
    picked.truncate(MAX_SPOTS);

    picked
        .into_iter()
        .map(|(name, description)| TourismSpot {
            name: name.to_string(),
            area: area.to_string(),
            category: spot_category(name).to_string(),
            description: description.to_string(),
            features: features_for_category(category),
            access: format!("{area}駅から電車で30分以内"),
            best_season: best_season(category).to_string(),
            atmosphere: atmosphere(category).to_string(),
            reason: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn fixed_table_has_ten_unique_venues() {
        let venues = fixed_restaurants();
        assert_eq!(venues.len(), 10);
        let mut names: Vec<_> = venues.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 10);
        assert_eq!(venues[0].url.as_deref(), Some("https://example.com/lumiere"));
    }

    #[test]
    fn fallback_covers_four_genres_with_alternating_features() {
        let params = RestaurantParams {
            area: "渋谷".into(),
            ..Default::default()
        };
        let venues = fallback_restaurants_with(&params, &mut StdRng::seed_from_u64(7));

        let genres: Vec<_> = venues.iter().map(|r| r.genre.as_str()).collect();
        assert_eq!(genres, vec!["フレンチ", "和食", "イタリアン", "中華"]);
        for (i, venue) in venues.iter().enumerate() {
            assert!(venue.name.ends_with(" 渋谷店"), "{}", venue.name);
            assert_eq!(venue.area, "渋谷駅周辺");
            assert_eq!(venue.price_range.as_deref(), Some("¥4,000-8,000"));
            let expected = if i % 2 == 0 { "個室あり" } else { "カウンター席" };
            assert_eq!(venue.features[0], expected);
        }
        assert!(venues[0].description.contains("渋谷でデートに人気のフレンチ"));
    }

    #[test]
    fn tourism_prefers_requested_category() {
        let params = TourismParams {
            area: "京都".into(),
            category: "歴史".into(),
            ..Default::default()
        };
        let spots = tourism_spots(&params);
        let names: Vec<_> = spots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["清水寺", "金閣寺", "伏見稲荷大社", "嵐山", "哲学の道", "祇園"]
        );
        assert_eq!(spots[0].access, "京都駅から電車で30分以内");
        assert_eq!(spots[0].atmosphere, "荘厳で静寂");
        assert_eq!(spots[3].category, "自然");
        assert_eq!(spots[3].best_season, "通年");
    }

    #[test]
    fn tourism_unknown_area_falls_back_to_tokyo() {
        let params = TourismParams {
            area: "札幌".into(),
            category: "自然".into(),
            ..Default::default()
        };
        let spots = tourism_spots(&params);
        assert_eq!(spots.len(), 6);
        assert!(spots.iter().all(|s| s.area == "東京"));
        assert_eq!(spots[0].name, "上野恩賜公園");
        assert_eq!(spots[0].best_season, "春・秋");
        // 自然 (2) + 歴史 (2) + 現代 (2) = 6, 文化 never reached.
        assert!(!spots.iter().any(|s| s.name == "歌舞伎座"));
    }

    #[test]
    fn tourism_unknown_category_fills_from_all() {
        let params = TourismParams {
            area: "大阪".into(),
            category: "グルメ".into(),
            ..Default::default()
        };
        let spots = tourism_spots(&params);
        assert_eq!(spots.len(), 5);
        assert_eq!(spots[4].name, "道頓堀");
        assert_eq!(spots[0].features[2], "伝統文化");
        assert_eq!(tourism_areas().collect::<Vec<_>>(), vec!["東京", "京都", "大阪"]);
    }
}
