//! Venue search: restaurant and tourism-spot workflows and their native logic.

pub mod catalog;
pub mod chain;
pub mod genre;
pub mod html;
pub mod params;
pub mod parse;
pub mod restaurant;
pub mod selection;
pub mod tourism;

pub use catalog::{Restaurant, TourismSpot, fallback_restaurants, fixed_restaurants, tourism_spots};
pub use chain::{HTML_KEY, SearchKind};
pub use genre::guess_genre;
pub use html::{
    Card, clean_html_content, extract_html, fallback_page, is_complete_document,
    render_cards_page, sanitize_html,
};
pub use params::{RestaurantParams, TourismParams};
pub use parse::parse_search_results;
pub use restaurant::{RestaurantSearch, restaurant_search_workflow};
pub use selection::{Candidate, normalize_selection};
pub use tourism::{TourismSearch, tourism_spots_workflow};
