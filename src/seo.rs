use crate::types::Game;
use serde::Serialize;
use serde_json::{json, Value};

pub const DESCRIPTION_LIMIT: usize = 160;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub canonical_url: String,
    pub og_type: String,
    pub og_image: Option<String>,
    pub twitter_card: String,
}

#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub name: String,
    pub base_url: String,
    pub year: i32,
}

impl SiteInfo {
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

/// Cuts at the last word boundary that fits, appending an ellipsis.
pub fn truncate_description(raw: &str, limit: usize) -> String {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() <= limit {
        return text;
    }
    let budget = limit.saturating_sub(1);
    let mut out = String::new();
    for word in text.split(' ') {
        let needed = if out.is_empty() { word.chars().count() } else { word.chars().count() + 1 };
        if out.chars().count() + needed > budget {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        out = text.chars().take(budget).collect();
    }
    out.push('…');
    out
}

pub fn page_meta_for_game(game: &Game, site: &SiteInfo) -> PageMeta {
    let fallback = format!(
        "{} releases {} on {}. Genres: {}.",
        game.title,
        game.release_label(),
        game.platform_label(),
        game.genre_label()
    );
    let description = game
        .summary
        .as_deref()
        .filter(|summary| !summary.trim().is_empty())
        .unwrap_or(&fallback);
    PageMeta {
        title: format!("{}: Release Date, Platforms & Hype | {}", game.title, site.name),
        description: truncate_description(description, DESCRIPTION_LIMIT),
        canonical_url: site.url(&format!("/games/{}", game.slug)),
        og_type: "video.game".to_string(),
        og_image: game.image.clone(),
        twitter_card: if game.image.is_some() { "summary_large_image" } else { "summary" }.to_string(),
    }
}

pub fn page_meta_for_route(route: &str, site: &SiteInfo) -> PageMeta {
    let year = site.year;
    let (title, description) = match route.trim_end_matches('/') {
        "" => (
            format!("Upcoming Games of {year} | {}", site.name),
            format!("Every major video game releasing in {year}, ranked by hype, with dates, platforms and countdowns."),
        ),
        "/calendar" => (
            format!("{year} Game Release Calendar | {}", site.name),
            format!("Month by month calendar of {year} game releases. Export dates to your own calendar."),
        ),
        "/watchlist" => (
            format!("Your Watchlist | {}", site.name),
            "The upcoming games you are tracking, with release countdowns.".to_string(),
        ),
        "/compare" => (
            format!("Compare Upcoming Games | {}", site.name),
            "Compare release dates, platforms and genres of upcoming games side by side.".to_string(),
        ),
        "/tier-list" => (
            format!("{year} Games Tier List | {}", site.name),
            format!("Drag the most anticipated games of {year} into S through F tiers."),
        ),
        "/top-5" => (
            format!("Your Top 5 of {year} | {}", site.name),
            format!("Pick and order the five {year} releases you want most."),
        ),
        "/bracket" => (
            format!("Most Anticipated Game Bracket {year} | {}", site.name),
            format!("Sixteen of the most hyped {year} games go head to head. Pick winners until one is left."),
        ),
        other => (
            format!("{} | {}", other.trim_start_matches('/'), site.name),
            format!("Upcoming {year} video game releases."),
        ),
    };
    let path = if route.is_empty() { "/" } else { route };
    PageMeta {
        title,
        description: truncate_description(&description, DESCRIPTION_LIMIT),
        canonical_url: site.url(path),
        og_type: "website".to_string(),
        og_image: None,
        twitter_card: "summary".to_string(),
    }
}

/// schema.org `VideoGame` JSON-LD.
pub fn game_structured_data(game: &Game, site: &SiteInfo) -> Value {
    let mut data = json!({
        "@context": "https://schema.org",
        "@type": "VideoGame",
        "name": game.title,
        "url": site.url(&format!("/games/{}", game.slug)),
        "genre": game.genres,
        "gamePlatform": game.platforms,
    });
    if let Some(object) = data.as_object_mut() {
        if let Some(image) = game.image.as_ref() {
            object.insert("image".to_string(), json!(image));
        }
        if let Some(day) = game.release_day() {
            object.insert("datePublished".to_string(), json!(day.format("%Y-%m-%d").to_string()));
        }
        if let Some(summary) = game.summary.as_ref() {
            object.insert("description".to_string(), json!(truncate_description(summary, DESCRIPTION_LIMIT)));
        }
    }
    data
}

pub fn catalog_structured_data(games: &[&Game], site: &SiteInfo) -> Value {
    let items: Vec<Value> = games
        .iter()
        .enumerate()
        .map(|(index, game)| {
            json!({
                "@type": "ListItem",
                "position": index + 1,
                "url": site.url(&format!("/games/{}", game.slug)),
                "name": game.title,
            })
        })
        .collect();
    json!({
        "@context": "https://schema.org",
        "@type": "ItemList",
        "name": format!("Upcoming games of {}", site.year),
        "numberOfItems": items.len(),
        "itemListElement": items,
    })
}
