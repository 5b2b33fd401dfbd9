use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use crate::lists::UserState;

// ── Constants ──────────────────────────────────────────────────────────

pub const DEFAULT_TARGET_YEAR: i32 = 2026;
pub const DEFAULT_BRACKET_SIZE: usize = 16;
pub const MAX_BRACKET_SIZE: usize = 256;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:4173";
pub const DEFAULT_SITE_URL: &str = "http://127.0.0.1:4173";
pub const DEFAULT_SITE_NAME: &str = "Release Radar";
pub const CATALOG_FILE: &str = "games.json";
pub const META_FILE: &str = "meta.json";
pub const SITEMAP_FILE: &str = "sitemap.xml";
pub const USER_AGENT: &str = "release-radar";

pub const IGDB_API_URL: &str = "https://api.igdb.com/v4/games";
pub const IGDB_IMAGE_URL: &str = "https://images.igdb.com/igdb/image/upload";
pub const IGDB_PAGE_SIZE: u32 = 50;
pub const IGDB_MAX_OFFSET: u32 = 1000;
pub const RAWG_API_URL: &str = "https://api.rawg.io/api/games";
pub const RAWG_PAGE_SIZE: u32 = 40;
pub const RAWG_MAX_PAGES: u32 = 10;
pub const CATALOG_LIMIT: usize = 250;

pub const TOP_FIVE_LIMIT: usize = 5;
pub const COMPARE_MIN: usize = 2;
pub const COMPARE_MAX: usize = 4;

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedUserState = Arc<Mutex<UserState>>;

// ── Catalog types ──────────────────────────────────────────────────────

/// One catalog record. Written once by ingestion, never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub title: String,
    pub slug: String,
    /// ISO `YYYY-MM-DD`; anything unparseable is shown as TBA.
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub hype: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub similar_games: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogMeta {
    pub year: i32,
    pub total_games: usize,
    pub genres: Vec<String>,
    pub platforms: Vec<String>,
    pub month_counts: BTreeMap<String, usize>,
    pub generated_at: String,
}

// ── Config types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub site_url: String,
    pub site_name: String,
    pub target_year: i32,
    pub data_dir: String,
    pub site_dir: String,
    pub storage_dir: String,
    pub bind_addr: String,
    pub bracket_size: usize,
    pub igdb_client_id: String,
    pub igdb_token: String,
    pub rawg_key: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            site_name: DEFAULT_SITE_NAME.to_string(),
            target_year: DEFAULT_TARGET_YEAR,
            data_dir: "data".to_string(),
            site_dir: "site".to_string(),
            storage_dir: "storage".to_string(),
            bind_addr: String::new(),
            bracket_size: DEFAULT_BRACKET_SIZE,
            igdb_client_id: String::new(),
            igdb_token: String::new(),
            rawg_key: String::new(),
        }
    }
}

// ── Server types ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<Vec<Game>>,
    pub meta: Arc<CatalogMeta>,
    pub user_state: SharedUserState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error: String,
}

// ── IGDB wire types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IgdbGameNode {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub first_release_date: Option<i64>,
    #[serde(default)]
    pub platforms: Vec<NamedNode>,
    #[serde(default)]
    pub genres: Vec<NamedNode>,
    pub cover: Option<IgdbImage>,
    #[serde(default)]
    pub screenshots: Vec<IgdbImage>,
    #[serde(default)]
    pub videos: Vec<IgdbVideo>,
    #[serde(default)]
    pub similar_games: Vec<IgdbSimilar>,
    pub summary: Option<String>,
    pub hypes: Option<u32>,
    pub follows: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedNode {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IgdbImage {
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IgdbVideo {
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IgdbSimilar {
    pub slug: Option<String>,
}

// ── RAWG wire types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawgPage {
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<RawgGameNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawgGameNode {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub released: Option<String>,
    pub background_image: Option<String>,
    #[serde(default)]
    pub platforms: Vec<RawgPlatformEntry>,
    #[serde(default)]
    pub genres: Vec<NamedNode>,
    #[serde(default)]
    pub short_screenshots: Vec<RawgScreenshot>,
    pub added: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawgPlatformEntry {
    pub platform: Option<NamedNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawgScreenshot {
    pub image: Option<String>,
}
