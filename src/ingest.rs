use crate::catalog::{build_meta, slugify, write_json};
use crate::config::*;
use crate::types::*;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::de::DeserializeOwned;
use std::{
  collections::{HashMap, HashSet},
  path::{Path, PathBuf},
  thread::sleep,
  time::Duration,
};
use tracing::{info, warn};

/// Titles whose hype is raised to at least the paired value. Matched as a
/// case-insensitive substring of the title.
pub const HYPE_BOOSTS: &[(&str, u8)] = &[
  ("grand theft auto", 100),
  ("resident evil requiem", 95),
  ("marvel's wolverine", 93),
  ("007 first light", 90),
  ("fable", 88),
  ("crimson desert", 87),
  ("onimusha", 86),
  ("nioh 3", 85),
  ("pragmata", 84),
  ("phantom blade", 84),
];

pub const FLAGSHIP_TITLE: &str = "Grand Theft Auto VI";

#[derive(Debug, Clone)]
pub struct IngestReport {
  pub igdb_count: usize,
  pub rawg_count: usize,
  pub written: usize,
  pub catalog_path: PathBuf,
  pub meta_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CoverHit {
  pub title: String,
  pub cover_url: Option<String>,
}

// ── HTTP ───────────────────────────────────────────────────────────────

pub fn http_client() -> Result<reqwest::blocking::Client, String> {
  reqwest::blocking::Client::builder()
    .user_agent(USER_AGENT)
    .timeout(Duration::from_secs(30))
    .build()
    .map_err(|e| format!("build http client: {e}"))
}

fn send_with_retry<T: DeserializeOwned>(
  label: &str,
  build: impl Fn() -> reqwest::blocking::RequestBuilder,
) -> Result<T, String> {
  let mut last_send_err = String::new();
  let mut resp = None;
  for attempt in 0..3u32 {
    if attempt > 0 {
      sleep(Duration::from_millis(500 * u64::from(attempt)));
    }
    match build().send() {
      Ok(r) => {
        resp = Some(r);
        break;
      }
      Err(e) => {
        last_send_err = format!("{label} request failed (attempt {}): {e}", attempt + 1);
        append_ingest_log(&format!("{label} error"), &last_send_err);
      }
    }
  }
  let resp = resp.ok_or_else(|| last_send_err.clone())?;
  let status = resp.status();
  let body = resp.text().map_err(|e| {
    append_ingest_log(&format!("{label} error"), &format!("read failed: {e}"));
    format!("{label} read failed: {e}")
  })?;
  append_ingest_log(&format!("{label} response"), &format!("status: {status}\nbody bytes: {}", body.len()));
  if !status.is_success() {
    return Err(format!("{label} error {status}: {body}"));
  }
  serde_json::from_str::<T>(&body).map_err(|e| {
    append_ingest_log(&format!("{label} error"), &format!("parse failed: {e}"));
    format!("{label} parse failed: {e}")
  })
}

// ── IGDB ───────────────────────────────────────────────────────────────

pub fn year_window(year: i32) -> (i64, i64) {
  let start = Utc
    .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
    .single()
    .map(|t| t.timestamp())
    .unwrap_or_default();
  let end = Utc
    .with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0)
    .single()
    .map(|t| t.timestamp())
    .unwrap_or_default();
  (start, end)
}

pub fn igdb_games_query(year: i32, offset: u32) -> String {
  let (start, end) = year_window(year);
  format!(
    "fields name,slug,first_release_date,platforms.name,genres.name,cover.image_id,screenshots.image_id,videos.video_id,similar_games.slug,summary,hypes,follows;\n\
     where first_release_date >= {start} & first_release_date < {end};\n\
     sort hypes desc;\n\
     limit {IGDB_PAGE_SIZE};\n\
     offset {offset};"
  )
}

pub fn igdb_search_query(title: &str) -> String {
  let escaped = title.replace('\\', "\\\\").replace('"', "\\\"");
  format!("search \"{escaped}\";\nfields name,cover.image_id;\nlimit 5;")
}

fn igdb_credentials(config: &AppConfig) -> Result<(String, String), String> {
  let client_id = config.igdb_client_id.trim();
  let token = config.igdb_token.trim();
  if client_id.is_empty() || token.is_empty() {
    return Err("IGDB credentials are not set (config or IGDB_CLIENT_ID / IGDB_ACCESS_TOKEN).".to_string());
  }
  Ok((client_id.to_string(), token.to_string()))
}

pub fn igdb_request(
  client: &reqwest::blocking::Client,
  config: &AppConfig,
  query: &str,
) -> Result<Vec<IgdbGameNode>, String> {
  let (client_id, token) = igdb_credentials(config)?;
  append_ingest_log(
    "IGDB request",
    &format!("url: {IGDB_API_URL}\nClient-ID: {client_id}\nAuthorization: Bearer [redacted]\nquery:\n{query}"),
  );
  send_with_retry("IGDB", || {
    client
      .post(IGDB_API_URL)
      .header("Client-ID", client_id.as_str())
      .header("Authorization", format!("Bearer {token}"))
      .header("Accept", "application/json")
      .body(query.to_string())
  })
}

pub fn igdb_image_url(size: &str, image_id: &str) -> String {
  format!("{IGDB_IMAGE_URL}/{size}/{image_id}.jpg")
}

pub fn igdb_hype(node: &IgdbGameNode) -> u8 {
  let hypes = u64::from(node.hypes.unwrap_or(0));
  let follows = u64::from(node.follows.unwrap_or(0));
  (40 + hypes * 2 + follows / 10).min(100) as u8
}

pub fn date_from_epoch(secs: i64) -> Option<NaiveDate> {
  DateTime::from_timestamp(secs, 0).map(|t| t.date_naive())
}

pub fn map_igdb_node(node: &IgdbGameNode) -> Option<Game> {
  let title = node.name.as_deref().map(str::trim).filter(|name| !name.is_empty())?;
  let id = node.id?;
  let slug = node
    .slug
    .as_deref()
    .map(str::trim)
    .filter(|slug| !slug.is_empty())
    .map(str::to_string)
    .unwrap_or_else(|| slugify(title));
  let release_date = node
    .first_release_date
    .and_then(date_from_epoch)
    .map(|day| day.format("%Y-%m-%d").to_string())
    .unwrap_or_default();

  Some(Game {
    id: format!("igdb-{id}"),
    title: title.to_string(),
    slug,
    release_date,
    platforms: named(&node.platforms),
    genres: named(&node.genres),
    hype: igdb_hype(node),
    image: node
      .cover
      .as_ref()
      .and_then(|cover| cover.image_id.as_deref())
      .map(|image_id| igdb_image_url("t_cover_big", image_id)),
    summary: node.summary.clone().filter(|s| !s.trim().is_empty()),
    screenshots: node
      .screenshots
      .iter()
      .filter_map(|shot| shot.image_id.as_deref())
      .map(|image_id| igdb_image_url("t_screenshot_big", image_id))
      .collect(),
    videos: node
      .videos
      .iter()
      .filter_map(|video| video.video_id.as_deref())
      .map(|video_id| format!("https://www.youtube.com/watch?v={video_id}"))
      .collect(),
    similar_games: node
      .similar_games
      .iter()
      .filter_map(|similar| similar.slug.clone())
      .collect(),
    source: Some("igdb".to_string()),
  })
}

fn named(nodes: &[NamedNode]) -> Vec<String> {
  nodes
    .iter()
    .filter_map(|node| node.name.as_deref())
    .map(str::trim)
    .filter(|name| !name.is_empty())
    .map(str::to_string)
    .collect()
}

/// Pages through IGDB until a short page, the offset cap, or the first
/// failure. Whatever was fetched before a failure is kept.
pub fn fetch_igdb_games(client: &reqwest::blocking::Client, config: &AppConfig, year: i32) -> Vec<Game> {
  let mut out = Vec::new();
  let mut offset = 0;
  while offset <= IGDB_MAX_OFFSET {
    let nodes = match igdb_request(client, config, &igdb_games_query(year, offset)) {
      Ok(nodes) => nodes,
      Err(err) => {
        warn!("IGDB page at offset {offset} failed, keeping {} games: {err}", out.len());
        break;
      }
    };
    let count = nodes.len();
    out.extend(nodes.iter().filter_map(map_igdb_node));
    info!("IGDB offset {offset}: {count} records");
    if count < IGDB_PAGE_SIZE as usize {
      break;
    }
    offset += IGDB_PAGE_SIZE;
  }
  out
}

pub fn lookup_cover(config: &AppConfig, title: &str) -> Result<Vec<CoverHit>, String> {
  let client = http_client()?;
  let nodes = igdb_request(&client, config, &igdb_search_query(title))?;
  Ok(
    nodes
      .into_iter()
      .filter_map(|node| {
        let title = node.name?;
        let cover_url = node
          .cover
          .and_then(|cover| cover.image_id)
          .map(|image_id| igdb_image_url("t_cover_big", &image_id));
        Some(CoverHit { title, cover_url })
      })
      .collect(),
  )
}

// ── RAWG ───────────────────────────────────────────────────────────────

pub fn rawg_request(
  client: &reqwest::blocking::Client,
  config: &AppConfig,
  year: i32,
  page: u32,
) -> Result<RawgPage, String> {
  let key = config.rawg_key.trim();
  if key.is_empty() {
    return Err("RAWG API key is not set (config or RAWG_API_KEY).".to_string());
  }
  let dates = format!("{year}-01-01,{year}-12-31");
  append_ingest_log(
    "RAWG request",
    &format!("url: {RAWG_API_URL}\nkey: [redacted]\ndates: {dates}\npage: {page}\npage_size: {RAWG_PAGE_SIZE}"),
  );
  send_with_retry("RAWG", || {
    client.get(RAWG_API_URL).query(&[
      ("key", key.to_string()),
      ("dates", dates.clone()),
      ("page", page.to_string()),
      ("page_size", RAWG_PAGE_SIZE.to_string()),
      ("ordering", "-added".to_string()),
    ])
  })
}

pub fn rawg_hype(node: &RawgGameNode) -> u8 {
  let added = u64::from(node.added.unwrap_or(0));
  (30 + added / 20).min(100) as u8
}

pub fn map_rawg_node(node: &RawgGameNode) -> Option<Game> {
  let title = node.name.as_deref().map(str::trim).filter(|name| !name.is_empty())?;
  let id = node.id?;
  let release_date = node
    .released
    .as_deref()
    .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
    .map(|day| day.format("%Y-%m-%d").to_string())
    .unwrap_or_default();

  Some(Game {
    id: format!("rawg-{id}"),
    title: title.to_string(),
    slug: node
      .slug
      .clone()
      .filter(|slug| !slug.trim().is_empty())
      .unwrap_or_else(|| slugify(title)),
    release_date,
    platforms: node
      .platforms
      .iter()
      .filter_map(|entry| entry.platform.as_ref())
      .filter_map(|platform| platform.name.clone())
      .collect(),
    genres: named(&node.genres),
    hype: rawg_hype(node),
    image: node.background_image.clone().filter(|url| !url.trim().is_empty()),
    summary: None,
    screenshots: node
      .short_screenshots
      .iter()
      .filter_map(|shot| shot.image.clone())
      .collect(),
    videos: Vec::new(),
    similar_games: Vec::new(),
    source: Some("rawg".to_string()),
  })
}

pub fn fetch_rawg_games(client: &reqwest::blocking::Client, config: &AppConfig, year: i32) -> Vec<Game> {
  let mut out = Vec::new();
  for page in 1..=RAWG_MAX_PAGES {
    let data = match rawg_request(client, config, year, page) {
      Ok(data) => data,
      Err(err) => {
        warn!("RAWG page {page} failed, keeping {} games: {err}", out.len());
        break;
      }
    };
    out.extend(data.results.iter().filter_map(map_rawg_node));
    info!("RAWG page {page}: {} records", data.results.len());
    if data.next.is_none() {
      break;
    }
  }
  out
}

// ── Curation ───────────────────────────────────────────────────────────

pub fn title_key(title: &str) -> String {
  title.trim().to_lowercase()
}

/// First occurrence of a title wins; later duplicates only fill its gaps.
pub fn merge_sources(sources: Vec<Vec<Game>>) -> Vec<Game> {
  let mut out: Vec<Game> = Vec::new();
  let mut index: HashMap<String, usize> = HashMap::new();
  for game in sources.into_iter().flatten() {
    let key = title_key(&game.title);
    match index.get(&key).copied() {
      Some(pos) => {
        let existing = &mut out[pos];
        if existing.image.is_none() {
          existing.image = game.image;
        }
        if existing.platforms.is_empty() {
          existing.platforms = game.platforms;
        }
        if existing.genres.is_empty() {
          existing.genres = game.genres;
        }
        if existing.release_date.is_empty() {
          existing.release_date = game.release_date;
        }
        if existing.screenshots.is_empty() {
          existing.screenshots = game.screenshots;
        }
        existing.hype = existing.hype.max(game.hype);
      }
      None => {
        index.insert(key, out.len());
        out.push(game);
      }
    }
  }
  out
}

pub fn flagship_override() -> Game {
  Game {
    id: "manual-gta-vi".to_string(),
    title: FLAGSHIP_TITLE.to_string(),
    slug: "grand-theft-auto-vi".to_string(),
    release_date: "2026-11-19".to_string(),
    platforms: vec!["PlayStation 5".to_string(), "Xbox Series X|S".to_string()],
    genres: vec!["Action".to_string(), "Adventure".to_string()],
    hype: 100,
    image: Some(igdb_image_url("t_cover_big", "co9rwo")),
    summary: Some(
      "Rockstar Games returns to the state of Leonida, home to the neon-soaked streets of Vice City and beyond."
        .to_string(),
    ),
    screenshots: Vec::new(),
    videos: vec!["https://www.youtube.com/watch?v=QdBZY2fkU-0".to_string()],
    similar_games: Vec::new(),
    source: Some("manual".to_string()),
  }
}

/// Replaces the record with the same title, or adds it.
pub fn apply_override(games: &mut Vec<Game>, curated: Game) {
  let key = title_key(&curated.title);
  match games.iter().position(|game| title_key(&game.title) == key) {
    Some(pos) => games[pos] = curated,
    None => games.push(curated),
  }
}

pub fn apply_hype_boosts(games: &mut [Game], boosts: &[(&str, u8)]) {
  for game in games.iter_mut() {
    let title = game.title.to_lowercase();
    for (needle, hype) in boosts {
      if title.contains(&needle.to_lowercase()) && game.hype < *hype {
        game.hype = *hype;
      }
    }
  }
}

fn ensure_unique_slugs(games: &mut [Game]) {
  let mut seen = HashSet::new();
  for game in games.iter_mut() {
    if seen.insert(game.slug.clone()) {
      continue;
    }
    let mut counter = 2;
    loop {
      let candidate = format!("{}-{}", game.slug, counter);
      if seen.insert(candidate.clone()) {
        game.slug = candidate;
        break;
      }
      counter += 1;
    }
  }
}

pub fn finalize_catalog(mut games: Vec<Game>) -> Vec<Game> {
  for game in games.iter_mut() {
    game.hype = game.hype.min(100);
  }
  games.sort_by(crate::bracket::compare_by_hype);
  games.truncate(CATALOG_LIMIT);
  ensure_unique_slugs(&mut games);
  games
}

pub fn curate(igdb: Vec<Game>, rawg: Vec<Game>) -> Vec<Game> {
  let mut merged = merge_sources(vec![igdb, rawg]);
  apply_override(&mut merged, flagship_override());
  apply_hype_boosts(&mut merged, HYPE_BOOSTS);
  finalize_catalog(merged)
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run_ingest(config: &AppConfig, year: i32, out_dir: &Path) -> Result<IngestReport, String> {
  let client = http_client()?;
  info!("Ingesting {year} releases into {}", out_dir.display());

  let igdb = if igdb_credentials(config).is_ok() {
    fetch_igdb_games(&client, config, year)
  } else {
    warn!("Skipping IGDB: no credentials");
    Vec::new()
  };
  let rawg = if config.rawg_key.trim().is_empty() {
    warn!("Skipping RAWG: no API key");
    Vec::new()
  } else {
    fetch_rawg_games(&client, config, year)
  };
  let (igdb_count, rawg_count) = (igdb.len(), rawg.len());

  let games = curate(igdb, rawg);
  let meta = build_meta(&games, year, Utc::now());

  let catalog_path = out_dir.join(CATALOG_FILE);
  let meta_path = out_dir.join(META_FILE);
  write_json(&catalog_path, &games)?;
  write_json(&meta_path, &meta)?;
  info!(
    "Wrote {} games ({igdb_count} from IGDB, {rawg_count} from RAWG) to {}",
    games.len(),
    catalog_path.display()
  );

  Ok(IngestReport {
    igdb_count,
    rawg_count,
    written: games.len(),
    catalog_path,
    meta_path,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn game(id: &str, title: &str, hype: u8) -> Game {
    Game {
      id: id.to_string(),
      title: title.to_string(),
      slug: slugify(title),
      release_date: String::new(),
      platforms: Vec::new(),
      genres: Vec::new(),
      hype,
      image: None,
      summary: None,
      screenshots: Vec::new(),
      videos: Vec::new(),
      similar_games: Vec::new(),
      source: None,
    }
  }

  #[test]
  fn igdb_query_targets_the_year_window() {
    let query = igdb_games_query(2026, 100);
    assert!(query.contains("first_release_date >= 1767225600"));
    assert!(query.contains("first_release_date < 1798761600"));
    assert!(query.contains("limit 50;"));
    assert!(query.contains("offset 100;"));
  }

  #[test]
  fn search_query_escapes_quotes() {
    assert_eq!(
      igdb_search_query("The \"Game\""),
      "search \"The \\\"Game\\\"\";\nfields name,cover.image_id;\nlimit 5;"
    );
  }

  #[test]
  fn maps_igdb_node() {
    let node: IgdbGameNode = serde_json::from_str(
      r#"{
        "id": 42,
        "name": " Star Voyager ",
        "first_release_date": 1773446400,
        "platforms": [{"name": "PC (Microsoft Windows)"}, {"name": "PlayStation 5"}],
        "genres": [{"name": "Role-playing (RPG)"}],
        "cover": {"image_id": "abc"},
        "videos": [{"video_id": "yt1"}],
        "similar_games": [{"slug": "dune-racer"}],
        "hypes": 20,
        "follows": 150
      }"#,
    )
    .unwrap();
    let game = map_igdb_node(&node).unwrap();
    assert_eq!(game.id, "igdb-42");
    assert_eq!(game.title, "Star Voyager");
    assert_eq!(game.slug, "star-voyager");
    assert_eq!(game.release_date, "2026-03-14");
    assert_eq!(game.platforms, vec!["PC (Microsoft Windows)", "PlayStation 5"]);
    assert_eq!(game.hype, 95);
    assert_eq!(
      game.image.as_deref(),
      Some("https://images.igdb.com/igdb/image/upload/t_cover_big/abc.jpg")
    );
    assert_eq!(game.videos, vec!["https://www.youtube.com/watch?v=yt1"]);
    assert_eq!(game.similar_games, vec!["dune-racer"]);
  }

  #[test]
  fn nameless_records_are_dropped() {
    let node = IgdbGameNode { id: Some(1), ..IgdbGameNode::default() };
    assert!(map_igdb_node(&node).is_none());
    let rawg = RawgGameNode { id: Some(1), name: Some("  ".into()), ..RawgGameNode::default() };
    assert!(map_rawg_node(&rawg).is_none());
  }

  #[test]
  fn maps_rawg_node() {
    let page: RawgPage = serde_json::from_str(
      r#"{
        "next": null,
        "results": [{
          "id": 7,
          "name": "Dune Racer",
          "slug": "dune-racer",
          "released": "2026-01-20",
          "background_image": "https://media.rawg.io/dune.jpg",
          "platforms": [{"platform": {"name": "PC"}}, {"platform": null}],
          "genres": [{"name": "Racing"}],
          "short_screenshots": [{"image": "https://media.rawg.io/s1.jpg"}],
          "added": 900
        }]
      }"#,
    )
    .unwrap();
    let game = map_rawg_node(&page.results[0]).unwrap();
    assert_eq!(game.id, "rawg-7");
    assert_eq!(game.platforms, vec!["PC"]);
    assert_eq!(game.hype, 75);
    assert_eq!(game.screenshots.len(), 1);
    assert_eq!(game.source.as_deref(), Some("rawg"));
  }

  #[test]
  fn merge_dedupes_by_lowercase_title_and_fills_gaps() {
    let mut igdb = game("igdb-1", "Star Voyager", 60);
    igdb.platforms = vec!["PC".to_string()];
    let mut rawg = game("rawg-9", "star voyager ", 80);
    rawg.image = Some("https://img/1.jpg".to_string());
    rawg.platforms = vec!["Xbox".to_string()];
    rawg.release_date = "2026-05-01".to_string();

    let merged = merge_sources(vec![vec![igdb], vec![rawg, game("rawg-2", "Other", 10)]]);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].id, "igdb-1");
    assert_eq!(merged[0].platforms, vec!["PC"]);
    assert_eq!(merged[0].image.as_deref(), Some("https://img/1.jpg"));
    assert_eq!(merged[0].release_date, "2026-05-01");
    assert_eq!(merged[0].hype, 80);
  }

  #[test]
  fn override_replaces_matching_title() {
    let mut games = vec![game("igdb-5", "grand theft auto vi", 70), game("igdb-6", "Other", 50)];
    apply_override(&mut games, flagship_override());
    assert_eq!(games.len(), 2);
    assert_eq!(games[0].id, "manual-gta-vi");

    let mut without = vec![game("igdb-6", "Other", 50)];
    apply_override(&mut without, flagship_override());
    assert_eq!(without.len(), 2);
  }

  #[test]
  fn hype_boosts_only_raise() {
    let mut games = vec![
      game("a", "Resident Evil Requiem", 40),
      game("b", "Marvel's Wolverine", 99),
      game("c", "Unrelated", 10),
    ];
    apply_hype_boosts(&mut games, HYPE_BOOSTS);
    assert_eq!(games[0].hype, 95);
    assert_eq!(games[1].hype, 99);
    assert_eq!(games[2].hype, 10);
  }

  #[test]
  fn finalize_sorts_truncates_and_dedupes_slugs() {
    let mut games: Vec<Game> = (0..300).map(|i| game(&format!("g{i}"), &format!("Game {i}"), (i % 100) as u8)).collect();
    games[0].slug = "dup".to_string();
    games[1].slug = "dup".to_string();
    games[0].hype = 100;
    games[1].hype = 100;
    let out = finalize_catalog(games);
    assert_eq!(out.len(), CATALOG_LIMIT);
    assert!(out.windows(2).all(|w| w[0].hype >= w[1].hype));
    let slugs: HashSet<&str> = out.iter().map(|g| g.slug.as_str()).collect();
    assert_eq!(slugs.len(), out.len());
    assert!(slugs.contains("dup") && slugs.contains("dup-2"));
  }

  #[test]
  fn curate_always_includes_flagship() {
    let out = curate(Vec::new(), vec![game("rawg-1", "Fable", 20)]);
    assert_eq!(out[0].title, FLAGSHIP_TITLE);
    assert_eq!(out[1].hype, 88);
  }
}
