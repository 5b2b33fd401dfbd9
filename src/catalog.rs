use crate::bracket::compare_by_hype;
use crate::types::*;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fs,
    path::Path,
};

impl Game {
    pub fn release_day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.release_date.trim(), "%Y-%m-%d").ok()
    }

    pub fn release_label(&self) -> String {
        match self.release_day() {
            Some(day) => day.format("%b %-d, %Y").to_string(),
            None => "TBA".to_string(),
        }
    }

    pub fn platform_label(&self) -> String {
        if self.platforms.is_empty() {
            "TBA".to_string()
        } else {
            self.platforms.join(", ")
        }
    }

    pub fn genre_label(&self) -> String {
        if self.genres.is_empty() {
            "TBA".to_string()
        } else {
            self.genres.join(", ")
        }
    }

    /// Days from `today` to release; negative once released, `None` when TBA.
    pub fn days_until(&self, today: NaiveDate) -> Option<i64> {
        self.release_day().map(|day| (day - today).num_days())
    }
}

// ── Loading ────────────────────────────────────────────────────────────

pub fn load_catalog(path: &Path) -> Result<Vec<Game>, String> {
    let data = fs::read_to_string(path).map_err(|e| format!("read catalog {}: {e}", path.display()))?;
    serde_json::from_str::<Vec<Game>>(&data).map_err(|e| format!("parse catalog {}: {e}", path.display()))
}

pub fn load_meta(path: &Path) -> Result<CatalogMeta, String> {
    let data = fs::read_to_string(path).map_err(|e| format!("read catalog meta {}: {e}", path.display()))?;
    serde_json::from_str::<CatalogMeta>(&data)
        .map_err(|e| format!("parse catalog meta {}: {e}", path.display()))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
    }
    let payload = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    fs::write(path, payload).map_err(|e| format!("write {}: {e}", path.display()))
}

// ── Lookups ────────────────────────────────────────────────────────────

pub fn find_by_slug<'a>(games: &'a [Game], slug: &str) -> Option<&'a Game> {
    games.iter().find(|game| game.slug == slug)
}

pub fn find_by_id<'a>(games: &'a [Game], id: &str) -> Option<&'a Game> {
    games.iter().find(|game| game.id == id)
}

/// Accepts either an id or a slug.
pub fn find_game<'a>(games: &'a [Game], key: &str) -> Option<&'a Game> {
    let key = key.trim();
    find_by_id(games, key).or_else(|| find_by_slug(games, key))
}

pub fn similar_games<'a>(games: &'a [Game], game: &Game) -> Vec<&'a Game> {
    game.similar_games
        .iter()
        .filter_map(|slug| find_by_slug(games, slug))
        .collect()
}

// ── Filtering ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Hype,
    ReleaseDate,
    Title,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameFilter {
    pub genre: Option<String>,
    pub platform: Option<String>,
    pub month: Option<u32>,
    pub q: Option<String>,
    pub sort: SortKey,
    pub watchlisted: bool,
}

fn has_label(labels: &[String], wanted: &str) -> bool {
    labels.iter().any(|label| label.eq_ignore_ascii_case(wanted.trim()))
}

/// `watchlist` is consulted only when `filter.watchlisted` is set.
pub fn filter_games<'a>(games: &'a [Game], filter: &GameFilter, watchlist: &HashSet<String>) -> Vec<&'a Game> {
    let query = filter
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    let mut out: Vec<&Game> = games
        .iter()
        .filter(|game| match filter.genre.as_deref() {
            Some(genre) if !genre.trim().is_empty() => has_label(&game.genres, genre),
            _ => true,
        })
        .filter(|game| match filter.platform.as_deref() {
            Some(platform) if !platform.trim().is_empty() => has_label(&game.platforms, platform),
            _ => true,
        })
        .filter(|game| match filter.month {
            Some(month) => game.release_day().map(|day| day.month()) == Some(month),
            None => true,
        })
        .filter(|game| match query.as_deref() {
            Some(q) => game.title.to_lowercase().contains(q),
            None => true,
        })
        .filter(|game| !filter.watchlisted || watchlist.contains(&game.id))
        .collect();

    sort_games(&mut out, filter.sort);
    out
}

pub fn sort_games(games: &mut [&Game], key: SortKey) {
    match key {
        SortKey::Hype => games.sort_by(|a, b| compare_by_hype(a, b)),
        SortKey::ReleaseDate => games.sort_by(|a, b| match (a.release_day(), b.release_day()) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| compare_by_hype(a, b)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => compare_by_hype(a, b),
        }),
        SortKey::Title => games.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase())),
    }
}

// ── Aggregation ────────────────────────────────────────────────────────

pub fn month_key(day: NaiveDate) -> String {
    day.format("%Y-%m").to_string()
}

pub fn build_meta(games: &[Game], year: i32, now: DateTime<Utc>) -> CatalogMeta {
    let mut genres = BTreeSet::new();
    let mut platforms = BTreeSet::new();
    let mut month_counts = BTreeMap::new();
    for game in games {
        genres.extend(game.genres.iter().cloned());
        platforms.extend(game.platforms.iter().cloned());
        if let Some(day) = game.release_day() {
            *month_counts.entry(month_key(day)).or_insert(0) += 1;
        }
    }
    CatalogMeta {
        year,
        total_games: games.len(),
        genres: genres.into_iter().collect(),
        platforms: platforms.into_iter().collect(),
        month_counts,
        generated_at: now.to_rfc3339(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthGroup<'a> {
    /// `YYYY-MM`, or `TBA`.
    pub month: String,
    pub label: String,
    pub games: Vec<&'a Game>,
}

/// Release calendar: months in order, each sorted by day then hype, TBA last.
pub fn group_by_month(games: &[Game]) -> Vec<MonthGroup<'_>> {
    let mut dated: BTreeMap<String, (String, Vec<&Game>)> = BTreeMap::new();
    let mut tba = Vec::new();
    for game in games {
        match game.release_day() {
            Some(day) => dated
                .entry(month_key(day))
                .or_insert_with(|| (day.format("%B %Y").to_string(), Vec::new()))
                .1
                .push(game),
            None => tba.push(game),
        }
    }
    let mut out: Vec<MonthGroup> = dated
        .into_iter()
        .map(|(month, (label, mut games))| {
            sort_games(&mut games, SortKey::ReleaseDate);
            MonthGroup { month, label, games }
        })
        .collect();
    if !tba.is_empty() {
        sort_games(&mut tba, SortKey::Hype);
        out.push(MonthGroup {
            month: "TBA".to_string(),
            label: "TBA".to_string(),
            games: tba,
        });
    }
    out
}

// ── Comparison ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison<'a> {
    pub games: Vec<&'a Game>,
    pub shared_platforms: Vec<String>,
    pub shared_genres: Vec<String>,
    pub most_hyped: Option<String>,
    pub earliest_release: Option<String>,
}

fn shared_labels(games: &[&Game], pick: impl Fn(&Game) -> &[String]) -> Vec<String> {
    let Some((first, rest)) = games.split_first() else {
        return Vec::new();
    };
    pick(first)
        .iter()
        .filter(|label| rest.iter().all(|game| has_label(pick(game), label)))
        .cloned()
        .collect()
}

pub fn compare_games<'a>(games: &'a [Game], keys: &[String]) -> Result<Comparison<'a>, String> {
    let mut picked: Vec<&Game> = Vec::new();
    for key in keys.iter().map(|key| key.trim()).filter(|key| !key.is_empty()) {
        let game = find_game(games, key).ok_or_else(|| format!("Game not found: {key}"))?;
        if !picked.iter().any(|existing| existing.id == game.id) {
            picked.push(game);
        }
    }
    if picked.len() < COMPARE_MIN || picked.len() > COMPARE_MAX {
        return Err(format!(
            "Compare needs between {COMPARE_MIN} and {COMPARE_MAX} distinct games (got {}).",
            picked.len()
        ));
    }

    let most_hyped = picked
        .iter()
        .copied()
        .min_by(|a, b| compare_by_hype(a, b))
        .map(|game| game.id.clone());
    let earliest_release = picked
        .iter()
        .filter_map(|game| game.release_day().map(|day| (day, game)))
        .min_by_key(|(day, _)| *day)
        .map(|(_, game)| game.id.clone());

    Ok(Comparison {
        shared_platforms: shared_labels(&picked, |game| game.platforms.as_slice()),
        shared_genres: shared_labels(&picked, |game| game.genres.as_slice()),
        most_hyped,
        earliest_release,
        games: picked,
    })
}

pub fn slugify(input: &str) -> String {
    let mut slug = String::new();

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || matches!(ch, '-' | '_' | '/' | ':' | '.') {
            if !slug.ends_with('-') {
                slug.push('-');
            }
        }
    }

    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn game(id: &str, title: &str, date: &str, hype: u8, platforms: &[&str], genres: &[&str]) -> Game {
        Game {
            id: id.to_string(),
            title: title.to_string(),
            slug: slugify(title),
            release_date: date.to_string(),
            platforms: platforms.iter().map(|s| s.to_string()).collect(),
            genres: genres.iter().map(|s| s.to_string()).collect(),
            hype,
            image: None,
            summary: None,
            screenshots: Vec::new(),
            videos: Vec::new(),
            similar_games: Vec::new(),
            source: None,
        }
    }

    fn catalog() -> Vec<Game> {
        vec![
            game("1", "Star Voyager", "2026-03-14", 90, &["PC", "PS5"], &["RPG", "Adventure"]),
            game("2", "Dune Racer", "2026-01-20", 70, &["PC", "Xbox Series X|S"], &["Racing"]),
            game("3", "Hollow Star", "", 95, &["Switch 2"], &["Adventure"]),
            game("4", "Metro Tactics", "2026-03-02", 60, &["PC", "PS5"], &["Strategy", "RPG"]),
        ]
    }

    #[test]
    fn catalog_record_defaults_missing_fields() {
        let parsed: Vec<Game> =
            serde_json::from_str(r#"[{"id":"9","title":"Bare","slug":"bare"}]"#).unwrap();
        assert_eq!(parsed[0].hype, 0);
        assert!(parsed[0].platforms.is_empty());
        assert_eq!(parsed[0].platform_label(), "TBA");
        assert_eq!(parsed[0].release_label(), "TBA");
    }

    #[test]
    fn release_label_and_countdown() {
        let games = catalog();
        assert_eq!(games[0].release_label(), "Mar 14, 2026");
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert_eq!(games[0].days_until(today), Some(4));
        assert_eq!(games[1].days_until(today), Some(-49));
        assert_eq!(games[2].days_until(today), None);
    }

    #[test]
    fn filter_by_genre_platform_month_and_query() {
        let games = catalog();
        let none = HashSet::new();

        let rpg = GameFilter { genre: Some("rpg".into()), ..GameFilter::default() };
        let ids: Vec<&str> = filter_games(&games, &rpg, &none).iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4"]);

        let march = GameFilter { month: Some(3), sort: SortKey::ReleaseDate, ..GameFilter::default() };
        let ids: Vec<&str> = filter_games(&games, &march, &none).iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "1"]);

        let search = GameFilter { q: Some(" STAR ".into()), platform: Some("switch 2".into()), ..GameFilter::default() };
        let ids: Vec<&str> = filter_games(&games, &search, &none).iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["3"]);
    }

    #[test]
    fn watchlisted_filter_uses_supplied_ids() {
        let games = catalog();
        let watched: HashSet<String> = ["2".to_string()].into_iter().collect();
        let filter = GameFilter { watchlisted: true, ..GameFilter::default() };
        let ids: Vec<&str> = filter_games(&games, &filter, &watched).iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[test]
    fn release_date_sort_puts_tba_last() {
        let games = catalog();
        let filter = GameFilter { sort: SortKey::ReleaseDate, ..GameFilter::default() };
        let ids: Vec<&str> = filter_games(&games, &filter, &HashSet::new()).iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "4", "1", "3"]);
    }

    #[test]
    fn meta_counts_months_and_distinct_labels() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let meta = build_meta(&catalog(), 2026, now);
        assert_eq!(meta.total_games, 4);
        assert_eq!(meta.genres, vec!["Adventure", "RPG", "Racing", "Strategy"]);
        assert_eq!(meta.month_counts.get("2026-03"), Some(&2));
        assert_eq!(meta.month_counts.get("2026-01"), Some(&1));
        assert_eq!(meta.month_counts.len(), 2);
    }

    #[test]
    fn group_by_month_orders_months_then_tba() {
        let games = catalog();
        let groups = group_by_month(&games);
        let months: Vec<&str> = groups.iter().map(|g| g.month.as_str()).collect();
        assert_eq!(months, vec!["2026-01", "2026-03", "TBA"]);
        assert_eq!(groups[1].label, "March 2026");
        assert_eq!(groups[1].games[0].id, "4");
    }

    #[test]
    fn compare_reports_shared_labels() {
        let games = catalog();
        let keys = vec!["1".to_string(), "metro-tactics".to_string()];
        let comparison = compare_games(&games, &keys).unwrap();
        assert_eq!(comparison.shared_platforms, vec!["PC", "PS5"]);
        assert_eq!(comparison.shared_genres, vec!["RPG"]);
        assert_eq!(comparison.most_hyped.as_deref(), Some("1"));
        assert_eq!(comparison.earliest_release.as_deref(), Some("4"));
    }

    #[test]
    fn compare_rejects_bad_input() {
        let games = catalog();
        assert!(compare_games(&games, &["1".to_string()]).is_err());
        assert!(compare_games(&games, &["1".to_string(), "1".to_string()]).is_err());
        assert!(compare_games(&games, &["1".to_string(), "nope".to_string()]).is_err());
    }

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Xbox Series X|S"), "xbox-series-xs");
        assert_eq!(slugify("  Role-playing (RPG) "), "role-playing-rpg");
        assert_eq!(slugify("PlayStation 5"), "playstation-5");
    }
}
