use crate::bracket::VoteChange;
use crate::calendar::{google_calendar_link, ics_for_games};
use crate::catalog::{
    compare_games, filter_games, find_by_slug, find_game, group_by_month, similar_games, GameFilter,
};
use crate::config::{site_base_url, site_dir};
use crate::lists::{HypeTally, Tier, UserState, VoteDirection};
use crate::seo::{
    catalog_structured_data, game_structured_data, page_meta_for_game, page_meta_for_route, PageMeta, SiteInfo,
};
use crate::sitemap::build_sitemap;
use crate::types::*;

use axum::{
    extract::{Path as AxumPath, Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, get_service, post, put},
    Json, Router,
};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::MutexGuard;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

// ── Response helpers ───────────────────────────────────────────────────

fn state_json<T: Serialize>(status: StatusCode, value: &T) -> Response {
    let body = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    (
        status,
        [
            ("Content-Type", "application/json"),
            ("Cache-Control", "no-store"),
            ("Pragma", "no-cache"),
            ("Expires", "0"),
        ],
        body,
    )
        .into_response()
}

fn catalog_json<T: Serialize>(value: &T) -> Response {
    let body = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    ([("Content-Type", "application/json")], body).into_response()
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    state_json(status, &ErrorPayload { error: message.into() })
}

fn not_found(key: &str) -> Response {
    error_json(StatusCode::NOT_FOUND, format!("Game not found: {key}"))
}

fn lock_user_state(state: &ServerState) -> MutexGuard<'_, UserState> {
    state.user_state.lock().unwrap_or_else(|e| e.into_inner())
}

fn site_info(config: &AppConfig) -> SiteInfo {
    SiteInfo {
        name: config.site_name.clone(),
        base_url: site_base_url(config),
        year: config.target_year,
    }
}

/// Resolves an id or slug from the path to the catalog id.
fn catalog_id(state: &ServerState, key: &str) -> Option<String> {
    find_game(&state.catalog, key).map(|game| game.id.clone())
}

// ── Router ─────────────────────────────────────────────────────────────

pub fn router(state: ServerState) -> Router {
    let static_files = get_service(ServeDir::new(site_dir(&state.config)));

    Router::new()
        .route("/api/games", get(list_games))
        .route("/api/games/:slug", get(game_detail))
        .route("/api/games/:slug/calendar.ics", get(game_calendar))
        .route("/api/calendar", get(release_calendar))
        .route("/api/calendar.ics", get(catalog_calendar))
        .route("/api/page-meta", get(route_meta))
        .route("/api/meta", get(catalog_meta))
        .route("/api/compare", get(compare))
        .route("/api/watchlist", get(get_watchlist))
        .route("/api/watchlist/:id", post(toggle_watchlist))
        .route("/api/top-five", get(get_top_five).post(add_top_five))
        .route("/api/top-five/move", post(move_top_five))
        .route("/api/top-five/:id", delete(remove_top_five))
        .route("/api/tier-list", get(get_tier_list).delete(clear_tier_list))
        .route("/api/tier-list/:id", put(place_tier).delete(remove_tier))
        .route("/api/hype/:id", get(get_hype).post(cast_hype))
        .route("/api/bracket", get(get_bracket))
        .route("/api/bracket/vote", post(vote_bracket))
        .route("/api/bracket/reset", post(reset_bracket))
        .route("/sitemap.xml", get(sitemap_xml))
        .fallback_service(static_files)
        .with_state(state)
}

pub async fn start_server(state: ServerState, addr: String) -> Result<(), String> {
    let app = router(state);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Preview server failed to bind {addr}: {e}");
            return Err(format!("bind {addr}: {e}"));
        }
    };
    info!("Preview server listening at http://{addr}/");
    axum::serve(listener, app).await.map_err(|e| {
        error!("Preview server error: {e}");
        format!("serve {addr}: {e}")
    })
}

// ── Catalog ────────────────────────────────────────────────────────────

async fn list_games(AxumState(state): AxumState<ServerState>, Query(filter): Query<GameFilter>) -> Response {
    let watched = lock_user_state(&state).watchlist().id_set();
    let games = filter_games(&state.catalog, &filter, &watched);
    if filter.watchlisted {
        // Depends on user state, so it must not be cached.
        state_json(StatusCode::OK, &games)
    } else {
        catalog_json(&games)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GameDetail<'a> {
    game: &'a Game,
    meta: PageMeta,
    structured_data: Value,
    calendar_link: Option<String>,
    days_until: Option<i64>,
    similar: Vec<&'a Game>,
    watched: bool,
    hype_votes: HypeTally,
}

async fn game_detail(AxumState(state): AxumState<ServerState>, AxumPath(slug): AxumPath<String>) -> Response {
    let Some(game) = find_by_slug(&state.catalog, &slug) else {
        return not_found(&slug);
    };
    let site = site_info(&state.config);
    let (watched, hype_votes) = {
        let guard = lock_user_state(&state);
        (guard.watchlist().contains(&game.id), guard.hype_votes().tally(&game.id))
    };
    let detail = GameDetail {
        game,
        meta: page_meta_for_game(game, &site),
        structured_data: game_structured_data(game, &site),
        calendar_link: google_calendar_link(game),
        days_until: game.days_until(Local::now().date_naive()),
        similar: similar_games(&state.catalog, game),
        watched,
        hype_votes,
    };
    state_json(StatusCode::OK, &detail)
}

fn ics_response(filename: &str, body: String) -> Response {
    let disposition = format!("attachment; filename=\"{filename}\"");
    (
        [
            ("Content-Type", "text/calendar; charset=utf-8".to_string()),
            ("Content-Disposition", disposition),
        ],
        body,
    )
        .into_response()
}

async fn game_calendar(AxumState(state): AxumState<ServerState>, AxumPath(slug): AxumPath<String>) -> Response {
    let Some(game) = find_by_slug(&state.catalog, &slug) else {
        return not_found(&slug);
    };
    if game.release_day().is_none() {
        return error_json(StatusCode::NOT_FOUND, format!("{} has no release date yet.", game.title));
    }
    ics_response(&format!("{}.ics", game.slug), ics_for_games(&[game], Utc::now()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CalendarQuery {
    watchlisted: bool,
}

async fn catalog_calendar(AxumState(state): AxumState<ServerState>, Query(query): Query<CalendarQuery>) -> Response {
    let games: Vec<&Game> = if query.watchlisted {
        let watched = lock_user_state(&state).watchlist().id_set();
        state.catalog.iter().filter(|game| watched.contains(&game.id)).collect()
    } else {
        state.catalog.iter().collect()
    };
    let filename = if query.watchlisted { "watchlist.ics" } else { "releases.ics" };
    ics_response(filename, ics_for_games(&games, Utc::now()))
}

async fn catalog_meta(AxumState(state): AxumState<ServerState>) -> Response {
    catalog_json(state.meta.as_ref())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompareQuery {
    ids: String,
}

async fn compare(AxumState(state): AxumState<ServerState>, Query(query): Query<CompareQuery>) -> Response {
    let keys: Vec<String> = query.ids.split(',').map(|key| key.trim().to_string()).collect();
    match compare_games(&state.catalog, &keys) {
        Ok(comparison) => catalog_json(&comparison),
        Err(e) => error_json(StatusCode::BAD_REQUEST, e),
    }
}

async fn release_calendar(AxumState(state): AxumState<ServerState>) -> Response {
    catalog_json(&group_by_month(&state.catalog))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RouteQuery {
    route: String,
}

impl Default for RouteQuery {
    fn default() -> Self {
        RouteQuery { route: "/".to_string() }
    }
}

/// Head tags for a static page. The home page also lists the catalog as JSON-LD.
async fn route_meta(AxumState(state): AxumState<ServerState>, Query(query): Query<RouteQuery>) -> Response {
    let site = site_info(&state.config);
    let meta = page_meta_for_route(&query.route, &site);
    let structured_data = if query.route.trim_end_matches('/').is_empty() {
        let games: Vec<&Game> = state.catalog.iter().collect();
        Some(catalog_structured_data(&games, &site))
    } else {
        None
    };
    catalog_json(&json!({ "meta": meta, "structuredData": structured_data }))
}

async fn sitemap_xml(AxumState(state): AxumState<ServerState>) -> Response {
    let xml = build_sitemap(&state.catalog, &site_base_url(&state.config), Local::now().date_naive());
    ([("Content-Type", "application/xml; charset=utf-8")], xml).into_response()
}

// ── Watchlist / top five / tier list ───────────────────────────────────

async fn get_watchlist(AxumState(state): AxumState<ServerState>) -> Response {
    let guard = lock_user_state(&state);
    state_json(StatusCode::OK, guard.watchlist())
}

async fn toggle_watchlist(AxumState(state): AxumState<ServerState>, AxumPath(key): AxumPath<String>) -> Response {
    let Some(id) = catalog_id(&state, &key) else {
        return not_found(&key);
    };
    let mut guard = lock_user_state(&state);
    match guard.toggle_watch(&id) {
        Ok(watched) => state_json(StatusCode::OK, &json!({ "id": id, "watched": watched })),
        Err(e) => {
            warn!("Watchlist toggle for {id} failed: {e}");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameIdBody {
    game_id: String,
}

async fn get_top_five(AxumState(state): AxumState<ServerState>) -> Response {
    let guard = lock_user_state(&state);
    state_json(StatusCode::OK, guard.top_five())
}

async fn add_top_five(AxumState(state): AxumState<ServerState>, Json(body): Json<GameIdBody>) -> Response {
    let Some(id) = catalog_id(&state, &body.game_id) else {
        return not_found(&body.game_id);
    };
    let mut guard = lock_user_state(&state);
    match guard.add_top_five(&id) {
        Ok(()) => state_json(StatusCode::OK, guard.top_five()),
        Err(e) => error_json(StatusCode::BAD_REQUEST, e),
    }
}

#[derive(Debug, Deserialize)]
struct MoveBody {
    from: usize,
    to: usize,
}

async fn move_top_five(AxumState(state): AxumState<ServerState>, Json(body): Json<MoveBody>) -> Response {
    let mut guard = lock_user_state(&state);
    match guard.move_top_five(body.from, body.to) {
        Ok(()) => state_json(StatusCode::OK, guard.top_five()),
        Err(e) => error_json(StatusCode::BAD_REQUEST, e),
    }
}

async fn remove_top_five(AxumState(state): AxumState<ServerState>, AxumPath(key): AxumPath<String>) -> Response {
    let id = catalog_id(&state, &key).unwrap_or(key);
    let mut guard = lock_user_state(&state);
    match guard.remove_top_five(&id) {
        Ok(_) => state_json(StatusCode::OK, guard.top_five()),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn get_tier_list(AxumState(state): AxumState<ServerState>) -> Response {
    let guard = lock_user_state(&state);
    let unranked: Vec<&str> = guard
        .tier_list()
        .unranked(&state.catalog)
        .into_iter()
        .map(|game| game.id.as_str())
        .collect();
    state_json(StatusCode::OK, &json!({ "tiers": guard.tier_list(), "unranked": unranked }))
}

#[derive(Debug, Deserialize)]
struct PlaceBody {
    tier: String,
    #[serde(default)]
    index: Option<usize>,
}

async fn place_tier(
    AxumState(state): AxumState<ServerState>,
    AxumPath(key): AxumPath<String>,
    Json(body): Json<PlaceBody>,
) -> Response {
    let Some(id) = catalog_id(&state, &key) else {
        return not_found(&key);
    };
    let Some(tier) = Tier::parse(&body.tier) else {
        return error_json(StatusCode::BAD_REQUEST, format!("Unknown tier: {}", body.tier));
    };
    let mut guard = lock_user_state(&state);
    match guard.place_tier(&id, tier, body.index.unwrap_or(usize::MAX)) {
        Ok(index) => state_json(StatusCode::OK, &json!({ "id": id, "tier": tier, "index": index })),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn remove_tier(AxumState(state): AxumState<ServerState>, AxumPath(key): AxumPath<String>) -> Response {
    // Ids no longer in the catalog stay removable.
    let id = catalog_id(&state, &key).unwrap_or(key);
    let mut guard = lock_user_state(&state);
    match guard.remove_tier(&id) {
        Ok(removed) => state_json(StatusCode::OK, &json!({ "id": id, "removed": removed })),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn clear_tier_list(AxumState(state): AxumState<ServerState>) -> Response {
    let mut guard = lock_user_state(&state);
    match guard.clear_tiers() {
        Ok(()) => state_json(StatusCode::OK, guard.tier_list()),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

// ── Hype votes ─────────────────────────────────────────────────────────

async fn get_hype(AxumState(state): AxumState<ServerState>, AxumPath(key): AxumPath<String>) -> Response {
    let Some(id) = catalog_id(&state, &key) else {
        return not_found(&key);
    };
    let tally = lock_user_state(&state).hype_votes().tally(&id);
    state_json(StatusCode::OK, &tally)
}

#[derive(Debug, Deserialize)]
struct HypeBody {
    direction: VoteDirection,
}

async fn cast_hype(
    AxumState(state): AxumState<ServerState>,
    AxumPath(key): AxumPath<String>,
    Json(body): Json<HypeBody>,
) -> Response {
    let Some(id) = catalog_id(&state, &key) else {
        return not_found(&key);
    };
    let mut guard = lock_user_state(&state);
    match guard.cast_hype(&id, body.direction) {
        Ok(tally) => state_json(StatusCode::OK, &tally),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

// ── Bracket ────────────────────────────────────────────────────────────

async fn get_bracket(AxumState(state): AxumState<ServerState>) -> Response {
    let guard = lock_user_state(&state);
    match guard.bracket(&state.catalog, state.config.bracket_size) {
        Ok(bracket) => state_json(StatusCode::OK, &bracket.snapshot()),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BracketVoteBody {
    round: usize,
    #[serde(rename = "match")]
    match_index: usize,
    game_id: String,
}

async fn vote_bracket(AxumState(state): AxumState<ServerState>, Json(body): Json<BracketVoteBody>) -> Response {
    let mut guard = lock_user_state(&state);
    let outcome = guard.bracket_vote(
        &state.catalog,
        state.config.bracket_size,
        body.round,
        body.match_index,
        &body.game_id,
    );
    match outcome {
        Ok((change, bracket)) => {
            if change == VoteChange::Cleared {
                info!("Bracket vote {}-{} cleared", body.round, body.match_index);
            }
            state_json(StatusCode::OK, &json!({ "change": change, "bracket": bracket.snapshot() }))
        }
        Err(e) => error_json(StatusCode::BAD_REQUEST, e),
    }
}

async fn reset_bracket(AxumState(state): AxumState<ServerState>) -> Response {
    let mut guard = lock_user_state(&state);
    if let Err(e) = guard.reset_bracket() {
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, e);
    }
    match guard.bracket(&state.catalog, state.config.bracket_size) {
        Ok(bracket) => state_json(StatusCode::OK, &bracket.snapshot()),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}
