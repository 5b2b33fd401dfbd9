pub mod types;
pub mod config;
pub mod catalog;
pub mod bracket;
pub mod storage;
pub mod lists;
pub mod ingest;
pub mod sitemap;
pub mod calendar;
pub mod seo;
pub mod server;

use types::*;
use config::*;
use catalog::{build_meta, find_by_slug, load_catalog, load_meta};
use lists::UserState;
use storage::StateStore;

use chrono::{Local, Utc};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Tracing ────────────────────────────────────────────────────────────

/// File + stderr output. Keep the guard alive for the whole process or
/// buffered file lines are lost.
pub fn init_tracing() -> WorkerGuard {
    let logs_dir = logs_dir();
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "app.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
    guard
}

// ── Command plumbing ───────────────────────────────────────────────────

pub fn load_app_config() -> Result<AppConfig, String> {
    load_env_file();
    let config = load_config()?;
    log_env_warnings(&config);
    Ok(config)
}

pub fn open_catalog(config: &AppConfig) -> Result<Vec<Game>, String> {
    let path = catalog_path(config);
    if !path.is_file() {
        return Err(format!(
            "No catalog at {}. Run `release-radar ingest` first.",
            path.display()
        ));
    }
    load_catalog(&path)
}

pub fn open_user_state(config: &AppConfig) -> Result<UserState, String> {
    let store = StateStore::open(storage_dir(config))?;
    Ok(UserState::load(store))
}

fn write_text(path: &Path, contents: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("create {}: {e}", parent.display()))?;
    }
    fs::write(path, contents).map_err(|e| format!("write {}: {e}", path.display()))
}

pub fn write_sitemap(config: &AppConfig, out: Option<PathBuf>) -> Result<PathBuf, String> {
    let games = open_catalog(config)?;
    let out = out.unwrap_or_else(|| site_dir(config).join(SITEMAP_FILE));
    let xml = sitemap::build_sitemap(&games, &site_base_url(config), Local::now().date_naive());
    write_text(&out, &xml)?;
    info!("Wrote sitemap for {} games to {}", games.len(), out.display());
    Ok(out)
}

/// ICS for one game (`slug`), the watchlist, or the whole catalog.
pub fn export_calendar(config: &AppConfig, watchlisted: bool, slug: Option<&str>) -> Result<String, String> {
    let games = open_catalog(config)?;
    let picked: Vec<&Game> = match slug {
        Some(slug) => vec![find_by_slug(&games, slug).ok_or_else(|| format!("Game not found: {slug}"))?],
        None if watchlisted => {
            let watched = open_user_state(config)?.watchlist().id_set();
            games.iter().filter(|game| watched.contains(&game.id)).collect()
        }
        None => games.iter().collect(),
    };
    Ok(calendar::ics_for_games(&picked, Utc::now()))
}

pub fn write_calendar(path: &Path, ics: &str) -> Result<(), String> {
    write_text(path, ics)
}

pub fn build_server_state(config: AppConfig) -> Result<ServerState, String> {
    let catalog = open_catalog(&config)?;
    let meta = load_meta(&meta_path(&config)).unwrap_or_else(|e| {
        warn!("{e}; rebuilding catalog meta in memory");
        build_meta(&catalog, config.target_year, Utc::now())
    });
    let user_state = open_user_state(&config)?;
    info!("Serving {} games for {}", catalog.len(), meta.year);
    Ok(ServerState {
        config: Arc::new(config),
        catalog: Arc::new(catalog),
        meta: Arc::new(meta),
        user_state: Arc::new(Mutex::new(user_state)),
    })
}

/// Blocks on the preview server. Ingestion uses the blocking HTTP client,
/// so the runtime only exists for this command.
pub fn serve(config: AppConfig, addr: Option<String>) -> Result<(), String> {
    let addr = addr.unwrap_or_else(|| bind_addr(&config));
    let state = build_server_state(config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("start runtime: {e}"))?;
    runtime.block_on(server::start_server(state, addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_text_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/sitemap.xml");
        write_text(&path, "<urlset/>").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<urlset/>");
    }
}
