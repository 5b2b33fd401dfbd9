use crate::types::*;
use chrono::Local;
use std::{
  env,
  fs,
  io::{ErrorKind, Write},
  path::{Path, PathBuf},
};

const CONFIG_FILE: &str = "config.json";

// ── Locations ──────────────────────────────────────────────────────────

/// `RELEASE_RADAR_ROOT`, else the crate directory.
pub fn repo_root() -> PathBuf {
  env_value("RELEASE_RADAR_ROOT")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")))
}

/// Relative paths in config are anchored at the repo root.
pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = Path::new(raw);
  if path.is_absolute() {
    return path.to_path_buf();
  }
  repo_root().join(path)
}

pub fn config_file() -> PathBuf {
  repo_root().join(CONFIG_FILE)
}

// ── Environment ────────────────────────────────────────────────────────

/// Trimmed value of `key`; unset and blank are both `None`.
pub fn env_value(key: &str) -> Option<String> {
  let raw = env::var(key).ok()?;
  let value = raw.trim();
  (!value.is_empty()).then(|| value.to_string())
}

fn fill_from_env(slot: &mut String, key: &str) {
  if !slot.trim().is_empty() {
    return;
  }
  if let Some(value) = env_value(key) {
    *slot = value;
  }
}

/// Blank config fields take their env var. `TARGET_YEAR` always wins.
pub fn apply_env_defaults(mut config: AppConfig) -> AppConfig {
  fill_from_env(&mut config.site_url, "SITE_URL");
  fill_from_env(&mut config.bind_addr, "BIND_ADDR");
  fill_from_env(&mut config.igdb_client_id, "IGDB_CLIENT_ID");
  fill_from_env(&mut config.igdb_token, "IGDB_ACCESS_TOKEN");
  fill_from_env(&mut config.rawg_key, "RAWG_API_KEY");
  if let Some(year) = env_value("TARGET_YEAR").and_then(|raw| raw.parse::<i32>().ok()) {
    config.target_year = year;
  }
  config
}

/// Reads `.env` at the repo root. Variables already set in the process are
/// left alone.
pub fn load_env_file() {
  let Ok(contents) = fs::read_to_string(repo_root().join(".env")) else {
    return;
  };
  for (key, value) in contents.lines().filter_map(parse_env_line) {
    if env::var_os(&key).is_none() {
      env::set_var(key, value);
    }
  }
}

fn unquote(value: &str, quote: char) -> Option<&str> {
  value.strip_prefix(quote)?.strip_suffix(quote)
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let line = line.trim();
  if line.starts_with('#') {
    return None;
  }
  let line = line.strip_prefix("export ").unwrap_or(line);
  let (key, value) = line.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let value = value.trim();
  let value = unquote(value, '"')
    .or_else(|| unquote(value, '\''))
    .unwrap_or_else(|| value.split(" #").next().unwrap_or(value).trim_end());
  Some((key.to_string(), value.to_string()))
}

// ── config.json ────────────────────────────────────────────────────────

/// A missing file is not an error; a malformed one is.
pub fn load_config() -> Result<AppConfig, String> {
  let path = config_file();
  let config = match fs::read_to_string(&path) {
    Ok(data) => serde_json::from_str::<AppConfig>(&data)
      .map_err(|e| format!("parse config {}: {e}", path.display()))?,
    Err(e) if e.kind() == ErrorKind::NotFound => AppConfig::default(),
    Err(e) => return Err(format!("read config {}: {e}", path.display())),
  };
  Ok(apply_env_defaults(config))
}

// ── Derived paths ──────────────────────────────────────────────────────

pub fn data_dir(config: &AppConfig) -> PathBuf {
  resolve_repo_path(config.data_dir.trim())
}

pub fn catalog_path(config: &AppConfig) -> PathBuf {
  data_dir(config).join(CATALOG_FILE)
}

pub fn meta_path(config: &AppConfig) -> PathBuf {
  data_dir(config).join(META_FILE)
}

pub fn site_dir(config: &AppConfig) -> PathBuf {
  resolve_repo_path(config.site_dir.trim())
}

pub fn storage_dir(config: &AppConfig) -> PathBuf {
  resolve_repo_path(config.storage_dir.trim())
}

pub fn logs_dir() -> PathBuf {
  repo_root().join("logs")
}

pub fn ingest_log_path() -> PathBuf {
  logs_dir().join("ingest_api.log")
}

/// One timestamped entry in `logs/ingest_api.log`. Write failures are
/// dropped.
pub fn append_ingest_log(label: &str, payload: &str) {
  let path = ingest_log_path();
  let opened = fs::create_dir_all(logs_dir())
    .and_then(|_| fs::OpenOptions::new().create(true).append(true).open(&path));
  let Ok(mut file) = opened else {
    return;
  };
  let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
  let _ = writeln!(file, "[{stamp}] {label}\n{payload}\n");
}

pub fn log_env_warnings(config: &AppConfig) {
  if config.igdb_client_id.trim().is_empty() || config.igdb_token.trim().is_empty() {
    tracing::warn!("No IGDB credentials (config or IGDB_CLIENT_ID / IGDB_ACCESS_TOKEN); IGDB ingestion will be skipped");
  }
  if config.rawg_key.trim().is_empty() {
    tracing::warn!("No RAWG key (config or RAWG_API_KEY); RAWG ingestion will be skipped");
  }
  if let Err(e) = crate::bracket::validate_size(config.bracket_size) {
    tracing::warn!("bracketSize in config: {e}");
  }
}

pub fn site_base_url(config: &AppConfig) -> String {
  let trimmed = config.site_url.trim().trim_end_matches('/');
  if trimmed.is_empty() {
    DEFAULT_SITE_URL.to_string()
  } else {
    trimmed.to_string()
  }
}

pub fn bind_addr(config: &AppConfig) -> String {
  let trimmed = config.bind_addr.trim();
  if trimmed.is_empty() {
    DEFAULT_BIND_ADDR.to_string()
  } else {
    trimmed.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_env_line_handles_quotes_and_comments() {
    assert_eq!(
      parse_env_line("export RAWG_API_KEY=\"abc 123\""),
      Some(("RAWG_API_KEY".to_string(), "abc 123".to_string()))
    );
    assert_eq!(
      parse_env_line("SITE_URL=https://radar.test # prod"),
      Some(("SITE_URL".to_string(), "https://radar.test".to_string()))
    );
    assert_eq!(parse_env_line("# comment"), None);
    assert_eq!(parse_env_line("   "), None);
    assert_eq!(parse_env_line("=value"), None);
  }

  #[test]
  fn site_base_url_trims_trailing_slash() {
    let config = AppConfig {
      site_url: "https://radar.test/".to_string(),
      ..AppConfig::default()
    };
    assert_eq!(site_base_url(&config), "https://radar.test");

    let empty = AppConfig::default();
    assert_eq!(site_base_url(&empty), DEFAULT_SITE_URL);
  }

  #[test]
  fn config_parses_partial_json_with_defaults() {
    let config: AppConfig = serde_json::from_str(r#"{ "targetYear": 2027, "siteName": "Radar" }"#).unwrap();
    assert_eq!(config.target_year, 2027);
    assert_eq!(config.site_name, "Radar");
    assert_eq!(config.bracket_size, DEFAULT_BRACKET_SIZE);
    assert_eq!(config.data_dir, "data");
  }
}
