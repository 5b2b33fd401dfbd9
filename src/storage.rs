use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

/// File-backed key-value store. Each key is one JSON document that is
/// rewritten whole on every save.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, String> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| format!("create storage dir {}: {e}", dir.display()))?;
        Ok(StateStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Absent or unreadable values come back as the default.
    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let path = self.key_path(key);
        if !path.is_file() {
            return T::default();
        }
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) => {
                warn!("Falling back to empty {key}: read {}: {err}", path.display());
                return T::default();
            }
        };
        match serde_json::from_str::<T>(&data) {
            Ok(value) => value,
            Err(err) => {
                warn!("Falling back to empty {key}: parse {}: {err}", path.display());
                T::default()
            }
        }
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), String> {
        let path = self.key_path(key);
        let payload = serde_json::to_string(value).map_err(|e| format!("encode {key}: {e}"))?;
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, payload).map_err(|e| format!("write {}: {e}", tmp.display()))?;
        fs::rename(&tmp, &path).map_err(|e| format!("write {}: {e}", path.display()))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), String> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path).map_err(|e| format!("remove {}: {e}", path.display()))
    }
}
