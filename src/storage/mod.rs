//! Local persistence layer.
//!
//! Every store is a JSON file under the application directory. Writes go to a
//! temporary sibling first and are renamed into place, so a crash never leaves
//! a truncated file behind.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;

pub mod batch;
pub mod captions;
pub mod chats;
pub mod history;
pub mod profiles;
pub mod session;
pub mod settings;

pub const APP_DIR_NAME: &str = ".tg-transfer";

/// Locations of every file the application owns.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$HOME/.tg-transfer`, or the current directory when no home is set.
    pub fn default_root() -> PathBuf {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    pub fn ensure(&self) -> crate::error::Result<()> {
        std::fs::create_dir_all(self.profiles_dir())?;
        Ok(())
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.root.join("profiles")
    }

    pub fn history_file(&self) -> PathBuf {
        self.root.join("history.json")
    }

    pub fn batch_file(&self) -> PathBuf {
        self.root.join("batch.json")
    }

    pub fn chats_file(&self) -> PathBuf {
        self.root.join("chats.json")
    }

    pub fn captions_file(&self) -> PathBuf {
        self.root.join("captions.json")
    }

    /// Resolve a configured path; relative paths are taken from the app directory.
    pub fn resolve(&self, configured: &str) -> PathBuf {
        let path = Path::new(configured);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Read and parse a JSON file. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> crate::error::Result<Option<T>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = serde_json::from_str(&text).map_err(|e| {
        AppError::Storage(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    Ok(Some(value))
}

/// Pretty-print `value` to `path` atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> crate::error::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(value)?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)
        .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", path.display(), e)))?;
    Ok(())
}

/// Remove a file, treating "already gone" as success. Returns whether it existed.
pub fn remove_file(path: &Path) -> crate::error::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Minimal key/value document: a JSON object persisted on `save`.
pub struct JsonStore {
    path: PathBuf,
    data: serde_json::Map<String, serde_json::Value>,
}

impl JsonStore {
    /// Open the store, starting empty when the file is missing.
    pub fn open(path: impl Into<PathBuf>) -> crate::error::Result<Self> {
        let path = path.into();
        let data = read_json(&path)?.unwrap_or_default();
        Ok(Self { path, data })
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        self.data.insert(key.to_string(), value);
    }

    pub fn save(&self) -> crate::error::Result<()> {
        write_json(&self.path, &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let value: Option<serde_json::Value> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");
        write_json(&path, &vec![1, 2, 3]).unwrap();
        let value: Vec<u32> = read_json(&path).unwrap().unwrap();
        assert_eq!(value, vec![1, 2, 3]);
        assert!(!dir.path().join("nested").join("data.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let result: crate::error::Result<Option<serde_json::Value>> = read_json(&path);
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[test]
    fn remove_file_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x");
        std::fs::write(&path, "x").unwrap();
        assert!(remove_file(&path).unwrap());
        assert!(!remove_file(&path).unwrap());
    }

    #[test]
    fn json_store_set_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = JsonStore::open(&path).unwrap();
        assert!(store.get("records").is_none());
        store.set("records", serde_json::json!([1]));
        store.save().unwrap();

        let reopened = JsonStore::open(&path).unwrap();
        assert_eq!(reopened.get("records").unwrap(), serde_json::json!([1]));
    }

    #[test]
    fn resolve_relative_and_absolute() {
        let paths = AppPaths::new("/app");
        assert_eq!(paths.resolve("downloads"), PathBuf::from("/app/downloads"));
        assert_eq!(paths.resolve("/data"), PathBuf::from("/data"));
        assert_eq!(paths.config_file(), PathBuf::from("/app/config.json"));
    }
}
