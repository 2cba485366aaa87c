use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_DOWNLOAD_PATH: &str = "downloads";
/// 512 KiB, the largest part size Telegram accepts for uploads.
pub const DEFAULT_CHUNK_SIZE: u64 = 524_288;
pub const MIN_CHUNK_SIZE: u64 = 1024;
pub const MAX_CHUNK_SIZE: u64 = 16 * 1024 * 1024;
pub const DEFAULT_CLONE_SLEEP_INTERVAL: u64 = 2;

/// Keys accepted by `config set` / `config get`.
pub const CONFIG_KEYS: &[&str] = &[
    "default_download_path",
    "chunk_size",
    "parallel_upload",
    "parallel_download",
    "auto_delete_clone",
    "clone_sleep_interval",
    "current_profile",
    "default_chat",
    "relay_chat",
];

/// Application settings persisted to config.json.
///
/// Every field is optional on read. Keys this version does not know about are
/// kept in `extra` so a load/save cycle never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_download_path: String,
    /// I/O frame size in bytes for streamed transfers and hashing.
    pub chunk_size: u64,
    pub parallel_upload: bool,
    pub parallel_download: bool,
    /// Delete the source message after it was cloned.
    pub auto_delete_clone: bool,
    /// Seconds to wait between cloned messages.
    pub clone_sleep_interval: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_chat: Option<String>,
    /// Chat the bot forwards messages into so their media can be fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_chat: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_download_path: DEFAULT_DOWNLOAD_PATH.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel_upload: false,
            parallel_download: false,
            auto_delete_clone: false,
            clone_sleep_interval: DEFAULT_CLONE_SLEEP_INTERVAL,
            current_profile: None,
            default_chat: None,
            relay_chat: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl AppConfig {
    /// Assign `key` from its textual form. Empty values clear optional keys.
    pub fn set(&mut self, key: &str, value: &str) -> crate::error::Result<()> {
        let value = value.trim();
        match key {
            "default_download_path" => {
                if value.is_empty() {
                    return Err(AppError::Config(
                        "default_download_path must not be empty".into(),
                    ));
                }
                self.default_download_path = value.to_string();
            }
            "chunk_size" => {
                let size = parse_u64(key, value)?;
                validate_chunk_size(size)?;
                self.chunk_size = size;
            }
            "parallel_upload" => self.parallel_upload = parse_bool(key, value)?,
            "parallel_download" => self.parallel_download = parse_bool(key, value)?,
            "auto_delete_clone" => self.auto_delete_clone = parse_bool(key, value)?,
            "clone_sleep_interval" => self.clone_sleep_interval = parse_u64(key, value)?,
            "current_profile" => self.current_profile = optional(value),
            "default_chat" => self.default_chat = optional(value),
            "relay_chat" => self.relay_chat = optional(value),
            other => {
                return Err(AppError::Config(format!(
                    "Unknown setting '{}'. Known settings: {}",
                    other,
                    CONFIG_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// Textual value of `key`, `None` for unset optional keys.
    pub fn get(&self, key: &str) -> crate::error::Result<Option<String>> {
        let value = match key {
            "default_download_path" => Some(self.default_download_path.clone()),
            "chunk_size" => Some(self.chunk_size.to_string()),
            "parallel_upload" => Some(self.parallel_upload.to_string()),
            "parallel_download" => Some(self.parallel_download.to_string()),
            "auto_delete_clone" => Some(self.auto_delete_clone.to_string()),
            "clone_sleep_interval" => Some(self.clone_sleep_interval.to_string()),
            "current_profile" => self.current_profile.clone(),
            "default_chat" => self.default_chat.clone(),
            "relay_chat" => self.relay_chat.clone(),
            other => return Err(AppError::Config(format!("Unknown setting '{}'", other))),
        };
        Ok(value)
    }

    /// Chunk size usable as a buffer length, falling back to the default when
    /// a hand-edited file holds an out-of-range value.
    pub fn effective_chunk_size(&self) -> usize {
        if validate_chunk_size(self.chunk_size).is_ok() {
            self.chunk_size as usize
        } else {
            DEFAULT_CHUNK_SIZE as usize
        }
    }
}

pub fn validate_chunk_size(size: u64) -> crate::error::Result<()> {
    if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
        return Err(AppError::Config(format!(
            "chunk_size must be between {} and {} bytes, got {}",
            MIN_CHUNK_SIZE, MAX_CHUNK_SIZE, size
        )));
    }
    Ok(())
}

fn parse_u64(key: &str, value: &str) -> crate::error::Result<u64> {
    value
        .parse()
        .map_err(|_| AppError::Config(format!("{} expects a non-negative integer", key)))
}

fn parse_bool(key: &str, value: &str) -> crate::error::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(AppError::Config(format!("{} expects true or false", key))),
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_DOCUMENT: &str = r#"{
        "default_download_path": "/data/tg",
        "chunk_size": 1048576,
        "parallel_upload": true,
        "parallel_download": false,
        "auto_delete_clone": true,
        "clone_sleep_interval": 5
    }"#;

    #[test]
    fn six_documented_keys_roundtrip() {
        let original: serde_json::Value = serde_json::from_str(FULL_DOCUMENT).unwrap();
        let config: AppConfig = serde_json::from_str(FULL_DOCUMENT).unwrap();
        let saved = serde_json::to_value(&config).unwrap();
        assert_eq!(saved, original);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"chunk_size": 2048}"#).unwrap();
        assert_eq!(config.chunk_size, 2048);
        assert_eq!(config.default_download_path, DEFAULT_DOWNLOAD_PATH);
        assert!(!config.parallel_upload);
        assert!(!config.parallel_download);
        assert!(!config.auto_delete_clone);
        assert_eq!(config.clone_sleep_interval, DEFAULT_CLONE_SLEEP_INTERVAL);
        assert!(config.current_profile.is_none());
    }

    #[test]
    fn empty_object_is_default() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let config: AppConfig =
            serde_json::from_str(r#"{"theme": "dark", "chunk_size": 4096}"#).unwrap();
        assert_eq!(config.extra.get("theme").unwrap(), "dark");
        let saved = serde_json::to_value(&config).unwrap();
        assert_eq!(saved["theme"], "dark");
        assert_eq!(saved["chunk_size"], 4096);
    }

    #[test]
    fn unset_optional_keys_are_not_written() {
        let json = serde_json::to_value(AppConfig::default()).unwrap();
        assert!(json.get("current_profile").is_none());
        assert!(json.get("relay_chat").is_none());
        assert_eq!(json.as_object().unwrap().len(), 6);
    }

    #[test]
    fn set_parses_typed_values() {
        let mut config = AppConfig::default();
        config.set("parallel_upload", "yes").unwrap();
        config.set("chunk_size", "65536").unwrap();
        config.set("clone_sleep_interval", "10").unwrap();
        config.set("relay_chat", "-1001234").unwrap();
        assert!(config.parallel_upload);
        assert_eq!(config.chunk_size, 65536);
        assert_eq!(config.clone_sleep_interval, 10);
        assert_eq!(config.relay_chat.as_deref(), Some("-1001234"));

        config.set("relay_chat", "").unwrap();
        assert!(config.relay_chat.is_none());
    }

    #[test]
    fn set_rejects_bad_values() {
        let mut config = AppConfig::default();
        assert!(config.set("chunk_size", "12").is_err());
        assert!(config.set("chunk_size", "abc").is_err());
        assert!(config.set("parallel_download", "maybe").is_err());
        assert!(config.set("default_download_path", "  ").is_err());
        let err = config.set("colour", "red").unwrap_err().to_string();
        assert!(err.contains("Unknown setting"), "Error: {}", err);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn get_returns_text_values() {
        let config = AppConfig::default();
        assert_eq!(config.get("chunk_size").unwrap().as_deref(), Some("524288"));
        assert_eq!(config.get("auto_delete_clone").unwrap().as_deref(), Some("false"));
        assert!(config.get("default_chat").unwrap().is_none());
        assert!(config.get("nope").is_err());
    }

    #[test]
    fn effective_chunk_size_ignores_invalid_values() {
        let config = AppConfig {
            chunk_size: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.effective_chunk_size(), DEFAULT_CHUNK_SIZE as usize);
    }
}
