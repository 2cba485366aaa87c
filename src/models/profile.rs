use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Credentials for one Telegram bot account, stored as `profiles/<name>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub bot_token: String,
    /// Alternative Bot API server (e.g. a self-hosted `telegram-bot-api`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    /// Proxy URL such as `socks5://127.0.0.1:1080`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl Profile {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base_url: None,
            proxy: None,
        }
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let re = Regex::new(r"^\d+:[A-Za-z0-9_-]{20,}$")
            .map_err(|e| AppError::Internal(format!("Regex compile error: {}", e)))?;
        if !re.is_match(self.bot_token.trim()) {
            return Err(AppError::InvalidInput(
                "Bot token must look like '<bot id>:<secret>'".into(),
            ));
        }
        Ok(())
    }
}

/// Profile names become file names, so keep them to a single path segment.
pub fn validate_profile_name(name: &str) -> crate::error::Result<()> {
    if name.trim().is_empty()
        || name.starts_with('.')
        || name.contains(|c: char| c == '/' || c == '\\')
        || name.contains("..")
    {
        return Err(AppError::InvalidInput(format!(
            "Invalid profile name: '{}'",
            name
        )));
    }
    Ok(())
}
