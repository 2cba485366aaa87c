//! Application error type shared by every layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Rate limited by Telegram, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("File is too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Message {message_id} has no downloadable media")]
    NoMedia { message_id: i64 },

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error came back from Telegram with a 5xx code.
    pub fn is_server_error(&self) -> bool {
        matches!(self, AppError::Api { code, .. } if (500..600).contains(code))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

// Request URLs carry the bot token; strip them before the message is logged.
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.without_url().to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts_to_io_variant() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        match err {
            AppError::Io(msg) => assert!(msg.contains("gone")),
            other => panic!("Expected AppError::Io, got: {:?}", other),
        }
    }

    #[test]
    fn serde_error_converts_to_storage_variant() {
        let err: AppError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[test]
    fn server_error_detection() {
        let err = AppError::Api {
            code: 502,
            description: "Bad Gateway".into(),
        };
        assert!(err.is_server_error());
        let err = AppError::Api {
            code: 400,
            description: "Bad Request".into(),
        };
        assert!(!err.is_server_error());
    }

    #[test]
    fn display_messages() {
        let err = AppError::FileTooLarge {
            size: 100,
            limit: 50,
        };
        assert_eq!(
            err.to_string(),
            "File is too large: 100 bytes exceeds the 50 byte limit"
        );
        assert_eq!(
            AppError::RateLimited { retry_after: 7 }.to_string(),
            "Rate limited by Telegram, retry after 7s"
        );
    }
}
