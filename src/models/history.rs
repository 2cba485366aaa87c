use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upload,
    Download,
}

/// A single transfer history record persisted to local storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// Unique identifier (UUID v4 hex, 32 chars).
    pub id: String,
    pub direction: Direction,
    /// File name as sent to, or saved from, Telegram.
    pub file_name: String,
    pub file_size: u64,
    /// Destination chat for uploads, local path for downloads.
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    /// Transfer timestamp in RFC 3339 format (e.g., "2026-02-11T08:30:00+00:00").
    pub transferred_at: String,
}

impl HistoryRecord {
    pub fn new(
        direction: Direction,
        file_name: impl Into<String>,
        file_size: u64,
        location: impl Into<String>,
        message_id: Option<i64>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            direction,
            file_name: file_name.into(),
            file_size,
            location: location.into(),
            message_id,
            transferred_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
