//! Telegram API abstraction layer.
//!
//! `TelegramApi` is the sole interface for network interactions with Telegram.
//! Services call through this trait and never construct HTTP requests
//! themselves; `BotApiClient` is the Bot API implementation. Replacing the
//! transport means adding another implementation here.

use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::AppError;
use crate::models::chat::{ChatKind, ChatSummary};
use crate::models::transfer::{ChatRef, MediaKind};

pub mod bot;
pub mod link;
#[cfg(test)]
pub(crate) mod mock;

/// Largest file the Bot API accepts for upload (50 MB).
pub const MAX_UPLOAD_SIZE: u64 = 50 * 1024 * 1024;
/// Largest file the Bot API serves through `getFile` (20 MB).
pub const MAX_DOWNLOAD_SIZE: u64 = 20 * 1024 * 1024;

/// The authenticated account as returned by `getMe`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendFileParams {
    pub chat: ChatRef,
    pub path: PathBuf,
    /// Name shown in the chat.
    pub file_name: String,
    pub kind: MediaKind,
    pub caption: Option<String>,
    pub silent: bool,
    pub protect: bool,
    pub spoiler: bool,
    pub thumbnail: Option<PathBuf>,
    /// Frame size used when streaming the file body.
    pub chunk_size: usize,
    /// Bytes sent so far; reset at the start of every attempt.
    pub progress: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct DownloadParams {
    /// `file_path` returned by `getFile`.
    pub remote_path: String,
    pub dest: PathBuf,
    pub chunk_size: usize,
    pub progress: Arc<AtomicU64>,
}

/// Chat object as the Bot API returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ApiChat {
    pub fn display_title(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        let full_name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !full_name.is_empty() {
            return full_name;
        }
        match &self.username {
            Some(username) => format!("@{}", username),
            None => self.id.to_string(),
        }
    }

    pub fn to_summary(&self, last_seen: &str) -> ChatSummary {
        ChatSummary {
            id: self.id,
            kind: self.kind,
            title: self.display_title(),
            username: self.username.clone(),
            last_seen: last_seen.to_string(),
        }
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

impl MediaRef {
    /// File name to save under when the message does not carry one.
    pub fn suggested_name(&self, message_id: i64) -> String {
        if let Some(name) = self.file_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        match self.kind {
            MediaKind::Photo => format!("photo_{}.jpg", message_id),
            MediaKind::Video => format!("video_{}.mp4", message_id),
            MediaKind::Audio => format!("audio_{}.mp3", message_id),
            MediaKind::Voice => format!("voice_{}.ogg", message_id),
            MediaKind::VideoNote => format!("video_note_{}.mp4", message_id),
            MediaKind::Animation => format!("animation_{}.mp4", message_id),
            MediaKind::Document => format!("file_{}", message_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_id: i64,
    pub chat_id: i64,
    pub media: Option<MediaRef>,
}

impl Message {
    /// Parse a Bot API `Message` object, keeping only what transfers need.
    pub fn from_value(value: &serde_json::Value) -> crate::error::Result<Self> {
        let message_id = value["message_id"]
            .as_i64()
            .ok_or_else(|| AppError::Internal(format!("Message without message_id: {}", value)))?;
        let chat_id = value["chat"]["id"].as_i64().unwrap_or_default();
        Ok(Self {
            message_id,
            chat_id,
            media: media_from_value(value),
        })
    }
}

fn media_from_value(value: &serde_json::Value) -> Option<MediaRef> {
    const FIELDS: &[(&str, MediaKind)] = &[
        ("document", MediaKind::Document),
        ("video", MediaKind::Video),
        ("audio", MediaKind::Audio),
        ("voice", MediaKind::Voice),
        ("video_note", MediaKind::VideoNote),
        ("animation", MediaKind::Animation),
    ];
    // Animations also carry a `document` field; prefer the specific kind.
    let ordered = FIELDS.iter().rev();
    for (field, kind) in ordered {
        if let Some(obj) = value.get(*field).filter(|v| v.is_object()) {
            return media_ref(obj, *kind);
        }
    }
    value
        .get("photo")
        .and_then(|p| p.as_array())
        .and_then(|sizes| sizes.last())
        .and_then(|largest| media_ref(largest, MediaKind::Photo))
}

fn media_ref(obj: &serde_json::Value, kind: MediaKind) -> Option<MediaRef> {
    Some(MediaRef {
        kind,
        file_id: obj["file_id"].as_str()?.to_string(),
        file_name: obj["file_name"].as_str().map(|s| s.to_string()),
        file_size: obj["file_size"].as_u64(),
    })
}

/// One `getUpdates` entry reduced to the chat it concerns.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub chat: Option<ApiChat>,
}

impl Update {
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        const CHAT_PATHS: &[&[&str]] = &[
            &["message", "chat"],
            &["edited_message", "chat"],
            &["channel_post", "chat"],
            &["edited_channel_post", "chat"],
            &["my_chat_member", "chat"],
            &["chat_member", "chat"],
            &["chat_join_request", "chat"],
            &["callback_query", "message", "chat"],
        ];
        let update_id = value["update_id"].as_i64()?;
        let chat = CHAT_PATHS.iter().find_map(|path| {
            let node = path.iter().try_fold(value, |node, key| node.get(*key))?;
            serde_json::from_value::<ApiChat>(node.clone()).ok()
        });
        Some(Self { update_id, chat })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteFile {
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Abstraction trait for Telegram interactions.
pub trait TelegramApi: Send + Sync {
    /// Identify the account behind the credentials.
    fn get_me(
        &self,
    ) -> impl std::future::Future<Output = std::result::Result<BotIdentity, AppError>> + Send;

    /// Upload a local file as a new message.
    fn send_file(
        &self,
        params: SendFileParams,
    ) -> impl std::future::Future<Output = std::result::Result<Message, AppError>> + Send;

    /// Copy a message without a "forwarded from" header. Returns the new message id.
    fn copy_message(
        &self,
        to: &ChatRef,
        from: &ChatRef,
        message_id: i64,
        silent: bool,
    ) -> impl std::future::Future<Output = std::result::Result<i64, AppError>> + Send;

    /// Forward a message, returning the full forwarded message (used to read its media).
    fn forward_message(
        &self,
        to: &ChatRef,
        from: &ChatRef,
        message_id: i64,
    ) -> impl std::future::Future<Output = std::result::Result<Message, AppError>> + Send;

    fn delete_message(
        &self,
        chat: &ChatRef,
        message_id: i64,
    ) -> impl std::future::Future<Output = std::result::Result<(), AppError>> + Send;

    fn get_updates(
        &self,
        offset: i64,
        limit: u32,
    ) -> impl std::future::Future<Output = std::result::Result<Vec<Update>, AppError>> + Send;

    fn get_chat(
        &self,
        chat: &ChatRef,
    ) -> impl std::future::Future<Output = std::result::Result<ApiChat, AppError>> + Send;

    fn get_chat_member_count(
        &self,
        chat: &ChatRef,
    ) -> impl std::future::Future<Output = std::result::Result<u64, AppError>> + Send;

    /// Resolve a `file_id` to a downloadable path.
    fn get_file(
        &self,
        file_id: &str,
    ) -> impl std::future::Future<Output = std::result::Result<RemoteFile, AppError>> + Send;

    /// Stream a remote file to `params.dest`. Returns the number of bytes written.
    fn download_file(
        &self,
        params: DownloadParams,
    ) -> impl std::future::Future<Output = std::result::Result<u64, AppError>> + Send;
}
