//! Transfer options and the small value types they are built from.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a"];

/// How a file is presented in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Voice,
    VideoNote,
    Animation,
    Document,
}

impl MediaKind {
    /// Pick a kind from the file extension; unknown extensions are documents.
    pub fn detect(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Photo
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Audio
        } else {
            MediaKind::Document
        }
    }

    /// Bot API method that sends this kind.
    pub fn method(self) -> &'static str {
        match self {
            MediaKind::Photo => "sendPhoto",
            MediaKind::Video => "sendVideo",
            MediaKind::Audio => "sendAudio",
            MediaKind::Voice => "sendVoice",
            MediaKind::VideoNote => "sendVideoNote",
            MediaKind::Animation => "sendAnimation",
            MediaKind::Document => "sendDocument",
        }
    }

    /// Multipart field carrying the file.
    pub fn field(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice",
            MediaKind::VideoNote => "video_note",
            MediaKind::Animation => "animation",
            MediaKind::Document => "document",
        }
    }

    pub fn supports_spoiler(self) -> bool {
        matches!(
            self,
            MediaKind::Photo | MediaKind::Video | MediaKind::Animation
        )
    }

    pub fn supports_thumbnail(self) -> bool {
        matches!(
            self,
            MediaKind::Video
                | MediaKind::Audio
                | MediaKind::Document
                | MediaKind::Animation
                | MediaKind::VideoNote
        )
    }

    pub fn supports_caption(self) -> bool {
        !matches!(self, MediaKind::VideoNote)
    }
}

/// Requested presentation: a fixed kind or detection by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendAs {
    #[default]
    Auto,
    Photo,
    Video,
    Audio,
    Voice,
    VideoNote,
    Animation,
    Document,
}

impl SendAs {
    pub fn resolve(self, path: &Path) -> MediaKind {
        match self {
            SendAs::Auto => MediaKind::detect(path),
            SendAs::Photo => MediaKind::Photo,
            SendAs::Video => MediaKind::Video,
            SendAs::Audio => MediaKind::Audio,
            SendAs::Voice => MediaKind::Voice,
            SendAs::VideoNote => MediaKind::VideoNote,
            SendAs::Animation => MediaKind::Animation,
            SendAs::Document => MediaKind::Document,
        }
    }
}

impl FromStr for SendAs {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(SendAs::Auto),
            "photo" => Ok(SendAs::Photo),
            "video" => Ok(SendAs::Video),
            "audio" => Ok(SendAs::Audio),
            "voice" => Ok(SendAs::Voice),
            "video_note" => Ok(SendAs::VideoNote),
            "animation" => Ok(SendAs::Animation),
            "document" => Ok(SendAs::Document),
            other => Err(AppError::InvalidInput(format!(
                "Unknown media kind '{}'",
                other
            ))),
        }
    }
}

/// A chat addressed by numeric id or public username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatRef {
    Id(i64),
    Username(String),
}

impl FromStr for ChatRef {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AppError::InvalidInput("Chat must not be empty".into()));
        }
        if let Ok(id) = s.parse::<i64>() {
            return Ok(ChatRef::Id(id));
        }
        let name = s.trim_start_matches('@');
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::InvalidInput(format!("Invalid chat '{}'", s)));
        }
        Ok(ChatRef::Username(name.to_string()))
    }
}

impl fmt::Display for ChatRef {
    /// The form the Bot API expects for `chat_id`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRef::Id(id) => write!(f, "{}", id),
            ChatRef::Username(name) => write!(f, "@{}", name),
        }
    }
}

/// Per-upload options shared by single uploads, folder uploads and batches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadOptions {
    pub send_as: SendAs,
    pub caption: Option<String>,
    /// Name of a template in captions.json, used when no caption is given.
    pub caption_template: Option<String>,
    /// Use the file stem as caption.
    pub filename_caption: bool,
    /// Prepended to the file name shown in the chat.
    pub prefix: Option<String>,
    pub silent: bool,
    pub protect: bool,
    pub spoiler: bool,
    pub delete_original: bool,
    pub thumbnail: Option<String>,
    /// Split files larger than the upload limit into parts of this size; 0 disables.
    pub split_size: u64,
}
