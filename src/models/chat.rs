use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl std::str::FromStr for ChatKind {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(ChatKind::Private),
            "group" => Ok(ChatKind::Group),
            "supergroup" => Ok(ChatKind::Supergroup),
            "channel" => Ok(ChatKind::Channel),
            other => Err(crate::error::AppError::InvalidInput(format!(
                "Unknown chat kind '{}'",
                other
            ))),
        }
    }
}

/// A chat the account has seen, as cached by the chat explorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: i64,
    pub kind: ChatKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub last_seen: String,
}

/// Detailed chat information from `getChat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDetails {
    pub summary: ChatSummary,
    pub description: Option<String>,
    pub member_count: Option<u64>,
}

/// On-disk chat cache with the next `getUpdates` offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatCache {
    pub next_offset: i64,
    pub chats: Vec<ChatSummary>,
}

impl ChatCache {
    /// Insert or refresh a chat by id.
    pub fn upsert(&mut self, chat: ChatSummary) {
        match self.chats.iter_mut().find(|c| c.id == chat.id) {
            Some(existing) => *existing = chat,
            None => self.chats.push(chat),
        }
    }
}
