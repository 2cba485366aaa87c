//! Parsing of `t.me` message links and message id lists.

use regex::Regex;

use crate::error::AppError;
use crate::models::transfer::ChatRef;

/// Most ids a single id list may expand to.
pub const MAX_MESSAGE_IDS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLink {
    pub chat: ChatRef,
    pub message_id: i64,
}

// t.me/<user>/<id>, t.me/c/<internal>/<id>, each with an optional topic segment.
const LINK_PATTERN: &str = r"^(?:https?://)?(?:www\.)?(?:t|telegram)\.me/(?:(?P<private>c)/(?P<internal>\d+)|(?P<user>[A-Za-z][A-Za-z0-9_]{3,}))/(?:\d+/)?(?P<id>\d+)/?(?:\?.*)?$";

/// Parse a public (`t.me/name/42`) or private (`t.me/c/123/42`) message link.
pub fn parse_message_link(input: &str) -> crate::error::Result<MessageLink> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let invalid =
        || AppError::InvalidInput(format!("Not a Telegram message link: '{}'", input.trim()));
    let re = Regex::new(LINK_PATTERN)
        .map_err(|e| AppError::Internal(format!("Regex compile error: {}", e)))?;
    let caps = re.captures(&compact).ok_or_else(invalid)?;

    let message_id: i64 = caps["id"].parse().map_err(|_| invalid())?;
    if message_id <= 0 {
        return Err(invalid());
    }
    let chat = if caps.name("private").is_some() {
        let internal = &caps["internal"];
        let id: i64 = format!("-100{}", internal).parse().map_err(|_| invalid())?;
        ChatRef::Id(id)
    } else {
        ChatRef::Username(caps["user"].to_string())
    };
    Ok(MessageLink { chat, message_id })
}

/// Expand a list like `1,2,5-8` into ids, preserving order and dropping repeats.
pub fn parse_message_ids(input: &str) -> crate::error::Result<Vec<i64>> {
    let mut ids: Vec<i64> = Vec::new();
    for item in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let invalid = || AppError::InvalidInput(format!("Invalid message id '{}'", item));
        let (start, end) = match item.split_once('-') {
            Some((a, b)) => (
                a.trim().parse::<i64>().map_err(|_| invalid())?,
                b.trim().parse::<i64>().map_err(|_| invalid())?,
            ),
            None => {
                let id = item.parse::<i64>().map_err(|_| invalid())?;
                (id, id)
            }
        };
        if start <= 0 || end < start {
            return Err(invalid());
        }
        let room = MAX_MESSAGE_IDS.saturating_sub(ids.len()) as i64;
        if (end - start).saturating_add(1) > room {
            return Err(AppError::InvalidInput(format!(
                "Too many message ids (limit {})",
                MAX_MESSAGE_IDS
            )));
        }
        for id in start..=end {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    if ids.is_empty() {
        return Err(AppError::InvalidInput("No message ids given".into()));
    }
    Ok(ids)
}
