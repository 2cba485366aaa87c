//! Chat explorer over the locally cached chat list.
//!
//! Bots cannot enumerate their dialogs, so the cache is built from chats seen
//! in `getUpdates`. Updates are acknowledged by advancing the stored offset.

use crate::api::TelegramApi;
use crate::models::chat::{ChatCache, ChatDetails, ChatKind, ChatSummary};
use crate::models::transfer::ChatRef;
use crate::storage::{chats as chat_store, AppPaths};

const UPDATES_PAGE_SIZE: u32 = 100;
/// Upper bound on pages drained per refresh.
const MAX_PAGES: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub updates: usize,
    pub new_chats: usize,
    pub total_chats: usize,
}

/// Drain pending updates into the cache and persist it with the new offset.
pub async fn refresh<A: TelegramApi>(
    api: &A,
    paths: &AppPaths,
) -> crate::error::Result<RefreshReport> {
    let mut cache = chat_store::load(paths)?;
    let before = cache.chats.len();
    let now = chrono::Utc::now().to_rfc3339();
    let mut report = RefreshReport::default();

    for _ in 0..MAX_PAGES {
        let updates = api.get_updates(cache.next_offset, UPDATES_PAGE_SIZE).await?;
        let Some(last) = updates.last().map(|u| u.update_id) else {
            break;
        };
        let page_len = updates.len();
        report.updates += page_len;
        for chat in updates.into_iter().filter_map(|u| u.chat) {
            cache.upsert(chat.to_summary(&now));
        }
        cache.next_offset = last + 1;
        chat_store::save(paths, &cache)?;
        if page_len < UPDATES_PAGE_SIZE as usize {
            break;
        }
    }

    report.total_chats = cache.chats.len();
    report.new_chats = report.total_chats - before;
    log::info!(
        "Chat refresh: {} update(s), {} new chat(s), {} cached",
        report.updates,
        report.new_chats,
        report.total_chats
    );
    Ok(report)
}

/// Cached chats filtered by kind and a case-insensitive title/username query,
/// sorted by title.
pub fn list(cache: &ChatCache, kind: Option<ChatKind>, query: Option<&str>) -> Vec<ChatSummary> {
    let query = query
        .map(|q| q.trim().trim_start_matches('@').to_lowercase())
        .filter(|q| !q.is_empty());
    let mut chats: Vec<ChatSummary> = cache
        .chats
        .iter()
        .filter(|c| kind.map_or(true, |k| c.kind == k))
        .filter(|c| match &query {
            None => true,
            Some(q) => {
                c.title.to_lowercase().contains(q)
                    || c.username
                        .as_deref()
                        .is_some_and(|u| u.to_lowercase().contains(q))
            }
        })
        .cloned()
        .collect();
    chats.sort_by_key(|c| c.title.to_lowercase());
    chats
}

/// Live details for one chat. The member count is optional since private
/// chats and some channels refuse it.
pub async fn show<A: TelegramApi>(api: &A, chat: &ChatRef) -> crate::error::Result<ChatDetails> {
    let info = api.get_chat(chat).await?;
    let member_count = match api.get_chat_member_count(chat).await {
        Ok(count) => Some(count),
        Err(e) => {
            log::debug!("No member count for {}: {}", chat, e);
            None
        }
    };
    Ok(ChatDetails {
        summary: info.to_summary(&chrono::Utc::now().to_rfc3339()),
        description: info.description.clone(),
        member_count,
    })
}
