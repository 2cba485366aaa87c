use crate::models::chat::ChatCache;
use crate::storage::{read_json, write_json, AppPaths};

pub fn load(paths: &AppPaths) -> crate::error::Result<ChatCache> {
    Ok(read_json(&paths.chats_file())?.unwrap_or_default())
}

pub fn save(paths: &AppPaths, cache: &ChatCache) -> crate::error::Result<()> {
    write_json(&paths.chats_file(), cache)
}
