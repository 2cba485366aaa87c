use crate::models::history::HistoryRecord;
use crate::storage::{AppPaths, JsonStore};

const RECORDS_KEY: &str = "records";
/// Oldest records beyond this count are dropped on insert.
pub const MAX_RECORDS: usize = 500;

/// Add a history record (newest first) and persist to disk immediately.
pub fn add_record(paths: &AppPaths, record: HistoryRecord) -> crate::error::Result<()> {
    let mut store = JsonStore::open(paths.history_file())?;
    let mut records = load_records(&store);
    records.insert(0, record); // newest first
    records.truncate(MAX_RECORDS);
    store.set(RECORDS_KEY, serde_json::to_value(&records)?);
    store.save()
}

/// Get all history records (already ordered newest first).
pub fn get_all(paths: &AppPaths) -> crate::error::Result<Vec<HistoryRecord>> {
    let store = JsonStore::open(paths.history_file())?;
    Ok(load_records(&store))
}

/// Delete a history record by ID. Silently ignores non-existent IDs.
pub fn delete_record(paths: &AppPaths, id: &str) -> crate::error::Result<()> {
    let mut store = JsonStore::open(paths.history_file())?;
    let mut records = load_records(&store);
    records.retain(|r| r.id != id);
    store.set(RECORDS_KEY, serde_json::to_value(&records)?);
    store.save()
}

pub fn clear(paths: &AppPaths) -> crate::error::Result<()> {
    let mut store = JsonStore::open(paths.history_file())?;
    store.set(RECORDS_KEY, serde_json::Value::Array(Vec::new()));
    store.save()
}

/// Load records from store, returning empty vec if key does not exist.
fn load_records(store: &JsonStore) -> Vec<HistoryRecord> {
    store
        .get(RECORDS_KEY)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}
