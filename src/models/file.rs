//! Local file entry model.

/// A file resolved from a user-supplied path, ready to be queued or uploaded.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
}
