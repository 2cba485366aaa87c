use serde::{Deserialize, Serialize};

use crate::models::transfer::UploadOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Success,
    Failed,
    Skipped,
}

/// One file in the batch queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTask {
    pub path: String,
    pub file_size: u64,
    pub status: TaskStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl BatchTask {
    pub fn new(path: impl Into<String>, file_size: u64) -> Self {
        Self {
            path: path.into(),
            file_size,
            status: TaskStatus::Pending,
            attempts: 0,
            message_id: None,
            error: None,
            updated_at: None,
        }
    }

    pub fn mark(&mut self, status: TaskStatus, message_id: Option<i64>, error: Option<String>) {
        self.status = status;
        self.message_id = message_id;
        self.error = error;
        self.updated_at = Some(chrono::Utc::now().to_rfc3339());
    }

    /// Whether a run should pick this task up.
    pub fn is_runnable(&self, retry_failed: bool) -> bool {
        match self.status {
            TaskStatus::Pending => true,
            TaskStatus::Failed => retry_failed,
            TaskStatus::Success | TaskStatus::Skipped => false,
        }
    }
}

/// The persisted batch upload queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub id: String,
    pub created_at: String,
    /// Destination chat in `ChatRef` text form.
    pub chat: String,
    #[serde(default)]
    pub options: UploadOptions,
    #[serde(default)]
    pub tasks: Vec<BatchTask>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub pending: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchJob {
    pub fn new(chat: impl Into<String>, options: UploadOptions) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            chat: chat.into(),
            options,
            tasks: Vec::new(),
        }
    }

    /// Append a task unless its path is already queued. Returns whether it was added.
    pub fn push(&mut self, task: BatchTask) -> bool {
        if self.tasks.iter().any(|t| t.path == task.path) {
            return false;
        }
        self.tasks.push(task);
        true
    }

    /// Remove the task at a 1-based position.
    pub fn remove(&mut self, position: usize) -> Option<BatchTask> {
        if position == 0 || position > self.tasks.len() {
            return None;
        }
        Some(self.tasks.remove(position - 1))
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.tasks.len(),
            ..BatchSummary::default()
        };
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::Success => summary.success += 1,
                TaskStatus::Failed => summary.failed += 1,
                TaskStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.status != TaskStatus::Pending)
    }
}
