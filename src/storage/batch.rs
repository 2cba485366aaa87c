use crate::error::AppError;
use crate::models::batch::BatchJob;
use crate::storage::{read_json, remove_file, write_json, AppPaths};

/// The saved batch, if any.
pub fn load(paths: &AppPaths) -> crate::error::Result<Option<BatchJob>> {
    read_json(&paths.batch_file())
}

/// The saved batch, failing when there is nothing to resume.
pub fn load_for_resume(paths: &AppPaths) -> crate::error::Result<BatchJob> {
    load(paths)?.ok_or_else(|| {
        AppError::Storage(format!(
            "No batch state to resume: {} does not exist",
            paths.batch_file().display()
        ))
    })
}

/// Persist the batch. Called after every task status change.
pub fn save(paths: &AppPaths, job: &BatchJob) -> crate::error::Result<()> {
    write_json(&paths.batch_file(), job)
}

/// Drop the saved batch. Returns whether one existed.
pub fn discard(paths: &AppPaths) -> crate::error::Result<bool> {
    remove_file(&paths.batch_file())
}
