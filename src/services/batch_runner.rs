//! Batch runner: drives the persisted upload queue.
//!
//! The queue is written to batch.json after every status change, so an
//! interrupted run resumes from the last finished task. `success` and
//! `skipped` tasks never run again; `failed` tasks only with `retry_failed`.

use std::path::Path;

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};

use crate::api::{TelegramApi, MAX_UPLOAD_SIZE};
use crate::error::AppError;
use crate::events::{self, BATCH_PROGRESS};
use crate::models::batch::{BatchJob, BatchSummary, BatchTask, TaskStatus};
use crate::models::file::FileEntry;
use crate::models::transfer::ChatRef;
use crate::services::{upload_engine, TransferContext, MAX_CONCURRENT_TRANSFERS};
use crate::storage::batch as batch_store;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgressPayload {
    pub job_id: String,
    /// 1-based queue position.
    pub position: usize,
    pub path: String,
    pub status: TaskStatus,
    pub summary: BatchSummary,
}

/// Queue `files` in order, ignoring paths already queued. Returns how many were added.
pub fn add_files(job: &mut BatchJob, files: &[FileEntry]) -> usize {
    files
        .iter()
        .filter(|f| job.push(BatchTask::new(f.file_path.clone(), f.file_size)))
        .count()
}

/// Why a task cannot be sent at all, if so.
fn skip_reason(path: &Path, split_size: u64) -> Option<String> {
    match std::fs::metadata(path) {
        Ok(m) if !m.is_file() => Some("not a regular file".into()),
        Ok(m) if m.len() > MAX_UPLOAD_SIZE && split_size == 0 => Some(format!(
            "{} bytes exceeds the {} byte upload limit",
            m.len(),
            MAX_UPLOAD_SIZE
        )),
        Ok(_) => None,
        Err(_) => Some("file not found".into()),
    }
}

/// Run every runnable task and return the final job state.
///
/// Cancellation leaves the interrupted task `pending` and stops the run.
pub async fn run<A: TelegramApi>(
    api: &A,
    ctx: &TransferContext,
    mut job: BatchJob,
    retry_failed: bool,
) -> crate::error::Result<BatchJob> {
    let chat: ChatRef = job.chat.parse()?;
    let runnable: Vec<usize> = job
        .tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_runnable(retry_failed))
        .map(|(i, _)| i)
        .collect();
    for &i in &runnable {
        if job.tasks[i].status == TaskStatus::Failed {
            job.tasks[i].mark(TaskStatus::Pending, None, None);
        }
    }
    batch_store::save(&ctx.paths, &job)?;
    log::info!(
        "Batch {}: {} of {} task(s) to run",
        job.id,
        runnable.len(),
        job.tasks.len()
    );

    let shared = Mutex::new(job);
    let shared = &shared;
    let chat = &chat;

    if !ctx.config.parallel_upload {
        for &index in &runnable {
            match run_task(api, ctx, chat, shared, index).await {
                Err(AppError::Cancelled) => break,
                Err(e) => return Err(e),
                Ok(()) => {}
            }
        }
    } else {
        let semaphore = Semaphore::new(MAX_CONCURRENT_TRANSFERS);
        let semaphore = &semaphore;
        let results = futures::future::join_all(runnable.iter().map(|&index| async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| AppError::Internal(format!("Semaphore error: {}", e)))?;
            run_task(api, ctx, chat, shared, index).await
        }))
        .await;
        for result in results {
            match result {
                Ok(()) | Err(AppError::Cancelled) => {}
                Err(e) => return Err(e),
            }
        }
    }

    let job = shared.lock().await.clone();
    let summary = job.summary();
    log::info!(
        "Batch {} finished: {} success, {} failed, {} skipped, {} pending",
        job.id,
        summary.success,
        summary.failed,
        summary.skipped,
        summary.pending
    );
    Ok(job)
}

/// Upload one task and persist its new status. Only storage failures and
/// cancellation are returned as errors; upload errors mark the task `failed`.
async fn run_task<A: TelegramApi>(
    api: &A,
    ctx: &TransferContext,
    chat: &ChatRef,
    shared: &Mutex<BatchJob>,
    index: usize,
) -> crate::error::Result<()> {
    if ctx.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    let (path, options) = {
        let mut job = shared.lock().await;
        let options = job.options.clone();
        let task = &mut job.tasks[index];
        task.attempts += 1;
        (task.path.clone(), options)
    };

    let (status, message_id, error) = match skip_reason(Path::new(&path), options.split_size) {
        Some(reason) => {
            log::warn!("Skipping {}: {}", path, reason);
            (TaskStatus::Skipped, None, Some(reason))
        }
        None => match upload_engine::upload_file(api, ctx, chat, Path::new(&path), &options).await
        {
            Ok(outcome) => (TaskStatus::Success, outcome.message_ids.first().copied(), None),
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => (TaskStatus::Failed, None, Some(e.to_string())),
        },
    };

    let mut job = shared.lock().await;
    job.tasks[index].mark(status, message_id, error);
    batch_store::save(&ctx.paths, &job)?;
    events::emit(
        ctx.sink(),
        BATCH_PROGRESS,
        &BatchProgressPayload {
            job_id: job.id.clone(),
            position: index + 1,
            path,
            status,
            summary: job.summary(),
        },
    );
    Ok(())
}
