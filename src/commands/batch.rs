//! Batch queue command handlers.

use std::path::PathBuf;

use clap::Subcommand;

use crate::commands::files::resolve_paths;
use crate::commands::upload::UploadFlags;
use crate::commands::{network, target_chat, with_progress, AppState};
use crate::error::AppError;
use crate::models::batch::{BatchJob, TaskStatus};
use crate::services::batch_runner;
use crate::storage::{batch as batch_store, AppPaths};

#[derive(Debug, Subcommand)]
pub enum BatchCommand {
    /// Queue files or folders. Creates the queue on first use.
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Destination chat for a new queue; defaults to `default_chat`.
        #[arg(long, short = 'c')]
        chat: Option<String>,
        #[arg(long, short = 'r')]
        recursive: bool,
        #[command(flatten)]
        flags: UploadFlags,
    },
    /// Remove the task at a 1-based position.
    Remove { position: usize },
    /// Remove every task, keeping chat and options.
    Clear,
    /// Print the queue and its status counts.
    Show,
    /// Run the queued tasks from the top.
    Start,
    /// Continue an interrupted run.
    Resume {
        /// Also re-run tasks that failed.
        #[arg(long)]
        retry_failed: bool,
    },
    /// Delete the saved queue.
    Discard,
}

fn require_job(paths: &AppPaths) -> crate::error::Result<BatchJob> {
    batch_store::load(paths)?
        .ok_or_else(|| AppError::InvalidInput("The batch queue is empty; use `batch add`".into()))
}

pub async fn batch(cmd: BatchCommand, state: &AppState) -> crate::error::Result<()> {
    match cmd {
        BatchCommand::Add {
            paths,
            chat,
            recursive,
            flags,
        } => {
            let config = state.config()?;
            let files = resolve_paths(paths, recursive).await?;
            let mut job = match batch_store::load(&state.paths)? {
                Some(job) => {
                    if let Some(chat) = chat.as_deref() {
                        let requested = chat.parse::<crate::models::transfer::ChatRef>()?;
                        if requested.to_string() != job.chat {
                            return Err(AppError::InvalidInput(format!(
                                "The queue targets {}; discard it before queueing for {}",
                                job.chat, requested
                            )));
                        }
                    }
                    job
                }
                None => {
                    let chat = target_chat(chat.as_deref(), &config)?;
                    BatchJob::new(chat.to_string(), flags.into_options()?)
                }
            };
            let added = batch_runner::add_files(&mut job, &files);
            batch_store::save(&state.paths, &job)?;
            log::info!(
                "Queued {} file(s), {} already present; {} task(s) total",
                added,
                files.len() - added,
                job.tasks.len()
            );
        }
        BatchCommand::Remove { position } => {
            let mut job = require_job(&state.paths)?;
            let task = job.remove(position).ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "No task at position {}; the queue has {}",
                    position,
                    job.tasks.len()
                ))
            })?;
            batch_store::save(&state.paths, &job)?;
            log::info!("Removed {}", task.path);
        }
        BatchCommand::Clear => {
            let mut job = require_job(&state.paths)?;
            job.tasks.clear();
            batch_store::save(&state.paths, &job)?;
            log::info!("Batch queue cleared");
        }
        BatchCommand::Show => show(&require_job(&state.paths)?),
        BatchCommand::Start => {
            let mut job = require_job(&state.paths)?;
            for task in &mut job.tasks {
                task.attempts = 0;
                task.mark(TaskStatus::Pending, None, None);
            }
            run(job, false, state).await?;
        }
        BatchCommand::Resume { retry_failed } => {
            let job = batch_store::load_for_resume(&state.paths)?;
            run(job, retry_failed, state).await?;
        }
        BatchCommand::Discard => {
            if batch_store::discard(&state.paths)? {
                log::info!("Batch queue discarded");
            } else {
                log::info!("There was no batch queue");
            }
        }
    }
    Ok(())
}

async fn run(job: BatchJob, retry_failed: bool, state: &AppState) -> crate::error::Result<()> {
    if job.tasks.is_empty() {
        return Err(AppError::InvalidInput("The batch queue has no tasks".into()));
    }
    let api = network::connect(state)?;
    let ctx = state.context(state.config()?);
    let finished = with_progress(&ctx, batch_runner::run(&api, &ctx, job, retry_failed)).await?;
    show(&finished);
    if ctx.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    Ok(())
}

fn show(job: &BatchJob) {
    println!("Batch {} -> {} (created {})", job.id, job.chat, job.created_at);
    for (i, task) in job.tasks.iter().enumerate() {
        let status = match task.status {
            TaskStatus::Pending => "pending",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        };
        match &task.error {
            Some(error) => println!("{:>4}. [{}] {} ({})", i + 1, status, task.path, error),
            None => println!("{:>4}. [{}] {}", i + 1, status, task.path),
        }
    }
    let summary = job.summary();
    println!(
        "{} total: {} pending, {} success, {} failed, {} skipped",
        summary.total, summary.pending, summary.success, summary.failed, summary.skipped
    );
}
