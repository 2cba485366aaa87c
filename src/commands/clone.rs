use clap::Args;

use crate::commands::{network, AppState};
use crate::error::AppError;
use crate::services::clone_engine::{self, CloneRequest};

#[derive(Debug, Args)]
pub struct CloneArgs {
    /// Chat to copy from.
    pub source: String,
    /// Chat to copy into.
    pub destination: String,
    /// First message id.
    pub start: i64,
    /// Last message id (inclusive).
    pub end: i64,
    /// Send copies without notification.
    #[arg(long)]
    pub silent: bool,
    /// Override `clone_sleep_interval` (seconds).
    #[arg(long)]
    pub sleep: Option<u64>,
    /// Delete each source message once copied, regardless of `auto_delete_clone`.
    #[arg(long)]
    pub delete_source: bool,
}

pub async fn clone(args: CloneArgs, state: &AppState) -> crate::error::Result<()> {
    let mut config = state.config()?;
    if let Some(sleep) = args.sleep {
        config.clone_sleep_interval = sleep;
    }
    if args.delete_source {
        config.auto_delete_clone = true;
    }
    let request = CloneRequest {
        source: args.source.parse()?,
        destination: args.destination.parse()?,
        start_id: args.start,
        end_id: args.end,
        silent: args.silent,
    };
    let api = network::connect(state)?;
    let ctx = state.context(config);

    let report = clone_engine::clone_range(&api, &ctx, &request).await?;
    println!(
        "copied {}, skipped {}, failed {}, deleted {}",
        report.copied, report.skipped, report.failed, report.deleted
    );
    if report.cancelled {
        if let Some(last) = report.last_id {
            println!("stopped after message {}; restart from {}", last, last + 1);
        }
        return Err(AppError::Cancelled);
    }
    Ok(())
}
