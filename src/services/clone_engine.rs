//! Channel clone: copies a message-id range between chats.

use std::time::Duration;

use serde::Serialize;

use crate::api::TelegramApi;
use crate::error::AppError;
use crate::events::{self, CLONE_PROGRESS};
use crate::models::transfer::ChatRef;
use crate::services::{retry_engine, TransferContext};

#[derive(Debug, Clone)]
pub struct CloneRequest {
    pub source: ChatRef,
    pub destination: ChatRef,
    pub start_id: i64,
    pub end_id: i64,
    pub silent: bool,
}

impl CloneRequest {
    fn validate(&self) -> crate::error::Result<()> {
        if self.start_id <= 0 || self.end_id <= 0 {
            return Err(AppError::InvalidInput(
                "Message ids must be positive".into(),
            ));
        }
        if self.start_id > self.end_id {
            return Err(AppError::InvalidInput(format!(
                "Start id {} is after end id {}",
                self.start_id, self.end_id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneOutcome {
    Copied,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneProgressPayload {
    pub message_id: i64,
    pub outcome: CloneOutcome,
    pub processed: u64,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneReport {
    pub copied: u64,
    pub skipped: u64,
    pub failed: u64,
    pub deleted: u64,
    /// Last source id that was processed, if any.
    pub last_id: Option<i64>,
    pub cancelled: bool,
}

/// Errors meaning the id holds nothing copyable (deleted, service message, ...).
fn is_uncopyable(err: &AppError) -> bool {
    match err {
        AppError::Api { code: 400, description } => {
            let description = description.to_ascii_lowercase();
            description.contains("not found") || description.contains("can't be copied")
        }
        _ => false,
    }
}

/// Copy `start_id..=end_id` in ascending order.
///
/// Sleeps `clone_sleep_interval` seconds between messages. With
/// `auto_delete_clone` each source message is deleted once its copy exists.
pub async fn clone_range<A: TelegramApi>(
    api: &A,
    ctx: &TransferContext,
    request: &CloneRequest,
) -> crate::error::Result<CloneReport> {
    request.validate()?;
    let total = (request.end_id - request.start_id + 1) as u64;
    let interval = Duration::from_secs(ctx.config.clone_sleep_interval);
    let mut report = CloneReport::default();

    log::info!(
        "Cloning {} message(s) {}..={} from {} to {}",
        total,
        request.start_id,
        request.end_id,
        request.source,
        request.destination
    );

    for message_id in request.start_id..=request.end_id {
        if message_id != request.start_id && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        if ctx.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let label = format!("copy {}", message_id);
        let result = retry_engine::retry(&ctx.retry, &ctx.cancel, ctx.sink(), &label, || {
            api.copy_message(
                &request.destination,
                &request.source,
                message_id,
                request.silent,
            )
        })
        .await;

        let (outcome, error) = match result {
            Ok(new_id) => {
                log::debug!("Copied {} as {}", message_id, new_id);
                report.copied += 1;
                if ctx.config.auto_delete_clone {
                    match api.delete_message(&request.source, message_id).await {
                        Ok(()) => report.deleted += 1,
                        Err(e) => log::warn!(
                            "Copied {} but could not delete the source: {}",
                            message_id,
                            e
                        ),
                    }
                }
                (CloneOutcome::Copied, None)
            }
            Err(AppError::Cancelled) => {
                report.cancelled = true;
                break;
            }
            Err(e) if is_uncopyable(&e) => {
                log::info!("Skipping {}: {}", message_id, e);
                report.skipped += 1;
                (CloneOutcome::Skipped, Some(e.to_string()))
            }
            Err(e) => {
                log::error!("Failed to copy {}: {}", message_id, e);
                report.failed += 1;
                (CloneOutcome::Failed, Some(e.to_string()))
            }
        };
        report.last_id = Some(message_id);

        events::emit(
            ctx.sink(),
            CLONE_PROGRESS,
            &CloneProgressPayload {
                message_id,
                outcome,
                processed: (message_id - request.start_id + 1) as u64,
                total,
                error,
            },
        );
    }

    log::info!(
        "Clone finished: {} copied, {} skipped, {} failed, {} deleted",
        report.copied,
        report.skipped,
        report.failed,
        report.deleted
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::api::mock::MockApi;
    use crate::services::testing::context;

    fn request(start_id: i64, end_id: i64) -> CloneRequest {
        CloneRequest {
            source: "@source".parse().unwrap(),
            destination: "@dest".parse().unwrap(),
            start_id,
            end_id,
            silent: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn copies_in_order_and_skips_missing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, ctx) = context(dir.path());
        let api = MockApi::default();
        api.add_text_message(1);
        api.add_text_message(3);

        let report = clone_range(&api, &ctx, &request(1, 3)).await.unwrap();
        assert_eq!(
            api.calls(),
            vec![
                "copy:1:@source->@dest",
                "copy:2:@source->@dest",
                "copy:3:@source->@dest"
            ]
        );
        assert_eq!(report.copied, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.last_id, Some(3));
        assert!(api.deleted.lock().unwrap().is_empty());
        assert_eq!(
            sink.names().iter().filter(|n| *n == CLONE_PROGRESS).count(),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_between_messages_but_not_after_the_last() {
        let dir = tempfile::tempdir().unwrap();
        let (_sink, mut ctx) = context(dir.path());
        ctx.config.clone_sleep_interval = 2;
        let api = MockApi::default();
        for id in 10..=12 {
            api.add_text_message(id);
        }

        let started = tokio::time::Instant::now();
        clone_range(&api, &ctx, &request(10, 12)).await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4));
        assert!(elapsed < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn deletes_sources_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let (_sink, mut ctx) = context(dir.path());
        ctx.config.auto_delete_clone = true;
        let api = MockApi::default();
        api.add_text_message(5);
        api.add_text_message(7);

        let report = clone_range(&api, &ctx, &request(5, 7)).await.unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(
            *api.deleted.lock().unwrap(),
            vec![("@source".to_string(), 5), ("@source".to_string(), 7)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_fail_and_cloning_continues() {
        let dir = tempfile::tempdir().unwrap();
        let (_sink, ctx) = context(dir.path());
        let api = MockApi::default();
        api.add_text_message(1);
        api.add_text_message(2);
        api.fail_copy(
            1,
            AppError::Api {
                code: 403,
                description: "Forbidden: bot is not a member of the channel chat".into(),
            },
        );

        let report = clone_range(&api, &ctx, &request(1, 2)).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.copied, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_then_copies() {
        let dir = tempfile::tempdir().unwrap();
        let (_sink, ctx) = context(dir.path());
        let api = MockApi::default();
        api.add_text_message(1);
        api.fail_copy(1, AppError::RateLimited { retry_after: 20 });

        let started = tokio::time::Instant::now();
        let report = clone_range(&api, &ctx, &request(1, 1)).await.unwrap();
        assert_eq!(report.copied, 1);
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn cancelled_before_start_copies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (_sink, ctx) = context(dir.path());
        ctx.cancel.store(true, Ordering::Relaxed);
        let api = MockApi::default();

        let report = clone_range(&api, &ctx, &request(1, 5)).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.last_id, None);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn rejects_inverted_range() {
        let dir = tempfile::tempdir().unwrap();
        let (_sink, ctx) = context(dir.path());
        let api = MockApi::default();
        let err = clone_range(&api, &ctx, &request(9, 3)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
