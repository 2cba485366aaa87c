//! Download engine: fetches media referenced by message links or ids.
//!
//! The Bot API cannot read arbitrary messages, so each message is forwarded
//! into the relay chat first. The forwarded copy exposes the media `file_id`,
//! which `getFile` turns into a downloadable path. The relayed copy is deleted
//! once the file is on disk.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::Semaphore;

use crate::api::link::MessageLink;
use crate::api::{DownloadParams, MediaRef, TelegramApi, MAX_DOWNLOAD_SIZE};
use crate::error::AppError;
use crate::events::{self, TRANSFER_ERROR};
use crate::models::history::{Direction, HistoryRecord};
use crate::models::transfer::ChatRef;
use crate::services::progress::TransferKind;
use crate::services::retry_engine::{self, TransferErrorPayload};
use crate::services::{TransferContext, MAX_CONCURRENT_TRANSFERS};
use crate::storage::history;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutcome {
    pub source: String,
    pub path: PathBuf,
    pub file_size: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDownload {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReport {
    pub downloaded: Vec<DownloadOutcome>,
    pub failed: Vec<FailedDownload>,
}

/// Configured download directory, relative paths taken from the app dir.
pub fn download_dir(ctx: &TransferContext) -> PathBuf {
    ctx.paths.resolve(&ctx.config.default_download_path)
}

pub fn relay_chat(ctx: &TransferContext) -> crate::error::Result<ChatRef> {
    ctx.config
        .relay_chat
        .as_deref()
        .ok_or_else(|| {
            AppError::Config(
                "relay_chat is not set; run `config set relay_chat <chat>` with a chat the bot can post in"
                    .into(),
            )
        })?
        .parse()
}

/// Replace characters that cannot appear in a file name.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Create an empty file at the first free name `name`, `name (1)`, `name (2)`...
/// Creation is atomic, so concurrent downloads never share a target.
pub fn reserve_path(dir: &Path, name: &str) -> crate::error::Result<PathBuf> {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    for n in 0u32.. {
        let candidate = match (n, ext) {
            (0, _) => name.to_string(),
            (n, Some(ext)) => format!("{} ({}).{}", stem, n, ext),
            (n, None) => format!("{} ({})", stem, n),
        };
        let path = dir.join(candidate);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(AppError::Internal(format!("No free file name for {}", name)))
}

async fn delete_relayed<A: TelegramApi>(api: &A, relay: &ChatRef, message_id: i64) {
    if let Err(e) = api.delete_message(relay, message_id).await {
        log::warn!("Failed to delete relayed message {}: {}", message_id, e);
    }
}

/// Download the media of one message into `dest_dir`.
pub async fn download_message<A: TelegramApi>(
    api: &A,
    ctx: &TransferContext,
    relay: &ChatRef,
    target: &MessageLink,
    dest_dir: &Path,
) -> crate::error::Result<DownloadOutcome> {
    let source = format!("{}/{}", target.chat, target.message_id);
    let relayed = retry_engine::retry(&ctx.retry, &ctx.cancel, ctx.sink(), &source, || {
        api.forward_message(relay, &target.chat, target.message_id)
    })
    .await?;

    let result = fetch_media(api, ctx, &source, target, relayed.media, dest_dir).await;
    delete_relayed(api, relay, relayed.message_id).await;

    if let Err(e) = &result {
        events::emit(
            ctx.sink(),
            TRANSFER_ERROR,
            &TransferErrorPayload {
                label: source.clone(),
                error_message: e.to_string(),
            },
        );
    }
    result
}

async fn fetch_media<A: TelegramApi>(
    api: &A,
    ctx: &TransferContext,
    source: &str,
    target: &MessageLink,
    media: Option<MediaRef>,
    dest_dir: &Path,
) -> crate::error::Result<DownloadOutcome> {
    let media = media.ok_or(AppError::NoMedia {
        message_id: target.message_id,
    })?;
    if let Some(size) = media.file_size.filter(|s| *s > MAX_DOWNLOAD_SIZE) {
        return Err(AppError::FileTooLarge {
            size,
            limit: MAX_DOWNLOAD_SIZE,
        });
    }

    let remote = retry_engine::retry(&ctx.retry, &ctx.cancel, ctx.sink(), source, || {
        api.get_file(&media.file_id)
    })
    .await?;
    let remote_path = remote.file_path.ok_or_else(|| AppError::Api {
        code: 400,
        description: format!("Telegram returned no file path for {}", source),
    })?;

    tokio::fs::create_dir_all(dest_dir).await?;
    let name = sanitize_file_name(&media.suggested_name(target.message_id));
    let dest = reserve_path(dest_dir, &name)?;
    let total = remote.file_size.or(media.file_size).unwrap_or(0);

    let transfer_id = uuid::Uuid::new_v4().simple().to_string();
    let counter = ctx
        .progress
        .register(&transfer_id, TransferKind::Download, &name, total)
        .await;
    let params = DownloadParams {
        remote_path,
        dest: dest.clone(),
        chunk_size: ctx.config.effective_chunk_size(),
        progress: counter,
    };
    log::info!("Downloading {} to {}", source, dest.display());
    let result = retry_engine::retry(&ctx.retry, &ctx.cancel, ctx.sink(), source, || {
        api.download_file(params.clone())
    })
    .await;
    ctx.progress.remove(&transfer_id).await;

    let file_size = match result {
        Ok(size) => size,
        Err(e) => {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(e);
        }
    };

    if let Err(e) = history::add_record(
        &ctx.paths,
        HistoryRecord::new(
            Direction::Download,
            dest.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or(name),
            file_size,
            dest.to_string_lossy().to_string(),
            Some(target.message_id),
        ),
    ) {
        log::warn!("Could not record {} in history: {}", dest.display(), e);
    }
    log::info!("Downloaded {} ({} bytes)", dest.display(), file_size);

    Ok(DownloadOutcome {
        source: source.to_string(),
        path: dest,
        file_size,
    })
}

/// Download every target. Failures are recorded and the rest continue.
pub async fn download_all<A: TelegramApi>(
    api: &A,
    ctx: &TransferContext,
    relay: &ChatRef,
    targets: &[MessageLink],
    dest_dir: &Path,
) -> DownloadReport {
    let mut report = DownloadReport::default();

    if !ctx.config.parallel_download {
        for target in targets {
            if ctx.is_cancelled() {
                break;
            }
            let result = download_message(api, ctx, relay, target, dest_dir).await;
            record(&mut report, target, result);
        }
        return report;
    }

    let semaphore = Semaphore::new(MAX_CONCURRENT_TRANSFERS);
    let semaphore = &semaphore;
    let results = futures::future::join_all(targets.iter().map(|target| async move {
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|e| AppError::Internal(format!("Semaphore error: {}", e)))?;
        download_message(api, ctx, relay, target, dest_dir).await
    }))
    .await;
    for (target, result) in targets.iter().zip(results) {
        record(&mut report, target, result);
    }
    report
}

fn record(
    report: &mut DownloadReport,
    target: &MessageLink,
    result: crate::error::Result<DownloadOutcome>,
) {
    match result {
        Ok(outcome) => report.downloaded.push(outcome),
        Err(e) => {
            let source = format!("{}/{}", target.chat, target.message_id);
            log::error!("Error downloading {}: {}", source, e);
            report.failed.push(FailedDownload {
                source,
                error: e.to_string(),
            });
        }
    }
}
