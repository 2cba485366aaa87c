//! Upload engine: sends local files to a chat.
//!
//! Files over the Bot API limit are split into `<name>.part<N>` documents
//! when a split size is configured. Several files are uploaded one after the
//! other, or up to `MAX_CONCURRENT_TRANSFERS` at once when `parallel_upload`
//! is enabled.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::Semaphore;

use crate::api::{Message, SendFileParams, TelegramApi, MAX_UPLOAD_SIZE};
use crate::error::AppError;
use crate::events::{self, TRANSFER_ERROR};
use crate::models::file::FileEntry;
use crate::models::history::{Direction, HistoryRecord};
use crate::models::transfer::{ChatRef, MediaKind, UploadOptions};
use crate::services::progress::TransferKind;
use crate::services::retry_engine::{self, TransferErrorPayload};
use crate::services::{file_tools, TransferContext, MAX_CONCURRENT_TRANSFERS};
use crate::storage::{captions, history};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub file_name: String,
    pub file_size: u64,
    /// One id per message; several when the file was split.
    pub message_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpload {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub uploaded: Vec<UploadOutcome>,
    pub failed: Vec<FailedUpload>,
}

/// Name shown in the chat: the optional prefix followed by the file name.
pub fn display_name(path: &Path, options: &UploadOptions) -> crate::error::Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::InvalidInput(format!("Invalid file name: {}", path.display())))?;
    Ok(format!(
        "{}{}",
        options.prefix.as_deref().unwrap_or_default(),
        name
    ))
}

/// Caption precedence: file stem, explicit caption, then template text.
pub fn resolve_caption(
    ctx: &TransferContext,
    path: &Path,
    options: &UploadOptions,
) -> crate::error::Result<Option<String>> {
    if options.filename_caption {
        return Ok(path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string()));
    }
    if let Some(caption) = options.caption.as_deref().filter(|c| !c.is_empty()) {
        return Ok(Some(caption.to_string()));
    }
    match options.caption_template.as_deref() {
        Some(name) => Ok(Some(captions::get_text(&ctx.paths, name)?).filter(|t| !t.is_empty())),
        None => Ok(None),
    }
}

struct Outgoing<'a> {
    chat: &'a ChatRef,
    path: &'a Path,
    file_name: String,
    kind: MediaKind,
    caption: Option<String>,
    thumbnail: Option<PathBuf>,
}

/// Send one file through the retry engine with a registered progress counter.
async fn send<A: TelegramApi>(
    api: &A,
    ctx: &TransferContext,
    options: &UploadOptions,
    outgoing: Outgoing<'_>,
) -> crate::error::Result<Message> {
    let size = tokio::fs::metadata(outgoing.path).await?.len();
    let transfer_id = uuid::Uuid::new_v4().simple().to_string();
    let counter = ctx
        .progress
        .register(&transfer_id, TransferKind::Upload, &outgoing.file_name, size)
        .await;

    let params = SendFileParams {
        chat: outgoing.chat.clone(),
        path: outgoing.path.to_path_buf(),
        file_name: outgoing.file_name.clone(),
        kind: outgoing.kind,
        caption: outgoing.caption,
        silent: options.silent,
        protect: options.protect,
        spoiler: options.spoiler,
        thumbnail: outgoing.thumbnail,
        chunk_size: ctx.config.effective_chunk_size(),
        progress: counter,
    };
    let result = retry_engine::retry(
        &ctx.retry,
        &ctx.cancel,
        ctx.sink(),
        &outgoing.file_name,
        || api.send_file(params.clone()),
    )
    .await;
    ctx.progress.remove(&transfer_id).await;

    if let Err(e) = &result {
        events::emit(
            ctx.sink(),
            TRANSFER_ERROR,
            &TransferErrorPayload {
                label: outgoing.file_name.clone(),
                error_message: e.to_string(),
            },
        );
    }
    result
}

/// Upload a single file, splitting it when it exceeds the upload limit.
pub async fn upload_file<A: TelegramApi>(
    api: &A,
    ctx: &TransferContext,
    chat: &ChatRef,
    path: &Path,
    options: &UploadOptions,
) -> crate::error::Result<UploadOutcome> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| AppError::Io(format!("Path does not exist: {}", path.display())))?;
    if !metadata.is_file() {
        return Err(AppError::InvalidInput(format!(
            "Not a regular file: {}",
            path.display()
        )));
    }
    let file_size = metadata.len();
    let file_name = display_name(path, options)?;
    let caption = resolve_caption(ctx, path, options)?;
    let thumbnail = match options.thumbnail.as_deref() {
        Some(thumb) if !Path::new(thumb).is_file() => {
            return Err(AppError::InvalidInput(format!(
                "Thumbnail does not exist: {}",
                thumb
            )))
        }
        Some(thumb) => Some(PathBuf::from(thumb)),
        None => None,
    };

    let message_ids = if file_size > MAX_UPLOAD_SIZE {
        upload_split(api, ctx, chat, path, &file_name, file_size, caption, options).await?
    } else {
        let kind = options.send_as.resolve(path);
        log::info!(
            "Uploading {} ({} bytes) as {:?} to {}",
            file_name,
            file_size,
            kind,
            chat
        );
        let message = send(
            api,
            ctx,
            options,
            Outgoing {
                chat,
                path,
                file_name: file_name.clone(),
                kind,
                caption,
                thumbnail,
            },
        )
        .await?;
        vec![message.message_id]
    };

    // The file is in the chat from here on; local bookkeeping must not fail it.
    if options.delete_original {
        match tokio::fs::remove_file(path).await {
            Ok(()) => log::info!("Deleted original {}", path.display()),
            Err(e) => log::warn!("Could not delete original {}: {}", path.display(), e),
        }
    }

    if let Err(e) = history::add_record(
        &ctx.paths,
        HistoryRecord::new(
            Direction::Upload,
            &file_name,
            file_size,
            chat.to_string(),
            message_ids.first().copied(),
        ),
    ) {
        log::warn!("Could not record {} in history: {}", file_name, e);
    }
    log::info!("Uploaded {} ({} message(s))", file_name, message_ids.len());

    Ok(UploadOutcome {
        file_name,
        file_size,
        message_ids,
    })
}

#[allow(clippy::too_many_arguments)]
async fn upload_split<A: TelegramApi>(
    api: &A,
    ctx: &TransferContext,
    chat: &ChatRef,
    path: &Path,
    file_name: &str,
    file_size: u64,
    caption: Option<String>,
    options: &UploadOptions,
) -> crate::error::Result<Vec<i64>> {
    if options.split_size == 0 {
        return Err(AppError::FileTooLarge {
            size: file_size,
            limit: MAX_UPLOAD_SIZE,
        });
    }
    if options.split_size > MAX_UPLOAD_SIZE {
        return Err(AppError::InvalidInput(format!(
            "Split size {} exceeds the {} byte upload limit",
            options.split_size, MAX_UPLOAD_SIZE
        )));
    }

    let staging = ctx
        .paths
        .root
        .join("staging")
        .join(uuid::Uuid::new_v4().simple().to_string());
    let result = async {
        let parts = file_tools::split_file(
            path,
            &staging,
            options.split_size,
            ctx.config.effective_chunk_size(),
        )
        .await?;
        let mut ids = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let part_name = format!("{}.part{}", file_name, i + 1);
            log::info!("Uploading part {}/{}: {}", i + 1, parts.len(), part_name);
            let message = send(
                api,
                ctx,
                options,
                Outgoing {
                    chat,
                    path: part,
                    file_name: part_name,
                    kind: MediaKind::Document,
                    caption: if i == 0 { caption.clone() } else { None },
                    thumbnail: None,
                },
            )
            .await?;
            ids.push(message.message_id);
        }
        Ok::<_, AppError>(ids)
    }
    .await;

    if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
        log::warn!("Failed to remove staging dir {}: {}", staging.display(), e);
    }
    result
}

/// Upload several files. Failures are recorded and the remaining files continue;
/// cancellation stops the run.
pub async fn upload_files<A: TelegramApi>(
    api: &A,
    ctx: &TransferContext,
    chat: &ChatRef,
    files: &[FileEntry],
    options: &UploadOptions,
) -> UploadReport {
    let mut report = UploadReport::default();

    if !ctx.config.parallel_upload {
        for file in files {
            if ctx.is_cancelled() {
                break;
            }
            let result = upload_file(api, ctx, chat, Path::new(&file.file_path), options).await;
            record(&mut report, file, result);
        }
        return report;
    }

    let semaphore = Semaphore::new(MAX_CONCURRENT_TRANSFERS);
    let semaphore = &semaphore;
    let results = futures::future::join_all(files.iter().map(|file| async move {
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|e| AppError::Internal(format!("Semaphore error: {}", e)))?;
        upload_file(api, ctx, chat, Path::new(&file.file_path), options).await
    }))
    .await;
    for (file, result) in files.iter().zip(results) {
        record(&mut report, file, result);
    }
    report
}

fn record(
    report: &mut UploadReport,
    file: &FileEntry,
    result: crate::error::Result<UploadOutcome>,
) {
    match result {
        Ok(outcome) => report.uploaded.push(outcome),
        Err(e) => {
            log::error!("Error uploading {}: {}", file.file_path, e);
            report.failed.push(FailedUpload {
                path: file.file_path.clone(),
                error: e.to_string(),
            });
        }
    }
}
