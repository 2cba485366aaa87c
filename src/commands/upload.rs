//! Upload command handler.

use std::path::PathBuf;

use clap::Args;

use crate::commands::files::{parse_size, resolve_paths};
use crate::commands::{network, target_chat, with_progress, AppState};
use crate::error::AppError;
use crate::models::transfer::{SendAs, UploadOptions};
use crate::services::upload_engine;

/// Presentation options shared by `upload` and `batch`.
#[derive(Debug, Clone, Default, Args)]
pub struct UploadFlags {
    /// auto, photo, video, audio, voice, video-note, animation or document.
    #[arg(long = "as", default_value = "auto")]
    pub send_as: SendAs,
    #[arg(long)]
    pub caption: Option<String>,
    /// Caption template from captions.json, used when no caption is given.
    #[arg(long)]
    pub template: Option<String>,
    /// Use the file name without extension as caption.
    #[arg(long)]
    pub filename_caption: bool,
    /// Text prepended to the file name shown in the chat.
    #[arg(long)]
    pub prefix: Option<String>,
    /// Send without notification.
    #[arg(long)]
    pub silent: bool,
    /// Forbid forwarding and saving.
    #[arg(long)]
    pub protect: bool,
    /// Blur photos, videos and animations.
    #[arg(long)]
    pub spoiler: bool,
    /// Delete the local file after a successful upload.
    #[arg(long)]
    pub delete_original: bool,
    /// Thumbnail image for videos, audio and documents.
    #[arg(long)]
    pub thumbnail: Option<PathBuf>,
    /// Split files over the upload limit into parts of this size (e.g. `49M`).
    #[arg(long, value_parser = parse_size, default_value = "0")]
    pub split_size: u64,
}

impl UploadFlags {
    pub fn into_options(self) -> crate::error::Result<UploadOptions> {
        if self.filename_caption && self.caption.is_some() {
            return Err(AppError::InvalidInput(
                "--caption and --filename-caption are mutually exclusive".into(),
            ));
        }
        Ok(UploadOptions {
            send_as: self.send_as,
            caption: self.caption,
            caption_template: self.template,
            filename_caption: self.filename_caption,
            prefix: self.prefix,
            silent: self.silent,
            protect: self.protect,
            spoiler: self.spoiler,
            delete_original: self.delete_original,
            thumbnail: self
                .thumbnail
                .map(|p| p.to_string_lossy().to_string()),
            split_size: self.split_size,
        })
    }
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Files or folders to upload.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Destination chat (`@username` or numeric id); defaults to `default_chat`.
    #[arg(long, short = 'c')]
    pub chat: Option<String>,
    /// Include files in subfolders.
    #[arg(long, short = 'r')]
    pub recursive: bool,
    #[command(flatten)]
    pub flags: UploadFlags,
}

pub async fn upload(args: UploadArgs, state: &AppState) -> crate::error::Result<()> {
    let config = state.config()?;
    let chat = target_chat(args.chat.as_deref(), &config)?;
    let options = args.flags.into_options()?;
    let files = resolve_paths(args.paths, args.recursive).await?;
    if files.is_empty() {
        return Err(AppError::InvalidInput("No files to upload".into()));
    }
    let api = network::connect(state)?;
    let ctx = state.context(config);

    log::info!("Uploading {} file(s) to {}", files.len(), chat);
    let report = with_progress(
        &ctx,
        upload_engine::upload_files(&api, &ctx, &chat, &files, &options),
    )
    .await;

    for outcome in &report.uploaded {
        println!(
            "uploaded {} ({} bytes) -> message {:?}",
            outcome.file_name, outcome.file_size, outcome.message_ids
        );
    }
    for failed in &report.failed {
        println!("failed   {}: {}", failed.path, failed.error);
    }
    if ctx.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    if !report.failed.is_empty() {
        return Err(AppError::Internal(format!(
            "{} of {} upload(s) failed",
            report.failed.len(),
            files.len()
        )));
    }
    Ok(())
}
