//! Command-line handlers.
//!
//! This module is the entry point for every subcommand. Handlers parse
//! arguments, print results and forward to the `services` layer for business
//! logic. Commands should not contain business logic directly.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::error::AppError;
use crate::events::LogSink;
use crate::models::settings::AppConfig;
use crate::services::file_tools::HashAlgo;
use crate::services::TransferContext;
use crate::storage::{settings as settings_store, AppPaths};

pub mod batch;
pub mod chats;
pub mod clone;
pub mod download;
pub mod files;
pub mod history;
pub mod network;
pub mod settings;
pub mod upload;

#[derive(Debug, Parser)]
#[command(name = "tg-transfer", version, about = "Move files to and from Telegram")]
pub struct Cli {
    /// Application directory holding config, profiles, sessions and state.
    #[arg(long, global = true, env = "TG_TRANSFER_HOME")]
    pub home: Option<PathBuf>,

    /// Profile to use instead of `current_profile`.
    #[arg(long, short = 'p', global = true, env = "TG_TRANSFER_PROFILE")]
    pub profile: Option<String>,

    /// Append log output to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show or change settings.
    #[command(subcommand)]
    Config(settings::ConfigCommand),
    /// Manage bot credentials.
    #[command(subcommand)]
    Profile(settings::ProfileCommand),
    /// Verify the profile token and store a session.
    Login,
    /// Delete the stored session so the next run must log in again.
    Logout,
    /// Check that the Bot API server is reachable.
    Ping,
    /// Upload files or folders to a chat.
    Upload(upload::UploadArgs),
    /// Download message media by link or by chat and ids.
    Download(download::DownloadArgs),
    /// Resumable batch upload queue.
    #[command(subcommand)]
    Batch(batch::BatchCommand),
    /// Copy a range of messages from one chat to another.
    Clone(clone::CloneArgs),
    /// Browse chats the bot has seen.
    #[command(subcommand)]
    Chats(chats::ChatsCommand),
    /// Transfer history.
    #[command(subcommand)]
    History(history::HistoryCommand),
    /// SHA-256 and/or MD5 of a local file.
    Hash {
        path: PathBuf,
        /// sha256, md5 or both.
        #[arg(long, default_value = "sha256")]
        algo: HashAlgo,
    },
    /// Split a file into numbered parts.
    Split(files::SplitArgs),
    /// Join part files back into one file.
    Combine(files::CombineArgs),
    /// Size and timestamps of a local file.
    Info { path: PathBuf },
    /// Convert an image to JPEG.
    Convert {
        path: PathBuf,
        /// Output file; defaults to `<stem>.jpg` next to the image.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

/// Process-wide state shared by all handlers.
pub struct AppState {
    pub paths: AppPaths,
    pub profile: Option<String>,
    pub cancel: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(home: Option<PathBuf>, profile: Option<String>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            paths: AppPaths::new(home.unwrap_or_else(AppPaths::default_root)),
            profile,
            cancel,
        }
    }

    pub fn config(&self) -> crate::error::Result<AppConfig> {
        settings_store::get_settings(&self.paths)
    }

    /// The `--profile` override, else `current_profile`.
    pub fn profile_name(&self, config: &AppConfig) -> crate::error::Result<String> {
        self.profile
            .clone()
            .or_else(|| config.current_profile.clone())
            .ok_or_else(|| {
                AppError::Config(
                    "No profile selected; run `profile add <name> <token>` first".into(),
                )
            })
    }

    pub fn context(&self, config: AppConfig) -> TransferContext {
        TransferContext::new(
            self.paths.clone(),
            config,
            Arc::new(LogSink),
            self.cancel.clone(),
        )
    }
}

/// Run `work` while the progress emitter reports active transfers.
pub(crate) async fn with_progress<F: Future>(ctx: &TransferContext, work: F) -> F::Output {
    let emitter = ctx.progress.start_emitter();
    let output = work.await;
    emitter.abort();
    output
}

/// Destination chat from the argument or `default_chat`.
pub(crate) fn target_chat(
    arg: Option<&str>,
    config: &AppConfig,
) -> crate::error::Result<crate::models::transfer::ChatRef> {
    arg.or(config.default_chat.as_deref())
        .ok_or_else(|| {
            AppError::InvalidInput(
                "No chat given and default_chat is not set".into(),
            )
        })?
        .parse()
}

pub async fn dispatch(command: Command, state: &AppState) -> crate::error::Result<()> {
    state.paths.ensure()?;
    match command {
        Command::Config(cmd) => settings::config(cmd, state),
        Command::Profile(cmd) => settings::profile(cmd, state),
        Command::Login => network::login(state).await,
        Command::Logout => network::logout(state),
        Command::Ping => network::ping(state).await,
        Command::Upload(args) => upload::upload(args, state).await,
        Command::Download(args) => download::download(args, state).await,
        Command::Batch(cmd) => batch::batch(cmd, state).await,
        Command::Clone(args) => clone::clone(args, state).await,
        Command::Chats(cmd) => chats::chats(cmd, state).await,
        Command::History(cmd) => history::history(cmd, state),
        Command::Hash { path, algo } => files::hash(&path, algo, state).await,
        Command::Split(args) => files::split(args, state).await,
        Command::Combine(args) => files::combine(args).await,
        Command::Info { path } => files::info(&path).await,
        Command::Convert { path, output } => files::convert(&path, output.as_deref()).await,
    }
}
