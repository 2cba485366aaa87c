//! Business logic layer.
//!
//! Transfer engines, the batch runner, channel cloning, the chat explorer and
//! local file tools. Called by the `commands` layer; delegates Telegram
//! interactions to the `api` layer and persistence to the `storage` layer.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::events::EventSink;
use crate::models::settings::AppConfig;
use crate::storage::AppPaths;

pub mod batch_runner;
pub mod chunk_manager;
pub mod clone_engine;
pub mod download_engine;
pub mod explorer;
pub mod file_tools;
pub mod progress;
pub mod retry_engine;
pub mod upload_engine;

/// Most transfers run at once when parallel transfers are enabled.
pub const MAX_CONCURRENT_TRANSFERS: usize = 4;

/// Everything a transfer needs besides the API client.
#[derive(Clone)]
pub struct TransferContext {
    pub paths: AppPaths,
    pub config: AppConfig,
    pub progress: Arc<progress::ProgressAggregator>,
    pub retry: retry_engine::RetryPolicy,
    pub cancel: Arc<AtomicBool>,
}

impl TransferContext {
    pub fn new(
        paths: AppPaths,
        config: AppConfig,
        sink: Arc<dyn EventSink>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            paths,
            config,
            progress: Arc::new(progress::ProgressAggregator::new(sink)),
            retry: retry_engine::RetryPolicy::default(),
            cancel,
        }
    }

    pub fn sink(&self) -> &dyn EventSink {
        self.progress.sink()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(std::sync::atomic::Ordering::Relaxed)
    }
}
