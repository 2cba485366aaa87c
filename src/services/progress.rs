//! Progress aggregator: tracks bytes per transfer and emits
//! `transfer:progress` events at 250ms intervals.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::events::{self, EventSink, TRANSFER_PROGRESS};

/// Progress event emission interval in milliseconds.
pub const PROGRESS_EMIT_INTERVAL_MS: u64 = 250;

const MIB: f64 = 1_048_576.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Upload,
    Download,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub transfer_id: String,
    pub kind: TransferKind,
    pub file_name: String,
    pub bytes: u64,
    pub total: u64,
    pub percent: f64,
    /// Bytes per second since the transfer was registered.
    pub speed: f64,
    /// Estimated seconds left; 0 when unknown or finished.
    pub remaining_secs: f64,
    pub status_line: String,
}

struct TransferProgress {
    kind: TransferKind,
    file_name: String,
    total: u64,
    bytes: Arc<AtomicU64>,
    started: Instant,
}

impl TransferProgress {
    fn payload(&self, transfer_id: &str) -> ProgressPayload {
        let bytes = self.bytes.load(Ordering::Relaxed);
        let elapsed = self.started.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 {
            bytes as f64 / elapsed
        } else {
            0.0
        };
        let percent = if self.total > 0 {
            (bytes as f64 / self.total as f64) * 100.0
        } else {
            100.0
        };
        let remaining_secs = if speed > 0.0 {
            self.total.saturating_sub(bytes) as f64 / speed
        } else {
            0.0
        };
        let mut payload = ProgressPayload {
            transfer_id: transfer_id.to_string(),
            kind: self.kind,
            file_name: self.file_name.clone(),
            bytes,
            total: self.total,
            percent,
            speed,
            remaining_secs,
            status_line: String::new(),
        };
        payload.status_line = status_line(&payload);
        payload
    }
}

pub struct ProgressAggregator {
    transfers: Arc<RwLock<HashMap<String, TransferProgress>>>,
    sink: Arc<dyn EventSink>,
}

impl ProgressAggregator {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            transfers: Arc::new(RwLock::new(HashMap::new())),
            sink,
        }
    }

    pub fn sink(&self) -> &dyn EventSink {
        self.sink.as_ref()
    }

    /// Register a transfer and return its byte counter.
    pub async fn register(
        &self,
        transfer_id: &str,
        kind: TransferKind,
        file_name: &str,
        total: u64,
    ) -> Arc<AtomicU64> {
        let bytes = Arc::new(AtomicU64::new(0));
        let mut transfers = self.transfers.write().await;
        transfers.insert(
            transfer_id.to_string(),
            TransferProgress {
                kind,
                file_name: file_name.to_string(),
                total,
                bytes: bytes.clone(),
                started: Instant::now(),
            },
        );
        bytes
    }

    /// Remove a transfer, emitting its final state.
    pub async fn remove(&self, transfer_id: &str) {
        let removed = self.transfers.write().await.remove(transfer_id);
        if let Some(transfer) = removed {
            events::emit(
                self.sink.as_ref(),
                TRANSFER_PROGRESS,
                &transfer.payload(transfer_id),
            );
        }
    }

    pub async fn snapshot(&self) -> Vec<ProgressPayload> {
        let transfers = self.transfers.read().await;
        let mut payloads: Vec<ProgressPayload> = transfers
            .iter()
            .map(|(id, t)| t.payload(id))
            .collect();
        payloads.sort_by(|a, b| a.transfer_id.cmp(&b.transfer_id));
        payloads
    }

    /// Start the background emitter. It runs until the handle is aborted.
    pub fn start_emitter(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_millis(PROGRESS_EMIT_INTERVAL_MS))
                    .await;
                for payload in this.snapshot().await {
                    events::emit(this.sink.as_ref(), TRANSFER_PROGRESS, &payload);
                }
            }
        })
    }
}

/// `1.5 MB/s` at or above one MiB per second, `512.0 KB/s` below.
pub fn format_speed(bytes_per_sec: f64) -> String {
    let mb = bytes_per_sec / MIB;
    if mb >= 1.0 {
        format!("{:.1} MB/s", mb)
    } else if mb > 0.0 {
        format!("{:.1} KB/s", mb * 1024.0)
    } else {
        "0 KB/s".to_string()
    }
}

pub fn format_remaining(secs: f64) -> String {
    if secs > 3600.0 {
        format!("{:.1} hr", secs / 3600.0)
    } else if secs > 60.0 {
        format!("{:.1} min", secs / 60.0)
    } else if secs > 0.0 {
        format!("{:.1} s", secs)
    } else {
        "Done soon".to_string()
    }
}

pub fn status_line(payload: &ProgressPayload) -> String {
    let verb = match payload.kind {
        TransferKind::Upload => "Uploading",
        TransferKind::Download => "Downloading",
    };
    format!(
        "{}: {} {:.2} MB / {:.2} MB ({:.1}%) | Speed: {} | Remaining: {}",
        verb,
        payload.file_name,
        payload.bytes as f64 / MIB,
        payload.total as f64 / MIB,
        payload.percent,
        format_speed(payload.speed),
        format_remaining(payload.remaining_secs)
    )
}
