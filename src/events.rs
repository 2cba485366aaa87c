//! Event sink used by services to publish progress and warnings.
//!
//! Services never print directly; they emit named events with a JSON payload.
//! The CLI installs [`LogSink`], which renders the events through `log`.

use serde::Serialize;

pub const TRANSFER_PROGRESS: &str = "transfer:progress";
pub const TRANSFER_RETRY_WARNING: &str = "transfer:retry-warning";
pub const TRANSFER_ERROR: &str = "transfer:error";
pub const BATCH_PROGRESS: &str = "batch:progress";
pub const CLONE_PROGRESS: &str = "clone:progress";

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: serde_json::Value);
}

/// Serialize `payload` and forward it to `sink`. Serialization failures are dropped.
pub fn emit<T: Serialize>(sink: &dyn EventSink, event: &str, payload: &T) {
    if let Ok(value) = serde_json::to_value(payload) {
        sink.emit(event, value);
    }
}

/// Renders events as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &str, payload: serde_json::Value) {
        match event {
            TRANSFER_PROGRESS => {
                if let Some(line) = payload.get("statusLine").and_then(|v| v.as_str()) {
                    log::info!("{}", line);
                }
            }
            TRANSFER_RETRY_WARNING => log::warn!("{}: {}", event, payload),
            TRANSFER_ERROR => log::error!("{}: {}", event, payload),
            _ => log::debug!("{}: {}", event, payload),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        task_id: String,
    }

    #[test]
    fn emit_serializes_payload() {
        let sink = RecordingSink::default();
        emit(
            &sink,
            BATCH_PROGRESS,
            &Sample {
                task_id: "t1".into(),
            },
        );
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, BATCH_PROGRESS);
        assert_eq!(events[0].1["taskId"], "t1");
    }

    #[test]
    fn log_sink_accepts_any_event() {
        let sink = LogSink;
        sink.emit(TRANSFER_PROGRESS, serde_json::json!({"statusLine": "x"}));
        sink.emit("unknown", serde_json::json!(null));
    }
}
