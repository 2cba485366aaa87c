//! Retry engine: exponential backoff with jitter for Telegram calls.
//!
//! Wraps transfer operations with automatic retry on transient errors
//! (network failures, 5xx server errors, flood limits). Logs every retry and
//! emits `transfer:retry-warning` events once the warning threshold is reached.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::AppError;
use crate::events::{self, EventSink, TRANSFER_RETRY_WARNING};

/// Default initial backoff delay in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
/// Default maximum backoff delay in milliseconds (60 seconds).
pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;
/// Default retry count from which warning events are emitted.
pub const DEFAULT_WARNING_THRESHOLD: u32 = 3;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Retry warning event payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryWarningPayload {
    pub label: String,
    pub retry_count: u32,
    pub delay_ms: u64,
    pub error_message: String,
}

/// Emitted when a transfer fails for good.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferErrorPayload {
    pub label: String,
    pub error_message: String,
}

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub warning_threshold: u32,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            max_retries: Some(DEFAULT_MAX_RETRIES),
        }
    }
}

/// Check whether an error is retryable.
///
/// Network errors and flood limits are always retryable. API errors are
/// retryable only for 5xx server errors. Everything else fails immediately.
pub fn is_retryable(err: &AppError) -> bool {
    match err {
        AppError::Network(_) | AppError::RateLimited { .. } => true,
        AppError::Api { .. } => err.is_server_error(),
        _ => false,
    }
}

/// Calculate exponential backoff delay with +/-10% jitter.
pub fn calculate_delay(attempt: u32, policy: &RetryPolicy) -> u64 {
    let base = policy
        .initial_delay_ms
        .saturating_mul(1u64 << attempt.min(31));
    let capped = base.min(policy.max_delay_ms);
    let jitter_range = capped / 10;
    if jitter_range == 0 {
        return capped;
    }
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(u64::from(attempt) * 7 + 13);
    let jitter = seed % (jitter_range * 2 + 1);
    capped - jitter_range + jitter
}

/// Delay before the next attempt: Telegram's `retry_after` for flood limits,
/// backoff otherwise.
pub fn retry_delay(err: &AppError, attempt: u32, policy: &RetryPolicy) -> u64 {
    match err {
        AppError::RateLimited { retry_after } => retry_after.saturating_mul(1_000),
        _ => calculate_delay(attempt, policy),
    }
}

/// Whether a warning event should be emitted for this retry (1-based).
pub fn should_emit_warning(retry_count: u32, threshold: u32) -> bool {
    retry_count >= threshold
}

/// Run `operation`, retrying transient failures according to `policy`.
///
/// The cancel flag is checked before every attempt.
pub async fn retry<F, Fut, T>(
    policy: &RetryPolicy,
    cancel_flag: &Arc<AtomicBool>,
    sink: &dyn EventSink,
    label: &str,
    mut operation: F,
) -> crate::error::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::error::Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        if cancel_flag.load(Ordering::Relaxed) {
            return Err(AppError::Cancelled);
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }
                if let Some(max) = policy.max_retries {
                    if attempt >= max {
                        log::error!("{}: giving up after {} retries: {}", label, attempt, err);
                        return Err(err);
                    }
                }

                let retry_count = attempt + 1;
                let delay = retry_delay(&err, attempt, policy);
                log::warn!(
                    "{}: retry {} in {}ms, error={}",
                    label,
                    retry_count,
                    delay,
                    err
                );
                if should_emit_warning(retry_count, policy.warning_threshold) {
                    events::emit(
                        sink,
                        TRANSFER_RETRY_WARNING,
                        &RetryWarningPayload {
                            label: label.to_string(),
                            retry_count,
                            delay_ms: delay,
                            error_message: err.to_string(),
                        },
                    );
                }

                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::events::testing::RecordingSink;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay_ms: 1,
            max_delay_ms: 10,
            warning_threshold: 3,
            max_retries: Some(5),
        }
    }

    #[test]
    fn test_calculate_delay_exponential_backoff() {
        let policy = RetryPolicy::default();
        let d0 = calculate_delay(0, &policy);
        assert!((900..=1_100).contains(&d0), "attempt 0: got {}", d0);
        let d1 = calculate_delay(1, &policy);
        assert!((1_800..=2_200).contains(&d1), "attempt 1: got {}", d1);
        let d4 = calculate_delay(4, &policy);
        assert!((14_400..=17_600).contains(&d4), "attempt 4: got {}", d4);
    }

    #[test]
    fn test_calculate_delay_capped_at_max() {
        let policy = RetryPolicy::default();
        for attempt in [6, 10, 31, 40] {
            let d = calculate_delay(attempt, &policy);
            assert!((54_000..=66_000).contains(&d), "attempt {}: got {}", attempt, d);
        }
    }

    #[test]
    fn test_calculate_delay_jitter_within_10_percent() {
        let policy = RetryPolicy::default();
        for attempt in 0..20 {
            let delay = calculate_delay(attempt, &policy);
            let capped = policy
                .initial_delay_ms
                .saturating_mul(1u64 << attempt)
                .min(policy.max_delay_ms);
            let lower = capped - capped / 10;
            let upper = capped + capped / 10;
            assert!(
                delay >= lower && delay <= upper,
                "attempt {}: delay {} not in [{}, {}]",
                attempt,
                delay,
                lower,
                upper
            );
        }
    }

    #[test]
    fn test_rate_limit_delay_is_exact() {
        let policy = RetryPolicy::default();
        let err = AppError::RateLimited { retry_after: 35 };
        assert_eq!(retry_delay(&err, 0, &policy), 35_000);
        assert_eq!(retry_delay(&err, 4, &policy), 35_000);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(&AppError::Network("connection reset".into())));
        assert!(is_retryable(&AppError::RateLimited { retry_after: 1 }));
        assert!(is_retryable(&AppError::Api {
            code: 502,
            description: "Bad Gateway".into()
        }));
        assert!(!is_retryable(&AppError::Api {
            code: 400,
            description: "Bad Request".into()
        }));
        assert!(!is_retryable(&AppError::Io("file not found".into())));
        assert!(!is_retryable(&AppError::Storage("store read failed".into())));
        assert!(!is_retryable(&AppError::InvalidInput("bad".into())));
        assert!(!is_retryable(&AppError::Cancelled));
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.initial_delay_ms, 1_000);
        assert_eq!(policy.max_delay_ms, 60_000);
        assert_eq!(policy.warning_threshold, 3);
        assert_eq!(policy.max_retries, Some(5));
    }

    #[test]
    fn test_should_emit_warning() {
        assert!(!should_emit_warning(1, 3));
        assert!(!should_emit_warning(2, 3));
        assert!(should_emit_warning(3, 3));
        assert!(should_emit_warning(4, 3));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_errors() {
        let calls = AtomicU32::new(0);
        let sink = RecordingSink::default();
        let cancel = Arc::new(AtomicBool::new(false));
        let result = retry(&fast_policy(), &cancel, &sink, "a.txt", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(AppError::Network("reset".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
        // Retries 1 and 2 are silent; retry 3 reaches the threshold.
        assert_eq!(sink.names(), vec![TRANSFER_RETRY_WARNING]);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let sink = RecordingSink::default();
        let cancel = Arc::new(AtomicBool::new(false));
        let err = retry(&fast_policy(), &cancel, &sink, "a.txt", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(AppError::Api {
                    code: 400,
                    description: "Bad Request".into(),
                })
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Api { code: 400, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let sink = RecordingSink::default();
        let cancel = Arc::new(AtomicBool::new(false));
        let result = retry(&fast_policy(), &cancel, &sink, "a.txt", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AppError::Network("down".into())) }
        })
        .await;
        assert!(matches!(result, Err(AppError::Network(_))));
        // One initial attempt plus five retries.
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_retry_respects_cancel_flag() {
        let sink = RecordingSink::default();
        let cancel = Arc::new(AtomicBool::new(true));
        let result = retry(&fast_policy(), &cancel, &sink, "a.txt", || async {
            Ok::<_, AppError>(())
        })
        .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_retry_after() {
        let calls = AtomicU32::new(0);
        let sink = RecordingSink::default();
        let cancel = Arc::new(AtomicBool::new(false));
        let started = tokio::time::Instant::now();
        retry(&RetryPolicy::default(), &cancel, &sink, "copy", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AppError::RateLimited { retry_after: 35 })
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();
        let waited = started.elapsed();
        assert!(waited >= std::time::Duration::from_secs(35));
        assert!(waited < std::time::Duration::from_secs(36));
    }
}
