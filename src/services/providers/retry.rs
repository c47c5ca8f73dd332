// Provider Retry Policy
// Bounded attempts with exponential backoff; "loading" responses wait the
// server-suggested time instead of growing the backoff.

use super::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retries after the first attempt (3 attempts total)
pub const MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubles after every backoff wait
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(initial_backoff_ms: u64) -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
        }
    }
}

/// Drive `attempt_fn` until it succeeds, hits a non-retryable error, or runs out of attempts.
///
/// Exhausting every attempt yields `ProviderError::Network` carrying the last error's text.
pub async fn run_with_retries<F, Fut>(
    policy: &RetryPolicy,
    provider: &str,
    mut attempt_fn: F,
) -> Result<u8, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<u8, ProviderError>>,
{
    let mut backoff = policy.initial_backoff;
    let mut last_err: Option<ProviderError> = None;

    for attempt in 0..=policy.max_retries {
        let err = match attempt_fn(attempt).await {
            Ok(score) => {
                if attempt > 0 {
                    debug!(provider, attempt, "[PROVIDER] succeeded after retry");
                }
                return Ok(score);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(err);
        }

        if attempt < policy.max_retries {
            let wait = match &err {
                ProviderError::Loading(hint) => hint.map(Duration::from_millis),
                _ => {
                    let wait = backoff;
                    backoff *= 2;
                    Some(wait)
                }
            };
            warn!(
                provider,
                attempt,
                wait_ms = wait.map(|w| w.as_millis() as u64).unwrap_or(0),
                error = %err,
                "[PROVIDER] retrying after transient error"
            );
            if let Some(wait) = wait {
                tokio::time::sleep(wait).await;
            }
        }
        last_err = Some(err);
    }

    // a transport failure already is a Network error; keep its message as is
    Err(match last_err {
        Some(ProviderError::Network(msg)) => ProviderError::Network(msg),
        Some(err) => ProviderError::Network(err.to_string()),
        None => ProviderError::Network("retry loop failed".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn scripted(
        outcomes: Vec<Result<u8, ProviderError>>,
    ) -> (Arc<AtomicU32>, impl FnMut(u32) -> std::future::Ready<Result<u8, ProviderError>>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let f = move |attempt: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(outcomes[attempt as usize].clone())
        };
        (calls, f)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_server_errors_uses_doubling_backoff() {
        let (calls, f) = scripted(vec![
            Err(ProviderError::Server(Some(500))),
            Err(ProviderError::BadResponse),
            Ok(64),
        ]);
        let start = Instant::now();
        let result = run_with_retries(&RetryPolicy::new(500), "test", f).await;
        assert_eq!(result, Ok(64));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 500ms + 1000ms of backoff
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500) && elapsed < Duration::from_millis(1510));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_aborts_immediately() {
        let (calls, f) = scripted(vec![Err(ProviderError::Rate), Ok(10), Ok(10)]);
        let result = run_with_retries(&RetryPolicy::new(700), "test", f).await;
        assert_eq!(result, Err(ProviderError::Rate));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_raises_network() {
        let (calls, f) = scripted(vec![
            Err(ProviderError::Server(Some(502))),
            Err(ProviderError::Server(Some(502))),
            Err(ProviderError::Server(Some(502))),
        ]);
        let result = run_with_retries(&RetryPolicy::new(700), "test", f).await;
        assert_eq!(
            result,
            Err(ProviderError::Network("server error (status 502)".to_string()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_transport_errors_keep_single_prefix() {
        let reset = || Err(ProviderError::Network("connection reset".to_string()));
        let (calls, f) = scripted(vec![reset(), reset(), reset()]);
        let result = run_with_retries(&RetryPolicy::new(700), "test", f).await;
        let err = result.unwrap_err();
        assert_eq!(err, ProviderError::Network("connection reset".to_string()));
        assert_eq!(err.to_string(), "network failure: connection reset");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_waits_hint_without_growing_backoff() {
        let (_, f) = scripted(vec![
            Err(ProviderError::Loading(Some(2000))),
            Err(ProviderError::Server(Some(500))),
            Ok(42),
        ]);
        let start = Instant::now();
        let result = run_with_retries(&RetryPolicy::new(700), "test", f).await;
        assert_eq!(result, Ok(42));
        // hinted 2000ms, then the untouched initial backoff of 700ms
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(2700) && elapsed < Duration::from_millis(2710));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_without_hint_skips_wait() {
        let (calls, f) = scripted(vec![
            Err(ProviderError::Loading(None)),
            Err(ProviderError::Loading(None)),
            Err(ProviderError::Loading(None)),
        ]);
        let start = Instant::now();
        let result = run_with_retries(&RetryPolicy::new(700), "test", f).await;
        assert!(matches!(result, Err(ProviderError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
