use crate::provider::error::Result;
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use shelver_config::Retry;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

fn to_backoff(policy: &Retry) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(policy.initial_interval_ms),
        max_interval: Duration::from_millis(policy.max_interval_ms),
        multiplier: policy.multiplier,
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// has been attempted `policy.max_attempts` times.
///
/// Waits between attempts grow exponentially (with jitter) up to
/// `policy.max_interval_ms`.
pub async fn with_retry<T, F, Fut>(name: &str, policy: &Retry, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = to_backoff(policy);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempts >= max_attempts => {
                warn!(operation = %name, attempts, error = %e, "Operation failed after max retries");
                return Err(e);
            },
            Err(e) => match backoff.next_backoff() {
                Some(duration) => {
                    let retry_in_ms = duration.as_millis();
                    warn!(operation = %name, attempt = attempts, error = %e, retry_in_ms, "Operation failed, retrying");
                    tokio::time::sleep(duration).await;
                },
                None => return Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::error::ErrorKind;
    use std::ops::Deref;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> Retry {
        Retry { max_attempts, initial_interval_ms: 100, max_interval_ms: 1_000, multiplier: 2.0 }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let result = with_retry("lookup", &policy(3), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                exn::bail!(ErrorKind::Network("connection reset".to_string()));
            }
            Ok(42)
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let err = with_retry::<(), _, _>("lookup", &policy(2), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            exn::bail!(ErrorKind::Timeout("lookup".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Timeout(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_rejections() {
        let calls = &AtomicU32::new(0);
        let err = with_retry::<(), _, _>("lookup", &policy(5), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            exn::bail!(ErrorKind::Rejected("bad request".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Rejected(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
