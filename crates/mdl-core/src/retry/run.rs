//! Retry loop: run an async fetch until success, cancellation, or the policy says stop.

use std::future::Future;
use tokio_util::sync::CancellationToken;

use super::classify::classify;
use super::error::FetchError;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs `f(attempt)` until it succeeds or the retry policy says to stop.
///
/// The attempt and the backoff sleep both race `cancel`; cancellation returns
/// `FetchError::Cancelled` without waiting out the delay.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut f: F,
) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            r = f(attempt) => r,
        };
        let e = match res {
            Ok(v) => return Ok(v),
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(e) => e,
        };
        match policy.decide(attempt, classify(&e)) {
            RetryDecision::NoRetry => return Err(e),
            RetryDecision::RetryAfter(d) => {
                tracing::debug!(attempt, delay_ms = d.as_millis() as u64, "retrying after: {e}");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = tokio::time::sleep(d) => {}
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        let out = run_with_retry(&fast_policy(3), &token, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(FetchError::transport(ErrorKind::Connection, "reset"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        let err = run_with_retry(&fast_policy(5), &token, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(FetchError::Http(404)) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::Http(404)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        let err = run_with_retry(&fast_policy(3), &token, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(FetchError::Http(502)) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::Http(502)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let err = run_with_retry(&fast_policy(3), &token, |_| async { Ok::<_, FetchError>(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_returns_promptly() {
        let token = CancellationToken::new();
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
        };
        let t2 = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            t2.cancel();
        });
        let err = run_with_retry(&policy, &token, |_| async {
            Err::<(), _>(FetchError::transport(ErrorKind::Timeout, "slow"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }
}
