//! Retry logic with exponential backoff.
//!
//! Provides a retry wrapper using the `backon` crate, gated on
//! [`ClientError::is_retryable`]. Used by the mutation submission path;
//! login has its own fixed-backoff loop in [`Session`](crate::Session).

use std::{future::Future, time::Duration};

use backon::{ExponentialBuilder, Retryable};

use crate::{
    config::RetryPolicy,
    error::{ClientError, Result},
};

/// Execute an async operation with retry using exponential backoff.
///
/// The operation is retried according to the provided [`RetryPolicy`] while
/// it fails with a retryable error (as determined by
/// [`ClientError::is_retryable`]). A non-retryable error is returned
/// immediately; exhausting the policy yields
/// [`ClientError::RetryExhausted`].
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    // backon's max_times is the number of retries, not total attempts.
    let max_retries = policy.max_attempts.saturating_sub(1) as usize;

    let mut backoff = ExponentialBuilder::new()
        .with_min_delay(policy.initial_backoff)
        .with_max_delay(policy.max_backoff)
        .with_factor(policy.multiplier as f32)
        .with_max_times(max_retries);
    if policy.jitter {
        backoff = backoff.with_jitter();
    }

    // Track attempt count for error reporting
    let attempt_count = std::sync::atomic::AtomicU32::new(0);

    operation
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .when(|e: &ClientError| e.is_retryable())
        .notify(|err: &ClientError, dur: Duration| {
            let attempt = attempt_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            tracing::debug!(
                attempt = attempt,
                backoff_ms = dur.as_millis() as u64,
                error = %err,
                "retrying after backoff"
            );
        })
        .await
        .map_err(|e| {
            // A retryable error surviving the loop means we ran out of
            // attempts; anything else is the original non-retryable error.
            if e.is_retryable() {
                let attempts = attempt_count.load(std::sync::atomic::Ordering::SeqCst) + 1;
                ClientError::RetryExhausted { attempts, last_error: e.to_string() }
            } else {
                e
            }
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tonic::Code;

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .with_max_attempts(max_attempts)
            .with_initial_backoff(Duration::from_millis(1))
            .with_max_backoff(Duration::from_millis(5))
            .with_jitter(false)
            .build()
    }

    fn transient() -> ClientError {
        ClientError::Rpc { code: Code::Unavailable, message: "node down".to_owned() }
    }

    fn permanent() -> ClientError {
        ClientError::Rpc { code: Code::InvalidArgument, message: "bad request".to_owned() }
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ClientError>(42) }
        })
        .await;

        assert_eq!(result.expect("success"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(transient()) } else { Ok(n) } }
        })
        .await;

        assert_eq!(result.expect("eventual success"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_returned_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(permanent()) }
        })
        .await;

        assert!(matches!(result, Err(ClientError::Rpc { code: Code::InvalidArgument, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_wraps_in_retry_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        assert!(matches!(result, Err(ClientError::RetryExhausted { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_retry_policy_makes_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&RetryPolicy::no_retry(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
