use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
/// - `is_transient`: Decides whether a failure is worth another attempt
///
/// # Returns
/// Either the successful result or the error of the last attempt
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
    is_transient: impl Fn(&Error) -> bool,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries || !is_transient(&err) {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures_until_success() {
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let result = with_retry(
            || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow!("temporary"))
                } else {
                    Ok(42)
                }
            },
            2,
            100,
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retries() {
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let result: Result<(), Error> = with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("still down"))
            },
            1,
            100,
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap_err().to_string(), "still down");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let result: Result<(), Error> = with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("not found"))
            },
            5,
            100,
            |_| false,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
