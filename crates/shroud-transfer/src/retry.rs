use std::fmt::Display;
use std::future::Future;

use tracing::warn;

use crate::config::RetryPolicy;

/// Run `op` until it succeeds, `policy.max_retries` retries are spent, or
/// `stop` returns true for an error. `op` receives the attempt number.
pub async fn retry<T, E, F, Fut, S>(policy: &RetryPolicy, mut op: F, stop: S) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: Fn(&E) -> bool,
    E: Display,
{
    let mut delay = policy.first_delay();
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_retries || stop(&err) => return Err(err),
            Err(err) => {
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(policy.factor.max(1));
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            first_delay_ms: 100,
            factor: 2,
            max_retries,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures_with_backoff() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result: Result<u32, String> = retry(
            &policy(5),
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(format!("attempt {attempt}"))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            |_| false,
        )
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry(
            &policy(2),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            },
            |_| false,
        )
        .await;
        assert_eq!(result, Err("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stop_predicate_ends_early() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry(
            &policy(5),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            },
            |err| *err == "fatal",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
