//! Shared retry utility with exponential backoff.
//!
//! `attempts` counts *retries*, so the operation runs `attempts + 1` times
//! in the worst case. After every failure — including the final one — the
//! caller waits `base_delay * 2^i` before either retrying or giving up.
//!
//! Known limitation, kept deliberately: failures are retried uniformly, with
//! no distinction between transient (timeout, 5xx) and permanent (auth, bad
//! request) errors. See DESIGN.md.

use std::time::Duration;

use tracing::debug;

/// Run `op` until it succeeds or `attempts` retries are exhausted.
///
/// Returns the first success, or the last error once the budget is spent.
/// No jitter; delays are `base_delay`, `2*base_delay`, `4*base_delay`, …
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut op: F,
    attempts: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let delay = base_delay.saturating_mul(1u32 << attempt.min(31));
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "attempt failed");
                tokio::time::sleep(delay).await;
                if attempt >= attempts {
                    return Err(err);
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn first_try_success_skips_backoff() {
        let calls = Cell::new(0u32);
        let result: Result<i32, &str> = retry_with_backoff(
            || {
                calls.set(calls.get() + 1);
                async { Ok(42) }
            },
            3,
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_k_failures() {
        let calls = Cell::new(0u32);
        let result: Result<&str, &str> = retry_with_backoff(
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { if n <= 2 { Err("boom") } else { Ok("done") } }
            },
            3,
            Duration::from_millis(100),
        )
        .await;
        assert_eq!(result, Ok("done"));
        // failed twice, succeeded on the third invocation
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_surfaces_last_error() {
        let calls = Cell::new(0u32);
        let result: Result<(), String> = retry_with_backoff(
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Err(format!("failure #{n}")) }
            },
            4,
            Duration::from_millis(10),
        )
        .await;
        // attempts = 4 means 5 invocations total
        assert_eq!(calls.get(), 5);
        assert_eq!(result.unwrap_err(), "failure #5");
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_delays_double_each_attempt() {
        let start = tokio::time::Instant::now();
        let result: Result<(), &str> = retry_with_backoff(
            || async { Err("nope") },
            3,
            Duration::from_millis(100),
        )
        .await;
        assert!(result.is_err());
        // 100 + 200 + 400 + 800 — the final failure also sleeps before
        // surfacing, matching the documented policy.
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_means_single_invocation() {
        let calls = Cell::new(0u32);
        let result: Result<(), &str> = retry_with_backoff(
            || {
                calls.set(calls.get() + 1);
                async { Err("once") }
            },
            0,
            Duration::from_millis(1),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
