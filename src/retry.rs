//! Bounded retry with exponential backoff.
//!
//! [`RetryPolicy`] is the one retry algorithm in the crate. The analysis
//! client uses it keyed on HTTP failure classes; the Zotero store uses it
//! keyed on SQLite busy/locked results.
//!
//! # Schedule
//!
//! Attempts are numbered from 1 and the first call counts toward
//! `max_attempts`. Before attempt `n` (n ≥ 2) the policy sleeps
//! `base_delay × backoff_factor^(n-2)`:
//!
//! | attempt | delay (base 1s, factor 2) |
//! |---------|---------------------------|
//! | 1       | none                      |
//! | 2       | 1s                        |
//! | 3       | 2s                        |
//! | 4       | 4s                        |
//!
//! No jitter is applied.

use std::future::Future;
use std::time::Duration;

/// Max attempts, delay schedule, and nothing else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

/// Why [`RetryPolicy::run`] stopped without a success.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation failed with an error the predicate refused to retry.
    Aborted(E),
    /// Every attempt failed with a retryable error; `last` is the final one.
    Exhausted { attempts: u32, last: E },
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
        }
    }

    /// Attempts actually made; a zero budget still runs the operation once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay slept before `attempt` (1-based). Zero for the first attempt;
    /// saturates at `Duration::MAX` instead of overflowing.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max = self.attempts();
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !is_retryable(&e) => return Err(RetryError::Aborted(e)),
                Err(e) if attempt >= max => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    })
                }
                Err(e) => {
                    attempt += 1;
                    let delay = self.delay_before(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = max,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Busy,
        Broken,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn policy(max: u32) -> RetryPolicy {
        RetryPolicy::new(max, Duration::from_secs(1), 2.0)
    }

    #[test]
    fn delay_schedule_doubles() {
        let p = policy(5);
        assert_eq!(p.delay_before(1), Duration::ZERO);
        assert_eq!(p.delay_before(2), Duration::from_secs(1));
        assert_eq!(p.delay_before(3), Duration::from_secs(2));
        assert_eq!(p.delay_before(4), Duration::from_secs(4));
    }

    #[test]
    fn fractional_base_delay() {
        let p = RetryPolicy::new(6, Duration::from_millis(100), 2.0);
        assert_eq!(p.delay_before(2), Duration::from_millis(100));
        assert_eq!(p.delay_before(6), Duration::from_millis(1600));
    }

    #[test]
    fn huge_delays_saturate() {
        let p = RetryPolicy::new(3, Duration::from_millis(100), 1e30);
        assert_eq!(p.delay_before(3), Duration::MAX);
        assert_eq!(policy(u32::MAX).delay_before(u32::MAX), Duration::MAX);
    }

    #[test]
    fn zero_budget_still_attempts_once() {
        assert_eq!(policy(0).attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0u32);
        let start = tokio::time::Instant::now();

        let result: Result<&str, _> = policy(3)
            .run(
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move {
                        if n < 3 {
                            Err(TestError::Busy)
                        } else {
                            Ok("done")
                        }
                    }
                },
                |e| *e == TestError::Busy,
            )
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let calls = Cell::new(0u32);

        let result: Result<(), _> = policy(3)
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err(TestError::Busy) }
                },
                |e| *e == TestError::Busy,
            )
            .await;

        assert_eq!(calls.get(), 3);
        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, TestError::Busy);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_aborts_immediately() {
        let calls = Cell::new(0u32);
        let start = tokio::time::Instant::now();

        let result: Result<(), _> = policy(3)
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err(TestError::Broken) }
                },
                |e| *e == TestError::Busy,
            )
            .await;

        assert_eq!(calls.get(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(result, Err(RetryError::Aborted(TestError::Broken))));
    }
}
