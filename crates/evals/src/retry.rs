//! Bounded retries around judge calls
//!
//! Every stage that talks to a model wraps one logical decision in a retry
//! budget. Failures on all but the last attempt are logged and swallowed;
//! the last attempt's error is returned unchanged so callers can match on
//! the operation's own error type.

use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Retry budget used by evaluators and the generator unless configured
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Run `op` until it succeeds, at most `max_retries + 1` times
///
/// `op` receives the number of retries remaining after the current attempt
/// (`max_retries` on the first call, `0` on the last).
pub async fn attempt<T, E, F, Fut>(max_retries: u32, op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    attempt_validated(max_retries, op, |_| true).await
}

/// Like [`attempt`], but a successful value must also satisfy `accept`
///
/// A rejected value is retried while budget remains. On the final attempt the
/// value is returned even if rejected, so the caller can record it as-is.
pub async fn attempt_validated<T, E, F, Fut, P>(max_retries: u32, mut op: F, accept: P) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let mut remaining = max_retries;
    loop {
        match op(remaining).await {
            Ok(value) if remaining == 0 || accept(&value) => return Ok(value),
            Ok(_) => warn!(remaining, "Rejected judge output, retrying"),
            Err(e) if remaining == 0 => return Err(e),
            Err(e) => warn!(remaining, error = %e, "Attempt failed, retrying"),
        }
        remaining -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    struct Flaky(u32);

    impl Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky attempt {}", self.0)
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_last_allowed_attempt() {
        let calls = AtomicU32::new(0);
        let result = attempt(3, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { if n < 4 { Err(Flaky(n)) } else { Ok(n) } }
        })
        .await;

        assert_eq!(result, Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_always_failing_returns_own_error_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Flaky> = attempt(2, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(Flaky(n)) }
        })
        .await;

        assert_eq!(result, Err(Flaky(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Flaky> = attempt(0, |remaining| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(Flaky(remaining)) }
        })
        .await;

        assert_eq!(result, Err(Flaky(0)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remaining_counts_down() {
        let seen = std::sync::Mutex::new(Vec::new());
        let _: Result<(), Flaky> = attempt(3, |remaining| {
            seen.lock().unwrap().push(remaining);
            async move { Err(Flaky(remaining)) }
        })
        .await;

        assert_eq!(*seen.lock().unwrap(), vec![3, 2, 1, 0]);
    }

    #[tokio::test]
    async fn test_validated_retries_rejected_values() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, Flaky> = attempt_validated(
            3,
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(if n < 2 { 0 } else { 1 }) }
            },
            |verdict| *verdict > 0,
        )
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_validated_accepts_rejected_value_on_last_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, Flaky> = attempt_validated(
            1,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(-1) }
            },
            |verdict| *verdict > 0,
        )
        .await;

        assert_eq!(result, Ok(-1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
