// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Retry Policy
//!
//! This module provides a bounded retry-with-backoff wrapper around a single
//! handler invocation. Only transient handler failures (timeouts, transport
//! errors) are retried; anything else propagates immediately. Backoff sleeps
//! race against the caller's cancellation token so shutdown never waits out
//! a full delay.

use crate::errors::HandlerError;
use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Terminal outcome of executing an action under the retry policy.
#[derive(Debug)]
pub enum RetryOutcome {
    /// The action succeeded within the attempt bound
    Success,
    /// The action failed with a non-transient error; no retry was attempted
    Failed(HandlerError),
    /// Every attempt failed transiently; carries the last failure
    Exhausted(HandlerError),
    /// Cancellation fired during a backoff sleep
    Aborted,
}

/// Bounded retry with exponential backoff.
///
/// `max_attempts` counts every invocation, the initial one included. The
/// delay before attempt `n + 1` is `base_delay * multiplier^(n - 1)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with an explicit attempt bound and backoff curve.
    ///
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt.saturating_sub(1))
    }

    /// Runs `action` until it succeeds, fails non-transiently, exhausts the
    /// attempt bound, or the token is cancelled mid-backoff.
    ///
    /// # Parameters
    /// * `token` - Cancellation signal raced against every backoff sleep
    /// * `action` - One attempt at the operation; called up to `max_attempts` times
    pub async fn execute<F, Fut>(&self, token: &CancellationToken, mut action: F) -> RetryOutcome
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<(), HandlerError>> + Send,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match action().await {
                Ok(()) => return RetryOutcome::Success,
                Err(err) if !err.is_transient() => return RetryOutcome::Failed(err),
                Err(err) => {
                    if attempt >= self.max_attempts {
                        return RetryOutcome::Exhausted(err);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        error = err.to_string(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, waiting before next attempt"
                    );

                    tokio::select! {
                        _ = token.cancelled() => return RetryOutcome::Aborted,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    fn transient() -> HandlerError {
        HandlerError::Timeout("simulated".to_owned())
    }

    #[tokio::test]
    async fn succeeds_first_try_without_sleeping() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();
        let token = CancellationToken::new();

        let counted = calls.clone();
        let outcome = policy
            .execute(&token, || {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Success));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(100), 2);
        let token = CancellationToken::new();

        let counted = calls.clone();
        let outcome = policy
            .execute(&token, || {
                let n = counted.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(transient())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Success));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(100), 2);
        let token = CancellationToken::new();

        let counted = calls.clone();
        let outcome = policy
            .execute(&token, || {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Exhausted(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_failure_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();
        let token = CancellationToken::new();

        let counted = calls.clone();
        let outcome = policy
            .execute(&token, || {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Err(HandlerError::Fatal("broken".to_owned())) }
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Failed(HandlerError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_backoff_early() {
        // Backoff far longer than the cancellation delay: if the select does
        // not abort promptly this test would advance virtual time by hours.
        let policy = RetryPolicy::new(3, Duration::from_secs(3600), 2);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let outcome = policy
            .execute(&token, || async { Err(transient()) })
            .await;

        assert!(matches!(outcome, RetryOutcome::Aborted));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
