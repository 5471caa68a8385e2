//! Retry with an explicit record of every failed attempt.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::errors::{BenchError, BenchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub retries: u32,
    /// Fixed wait between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff: Duration) -> Self {
        Self { retries, backoff }
    }
}

/// One attempt's result. Attempts are numbered from 1.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    Failure { error: BenchError, attempt: u32 },
}

impl<T> Attempt<T> {
    /// `Attempt N: <message>` for failures.
    pub fn message(&self) -> Option<String> {
        match self {
            Attempt::Success(_) => None,
            Attempt::Failure { error, attempt } => Some(format!("Attempt {}: {}", attempt, error)),
        }
    }
}

/// Every attempt made, in order. The last one is the only possible success.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub attempts: Vec<Attempt<T>>,
}

impl<T> RetryOutcome<T> {
    pub fn succeeded(&self) -> bool {
        matches!(self.attempts.last(), Some(Attempt::Success(_)))
    }

    /// Attempts beyond the first.
    pub fn retries_used(&self) -> u32 {
        self.attempts.len().saturating_sub(1) as u32
    }

    pub fn failure_messages(&self) -> Vec<String> {
        self.attempts.iter().filter_map(Attempt::message).collect()
    }

    pub fn into_value(self) -> Option<T> {
        match self.attempts.into_iter().last() {
            Some(Attempt::Success(value)) => Some(value),
            _ => None,
        }
    }
}

/// Run `op` up to `retries + 1` times, waiting `backoff` between attempts.
///
/// Errors that aren't retryable end the sequence immediately.
pub async fn retry_with_tracking<T, F, Fut>(policy: RetryPolicy, mut op: F) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = BenchResult<T>>,
{
    let max_attempts = policy.retries.saturating_add(1);
    let mut attempts = Vec::new();

    for attempt in 1..=max_attempts {
        match op(attempt).await {
            Ok(value) => {
                attempts.push(Attempt::Success(value));
                break;
            }
            Err(error) => {
                let retryable = error.is_retryable();
                let last = attempt == max_attempts || !retryable;
                warn!(
                    error = %error,
                    kind = error.kind(),
                    attempt,
                    max_attempts,
                    retryable,
                    "attempt failed"
                );
                attempts.push(Attempt::Failure { error, attempt });
                if last {
                    break;
                }
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    RetryOutcome { attempts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::ZERO)
    }

    #[tokio::test]
    async fn first_try_success() {
        let outcome = retry_with_tracking(policy(3), |_| async { Ok::<_, BenchError>(7) }).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.retries_used(), 0);
        assert!(outcome.failure_messages().is_empty());
        assert_eq!(outcome.into_value(), Some(7));
    }

    #[tokio::test]
    async fn success_after_failures_keeps_messages() {
        let outcome = retry_with_tracking(policy(3), |attempt| async move {
            if attempt < 3 {
                Err(BenchError::driver(format!("flaky {attempt}")))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.retries_used(), 2);
        assert_eq!(
            outcome.failure_messages(),
            vec!["Attempt 1: driver error: flaky 1", "Attempt 2: driver error: flaky 2"]
        );
    }

    #[tokio::test]
    async fn exhaustion_uses_every_retry() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = retry_with_tracking(policy(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BenchError::timeout("balance", 20_000)) }
        })
        .await;
        assert!(!outcome.succeeded());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.retries_used(), 2);
        assert_eq!(outcome.failure_messages().len(), 3);
        assert!(outcome.into_value().is_none());
    }

    #[tokio::test]
    async fn non_retryable_errors_stop_early() {
        let outcome: RetryOutcome<()> = retry_with_tracking(policy(5), |_| async {
            Err(BenchError::ReplayExhausted {
                flow: "token-send".into(),
            })
        })
        .await;
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.retries_used(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_is_applied_between_attempts() {
        let started = tokio::time::Instant::now();
        let _: RetryOutcome<()> = retry_with_tracking(
            RetryPolicy::new(2, Duration::from_millis(1000)),
            |_| async { Err(BenchError::driver("down")) },
        )
        .await;
        assert!(started.elapsed() >= Duration::from_millis(2000));
    }
}
