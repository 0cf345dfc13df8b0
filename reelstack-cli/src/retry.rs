//! Bounded exponential-backoff retries around eventually-consistent
//! control-plane operations.
//!
//! Every attempt re-invokes the full operation; only transient failures
//! are absorbed, and the last error is propagated once the attempt budget
//! is exhausted.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use reelstack_common::retry::{AttemptRecord, RetryPolicy};
use reelstack_common::{Error, Result};

/// Run `operation` under `policy`, returning the first success or the last
/// error after the attempt budget is spent.
///
/// Non-transient errors propagate immediately: a terminal provisioning
/// failure or a rejected request will not change on a second attempt.
pub async fn retry<T, F, Fut>(label: &str, policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let (result, _attempts) = retry_with_records(label, policy, operation).await;
    result
}

/// Like [`retry`], additionally returning the record of every attempt made.
pub async fn retry_with_records<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> (Result<T>, Vec<AttemptRecord>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts: Vec<AttemptRecord> = Vec::new();

    loop {
        let attempt = attempts.len() as u32 + 1;

        match operation().await {
            Ok(value) => {
                attempts.push(AttemptRecord::success(attempt));
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", label, attempt);
                }
                return (Ok(value), attempts);
            }
            Err(err) => {
                attempts.push(AttemptRecord::failure(attempt, err.to_string()));

                if !err.is_transient() {
                    tracing::error!("{} failed with non-retryable error: {}", label, err);
                    return (Err(err), attempts);
                }

                if !policy.allows_another(attempt) {
                    tracing::error!(
                        "{} failed after {} attempts: {}",
                        label,
                        attempt,
                        err
                    );
                    return (Err(err), attempts);
                }

                let delay = next_delay(policy, attempt - 1);
                tracing::warn!(
                    "{} attempt {}/{} failed ({}), retrying in {:?}",
                    label,
                    attempt,
                    policy.max_attempts,
                    err,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}

/// Delay before the attempt that follows `completed_failures` failures:
/// the policy's exponential bound, or a uniform draw below it when the
/// policy asks for jitter.
fn next_delay(policy: &RetryPolicy, completed_failures: u32) -> Duration {
    let bound = policy.delay_for(completed_failures);
    if policy.jitter && bound > Duration::ZERO {
        let millis = rand::thread_rng().gen_range(0..=bound.as_millis() as u64);
        Duration::from_millis(millis)
    } else {
        bound
    }
}
