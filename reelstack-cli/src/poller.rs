//! Readiness polling for asynchronously provisioned resources.
//!
//! A single sequential wait loop: exactly one resource is awaited at a
//! time, with a fixed interval between state queries and a hard deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use reelstack_common::{ProvisioningState, Result};

/// How a readiness wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The resource reached Succeeded
    Succeeded,
    /// The provider reported a terminal Failed state
    Failed,
    /// The deadline lapsed before any terminal state was seen
    TimedOut,
}

impl std::fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Poll `query` until the resource reaches a terminal state or `deadline`
/// lapses.
///
/// Returns on the first `Succeeded` or `Failed` observation without an
/// extra sleep; the caller decides whether a non-success outcome is fatal.
/// Query errors propagate immediately.
pub async fn await_ready<F, Fut>(
    mut query: F,
    poll_interval: Duration,
    deadline: Duration,
) -> Result<PollOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ProvisioningState>>,
{
    let started = Instant::now();

    loop {
        let state = query().await?;

        match state {
            ProvisioningState::Succeeded => return Ok(PollOutcome::Succeeded),
            ProvisioningState::Failed => return Ok(PollOutcome::Failed),
            ProvisioningState::Pending | ProvisioningState::InProgress => {
                if started.elapsed() >= deadline {
                    tracing::warn!(
                        "readiness wait exceeded deadline of {:?} (last state: {})",
                        deadline,
                        state
                    );
                    return Ok(PollOutcome::TimedOut);
                }
                tracing::debug!("resource not ready ({}), polling again in {:?}", state, poll_interval);
                sleep(poll_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn state_sequence(
        states: Vec<ProvisioningState>,
    ) -> (
        impl FnMut() -> std::future::Ready<Result<ProvisioningState>>,
        Arc<AtomicU32>,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let query = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) as usize;
            // Hold the last state once the scripted sequence runs out.
            let state = states[n.min(states.len() - 1)];
            std::future::ready(Ok(state))
        };
        (query, calls)
    }

    #[tokio::test]
    async fn returns_immediately_when_already_ready() {
        let (query, calls) = state_sequence(vec![ProvisioningState::Succeeded]);

        let started = std::time::Instant::now();
        let outcome = await_ready(query, Duration::from_secs(60), Duration::from_secs(600))
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Zero sleeps: far below even one poll interval.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn returns_on_first_failed_without_further_polling() {
        let (query, calls) = state_sequence(vec![ProvisioningState::Failed]);

        let outcome = await_ready(query, Duration::from_secs(60), Duration::from_secs(600))
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn polls_through_pending_states_until_ready() {
        let (query, calls) = state_sequence(vec![
            ProvisioningState::Pending,
            ProvisioningState::InProgress,
            ProvisioningState::InProgress,
            ProvisioningState::Succeeded,
        ]);

        let outcome = await_ready(query, Duration::from_millis(5), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn times_out_when_resource_never_settles() {
        let (query, calls) = state_sequence(vec![ProvisioningState::InProgress]);

        let outcome = await_ready(query, Duration::from_millis(5), Duration::from_millis(25))
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::TimedOut);
        // At least a couple of polls happened before the deadline lapsed.
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn propagates_query_errors() {
        let result = await_ready(
            || {
                std::future::ready(Err(reelstack_common::Error::Transient(
                    "connection refused".to_string(),
                )))
            },
            Duration::from_millis(5),
            Duration::from_millis(50),
        )
        .await;

        assert!(result.is_err());
    }
}
