//! Per-batch retry state machine with exponential backoff.
//!
//! Each batch moves `Pending -> InFlight -> {Succeeded, InFlight (retry),
//! Failed}`. The state is an explicit value and the transitions are pure
//! functions so the policy is testable without any network.

use std::time::Duration;

/// Outcome of a single provider call for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Success,
    /// Timeout, connection failure, 408/429/5xx - retried with backoff
    Transient(String),
    /// Auth/client errors and malformed bodies - abort immediately
    Fatal(String),
}

/// Retry state of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    InFlight { attempt: u32 },
    Succeeded,
    Failed,
}

/// Next step for the loop driving a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Issue the provider call (attempt is 0-based)
    Call { attempt: u32 },
    /// Sleep, then call again
    Backoff { delay: Duration, next_attempt: u32 },
    /// Batch completed
    Done,
    /// Retries exhausted or non-transient failure
    Abort,
}

/// Retry policy shared by the sync and async clients
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Exponential backoff: 2^attempt seconds
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(2u64.saturating_pow(attempt))
    }

    /// Start a pending batch
    pub fn dispatch(&self, state: BatchState) -> (BatchState, Transition) {
        match state {
            BatchState::Pending => (
                BatchState::InFlight { attempt: 0 },
                Transition::Call { attempt: 0 },
            ),
            BatchState::InFlight { attempt } => (state, Transition::Call { attempt }),
            BatchState::Succeeded => (state, Transition::Done),
            BatchState::Failed => (state, Transition::Abort),
        }
    }

    /// Apply a call outcome to an in-flight batch
    pub fn observe(&self, state: BatchState, outcome: &BatchOutcome) -> (BatchState, Transition) {
        let attempt = match state {
            BatchState::InFlight { attempt } => attempt,
            // Terminal or not-yet-dispatched states do not move
            BatchState::Succeeded => return (state, Transition::Done),
            _ => return (state, Transition::Abort),
        };

        match outcome {
            BatchOutcome::Success => (BatchState::Succeeded, Transition::Done),
            BatchOutcome::Transient(_) if attempt < self.max_retries => {
                let next_attempt = attempt + 1;
                (
                    BatchState::InFlight {
                        attempt: next_attempt,
                    },
                    Transition::Backoff {
                        delay: self.backoff(attempt),
                        next_attempt,
                    },
                )
            }
            BatchOutcome::Transient(_) | BatchOutcome::Fatal(_) => {
                (BatchState::Failed, Transition::Abort)
            }
        }
    }
}

/// Classify an HTTP status into a batch outcome
pub fn outcome_for_status(status: u16, body: &str) -> BatchOutcome {
    match status {
        200..=299 => BatchOutcome::Success,
        408 | 429 | 500..=599 => {
            BatchOutcome::Transient(format!("provider returned HTTP {}: {}", status, body))
        }
        _ => BatchOutcome::Fatal(format!("provider returned HTTP {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_on_first_attempt() {
        let policy = RetryPolicy::default();
        let (state, transition) = policy.dispatch(BatchState::Pending);
        assert_eq!(transition, Transition::Call { attempt: 0 });

        let (state, transition) = policy.observe(state, &BatchOutcome::Success);
        assert_eq!(state, BatchState::Succeeded);
        assert_eq!(transition, Transition::Done);
    }

    #[test]
    fn test_transient_then_success() {
        let policy = RetryPolicy::default();
        let (state, _) = policy.dispatch(BatchState::Pending);

        let (state, transition) =
            policy.observe(state, &BatchOutcome::Transient("timeout".to_string()));
        assert_eq!(state, BatchState::InFlight { attempt: 1 });
        assert_eq!(
            transition,
            Transition::Backoff {
                delay: Duration::from_secs(1),
                next_attempt: 1,
            }
        );

        let (state, transition) = policy.observe(state, &BatchOutcome::Success);
        assert_eq!(state, BatchState::Succeeded);
        assert_eq!(transition, Transition::Done);
    }

    #[test]
    fn test_retries_exhausted() {
        let policy = RetryPolicy::new(2);
        let (mut state, _) = policy.dispatch(BatchState::Pending);
        let transient = BatchOutcome::Transient("503".to_string());

        // attempts 0 and 1 back off, attempt 2 aborts
        for expected_delay in [1u64, 2] {
            let (next, transition) = policy.observe(state, &transient);
            match transition {
                Transition::Backoff { delay, .. } => {
                    assert_eq!(delay, Duration::from_secs(expected_delay))
                }
                other => panic!("expected backoff, got {:?}", other),
            }
            state = next;
        }

        let (state, transition) = policy.observe(state, &transient);
        assert_eq!(state, BatchState::Failed);
        assert_eq!(transition, Transition::Abort);
    }

    #[test]
    fn test_fatal_aborts_immediately() {
        let policy = RetryPolicy::default();
        let (state, _) = policy.dispatch(BatchState::Pending);

        let (state, transition) =
            policy.observe(state, &BatchOutcome::Fatal("401".to_string()));
        assert_eq!(state, BatchState::Failed);
        assert_eq!(transition, Transition::Abort);
    }

    #[test]
    fn test_backoff_is_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn test_outcome_for_status() {
        assert_eq!(outcome_for_status(200, ""), BatchOutcome::Success);
        assert!(matches!(
            outcome_for_status(429, "rate limit"),
            BatchOutcome::Transient(_)
        ));
        assert!(matches!(
            outcome_for_status(503, ""),
            BatchOutcome::Transient(_)
        ));
        assert!(matches!(
            outcome_for_status(401, "bad key"),
            BatchOutcome::Fatal(_)
        ));
    }
}
