//! Retry policy for checkpoint operations.
//!
//! A failed save or restore is repeated as a whole. Every object write is a
//! full overwrite and every restored record is keyed by id, so repeating an
//! operation converges on the same final state as running it once.
//!
//! The policy decides *whether* and *when* to retry; [`Retrier`] runs the
//! loop, logs each failure, and races the wait against a
//! [`CancellationToken`] so a shutdown never sits out a full interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use cellsnap_core::PartitionId;

use crate::error::{CheckpointError, CheckpointResult};

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then run the operation again
    RetryAfter(Duration),
    /// Stop and report the failure
    GiveUp,
}

/// Decides whether a failed attempt is retried.
///
/// Only transient errors are offered to the policy; permanent ones fail
/// the operation immediately.
pub trait RetryPolicy: Send + Sync {
    /// Decide after `attempt` (1-based) failed with `error`
    fn decide(&self, attempt: u32, error: &CheckpointError) -> RetryDecision;
}

/// Constant interval between attempts, optionally bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    /// Delay before each retry
    pub interval: Duration,
    /// Total attempts allowed; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl FixedBackoff {
    /// Unbounded retries every `interval`
    pub fn new(interval: Duration) -> Self {
        FixedBackoff {
            interval,
            max_attempts: None,
        }
    }

    /// Stop after `attempts` total attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

impl Default for FixedBackoff {
    fn default() -> Self {
        FixedBackoff::new(Duration::from_secs(5))
    }
}

impl RetryPolicy for FixedBackoff {
    fn decide(&self, attempt: u32, _error: &CheckpointError) -> RetryDecision {
        match self.max_attempts {
            Some(max) if attempt >= max => RetryDecision::GiveUp,
            _ => RetryDecision::RetryAfter(self.interval),
        }
    }
}

/// Runs an operation under a retry policy and a cancellation token
#[derive(Clone)]
pub struct Retrier {
    policy: Arc<dyn RetryPolicy>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Retrier {
    /// Create a retrier
    pub fn new(policy: Arc<dyn RetryPolicy>, cancel: CancellationToken) -> Self {
        Retrier { policy, cancel }
    }

    /// The token that aborts pending retries
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Replace the policy
    pub fn with_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `attempt_fn` until it succeeds, fails permanently, the policy
    /// gives up, or the token is cancelled.
    ///
    /// `operation` names the operation in log output ("save image",
    /// "load signature", ...).
    pub async fn run<T, F, Fut>(
        &self,
        partition: PartitionId,
        operation: &'static str,
        mut attempt_fn: F,
    ) -> CheckpointResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CheckpointResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(CheckpointError::Cancelled { partition });
            }
            attempt += 1;

            let err = match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_transient() {
                return Err(err);
            }

            match self.policy.decide(attempt, &err) {
                RetryDecision::RetryAfter(delay) => {
                    error!(
                        target: "cellsnap::checkpoint",
                        partition = %partition,
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Failed to {} for partition {}, retrying",
                        operation,
                        partition
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(CheckpointError::Cancelled { partition });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp => {
                    warn!(
                        target: "cellsnap::checkpoint",
                        partition = %partition,
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Giving up"
                    );
                    return Err(CheckpointError::RetriesExhausted {
                        partition,
                        attempts: attempt,
                        last_error: Box::new(err),
                    });
                }
            }
        }
    }
}

impl Default for Retrier {
    fn default() -> Self {
        Retrier::new(Arc::new(FixedBackoff::default()), CancellationToken::new())
    }
}
