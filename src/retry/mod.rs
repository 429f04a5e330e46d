//! Retry - exponential backoff with jitter around any async operation.
//!
//! [`with_retry`] runs an operation up to `max_retries + 1` times. Before
//! retry `n` (counting from 0) it sleeps `base_delay * 2^n` plus a random
//! jitter in `[0, jitter]`. Each attempt can be bounded by a timeout, and a
//! caller-supplied predicate decides which errors are worth another try.
//!
//! The timeout applies per attempt, not to the whole call: a policy with
//! `max_retries = 3` and a 1s timeout can take about 4s plus the summed
//! backoff in the worst case. Budget SLAs accordingly.
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use versioned_store::retry::{with_retry, RetryPolicy};
//!
//! let policy = RetryPolicy::default()
//!     .with_max_retries(2)
//!     .with_base_delay(Duration::from_millis(100))
//!     .with_timeout(Duration::from_secs(1))
//!     .with_should_retry(|e: &StoreError| e.is_retryable());
//!
//! let doc = with_retry(|| handle.get_doc::<Grade>("grades:alice"), &policy).await?;
//! ```

mod executor;
mod policy;

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tracing::error;

pub use executor::{with_retry, RetryExecutor};
pub use policy::{RetryPolicy, RetrySettings};

/// An attempt ran longer than the policy's per-attempt timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError {
    pub timeout: Duration,
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt timed out after {}ms", self.timeout.as_millis())
    }
}

impl std::error::Error for TimeoutError {}

/// The retry loop was stopped by its [`CancelSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retry cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Fires a cancellation observed by every clone of its [`CancelSignal`].
#[derive(Debug)]
pub struct CancelTrigger {
    tx: watch::Sender<bool>,
}

impl CancelTrigger {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving side of a cancellation. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Never resolves if the trigger is dropped
    /// without firing.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a linked trigger/signal pair.
pub fn cancel_pair() -> (CancelTrigger, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger { tx }, CancelSignal { rx })
}

/// Receives a report for every failed attempt.
pub trait RetryLogger: Send + Sync {
    /// `attempt` is 1-based. `retry_in` is the backoff before the next
    /// attempt, or `None` when the failure is final.
    fn attempt_failed(&self, attempt: u32, error: &dyn fmt::Display, retry_in: Option<Duration>);
}

/// Reports failed attempts as `tracing` error events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RetryLogger for TracingLogger {
    fn attempt_failed(&self, attempt: u32, err: &dyn fmt::Display, retry_in: Option<Duration>) {
        match retry_in {
            Some(delay) => error!(
                attempt,
                error = %err,
                retry_in_ms = delay.as_millis() as u64,
                "attempt failed, retrying"
            ),
            None => error!(attempt, error = %err, "attempt failed, giving up"),
        }
    }
}
