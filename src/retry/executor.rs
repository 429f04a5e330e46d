use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::trace;

use super::{CancelSignal, Cancelled, RetryLogger, RetryPolicy, TimeoutError};

/// Run `operation` under `policy` with no logger and no cancellation.
///
/// On exhaustion or a vetoed retry the last error is returned as-is, so
/// callers can still match on its kind.
pub async fn with_retry<T, E, F, Fut>(operation: F, policy: &RetryPolicy<E>) -> Result<T, E>
where
    E: From<TimeoutError> + From<Cancelled> + fmt::Display + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    RetryExecutor::new(policy.clone()).run(operation).await
}

/// A retry policy bundled with an optional logger and cancel signal.
///
/// Holds no per-call state, so one executor can drive any number of
/// concurrent calls.
pub struct RetryExecutor<E> {
    policy: RetryPolicy<E>,
    logger: Option<Arc<dyn RetryLogger>>,
    cancel: Option<CancelSignal>,
}

impl<E> Clone for RetryExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            logger: self.logger.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("logger", &self.logger.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

enum Attempt<T, E> {
    Done(Result<T, E>),
    Cancelled,
}

impl<E> RetryExecutor<E>
where
    E: From<TimeoutError> + From<Cancelled> + fmt::Display + 'static,
{
    pub fn new(policy: RetryPolicy<E>) -> Self {
        Self {
            policy,
            logger: None,
            cancel: None,
        }
    }

    /// Report every failed attempt to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn RetryLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Stop retrying once `signal` fires.
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Replace the policy, keeping the logger and cancel signal.
    pub fn with_policy(mut self, policy: RetryPolicy<E>) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }

    /// Run `operation` until it succeeds, the policy vetoes a retry, the
    /// retry budget is spent, or the cancel signal fires.
    ///
    /// A cancelled call resolves promptly with `E::from(Cancelled)`; an
    /// attempt in flight at that moment is dropped and its outcome discarded.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retry_index: u32 = 0;
        loop {
            let attempt = retry_index + 1;
            let error = match self.attempt(operation()).await {
                Attempt::Done(Ok(value)) => return Ok(value),
                Attempt::Done(Err(error)) => error,
                Attempt::Cancelled => return Err(E::from(Cancelled)),
            };

            let retry = retry_index < self.policy.max_retries && self.policy.should_retry(&error);
            let delay = retry.then(|| self.policy.delay_for(retry_index));

            if let Some(logger) = &self.logger {
                logger.attempt_failed(attempt, &error, delay);
            }

            let Some(delay) = delay else {
                trace!(attempt, "no retry left");
                return Err(error);
            };

            if !self.sleep(delay).await {
                return Err(E::from(Cancelled));
            }
            retry_index += 1;
        }
    }

    async fn attempt<T, Fut>(&self, future: Fut) -> Attempt<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let bounded = async {
            match self.policy.timeout {
                Some(limit) => match tokio::time::timeout(limit, future).await {
                    Ok(result) => result,
                    Err(_) => Err(E::from(TimeoutError { timeout: limit })),
                },
                None => future.await,
            }
        };

        match &self.cancel {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.cancelled() => Attempt::Cancelled,
                result = bounded => Attempt::Done(result),
            },
            None => Attempt::Done(bounded.await),
        }
    }

    /// Sleep for the backoff. Returns false if cancelled first.
    async fn sleep(&self, delay: std::time::Duration) -> bool {
        match &self.cancel {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            },
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}
