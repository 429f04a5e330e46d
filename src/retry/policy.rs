use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

type ShouldRetry<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// How many times to retry, how long to wait between attempts, and which
/// errors qualify.
///
/// Immutable once handed to an executor; clones share the predicate.
pub struct RetryPolicy<E> {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each retry after that.
    pub base_delay: Duration,
    /// Upper bound of the random delay added to every backoff.
    pub jitter: Duration,
    /// Per-attempt timeout. `None` lets an attempt run as long as it needs.
    pub timeout: Option<Duration>,
    should_retry: ShouldRetry<E>,
}

impl<E: 'static> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            jitter: Duration::ZERO,
            timeout: None,
            should_retry: Arc::new(|_: &E| true),
        }
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            jitter: self.jitter,
            timeout: self.timeout,
            should_retry: Arc::clone(&self.should_retry),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("jitter", &self.jitter)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<E: 'static> RetryPolicy<E> {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Only errors for which `predicate` returns true are retried; any other
    /// error ends the call immediately.
    pub fn with_should_retry(
        mut self,
        predicate: impl Fn(&E) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Arc::new(predicate);
        self
    }

    pub fn should_retry(&self, error: &E) -> bool {
        (self.should_retry)(error)
    }

    /// Backoff before retry `retry_index` (0 = the wait before the second
    /// attempt): `base_delay * 2^retry_index + uniform[0, jitter]`.
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_index).unwrap_or(u32::MAX);
        let backoff = self.base_delay.saturating_mul(factor);
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return backoff;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        backoff.saturating_add(Duration::from_millis(extra))
    }

    /// Worst-case wall time of a call: every attempt times out and every
    /// backoff draws maximum jitter. `None` without a timeout.
    pub fn worst_case(&self) -> Option<Duration> {
        let timeout = self.timeout?;
        let attempts = self.max_retries.saturating_add(1);
        let mut total = timeout.saturating_mul(attempts);
        for retry in 0..self.max_retries {
            let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
            total = total
                .saturating_add(self.base_delay.saturating_mul(factor))
                .saturating_add(self.jitter);
        }
        Some(total)
    }
}

/// Serializable retry configuration, e.g. loaded from a JSON config file.
///
/// Field names follow the camelCase of client configs
/// (`{"maxRetries": 2, "baseDelayMs": 250}`). Missing fields take the
/// [`RetryPolicy`] defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    pub timeout_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            jitter_ms: 0,
            timeout_ms: None,
        }
    }
}

impl RetrySettings {
    /// Build a policy that retries every error.
    pub fn into_policy<E: 'static>(self) -> RetryPolicy<E> {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
            timeout: self.timeout_ms.map(Duration::from_millis),
            ..RetryPolicy::default()
        }
    }
}

impl<E: 'static> From<RetrySettings> for RetryPolicy<E> {
    fn from(settings: RetrySettings) -> Self {
        settings.into_policy()
    }
}
