//! ResilientStore - a store handle whose every call goes through a retry executor.
//!
//! This is how callers on the far side of an unreliable hop should talk to a
//! store: transient failures (timeouts, engine hiccups) are retried with
//! backoff; terminal ones (not found, validation, unknown actor) surface on
//! the first attempt.
//!
//! A timed-out attempt is not a failed one. Its command is already in the
//! actor's mailbox and is applied after the caller stops waiting. Reads and
//! `put` can be re-sent blindly, but `cas_put` and `del` report an outcome
//! (`ok`, existed) that a second send would misstate, so those two never
//! retry a timeout: the caller gets `StoreError::Timeout`, meaning "outcome
//! unknown, re-read before deciding".

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::actor::StoreHandle;
use crate::doc::{CasResult, VersionedDoc};
use crate::engine::{ListOptions, ListPage, StorageEngine};
use crate::error::StoreError;
use crate::registry::{ActorId, StoreRegistry};
use crate::retry::{CancelSignal, RetryExecutor, RetryLogger, RetryPolicy};

/// The policy a `ResilientStore` uses unless told otherwise: the default
/// backoff, retrying only [`StoreError::is_retryable`] errors.
pub fn default_store_policy() -> RetryPolicy<StoreError> {
    RetryPolicy::default().with_should_retry(StoreError::is_retryable)
}

/// `policy` with timeouts taken out of the retryable set.
fn outcome_policy(policy: &RetryPolicy<StoreError>) -> RetryPolicy<StoreError> {
    let base = policy.clone();
    policy.clone().with_should_retry(move |err| {
        !matches!(err, StoreError::Timeout { .. }) && base.should_retry(err)
    })
}

/// Retrying client for one store actor.
#[derive(Clone, Debug)]
pub struct ResilientStore {
    handle: StoreHandle,
    executor: RetryExecutor<StoreError>,
    /// Same policy minus timeout retries, for writes whose reply carries an outcome.
    outcome_executor: RetryExecutor<StoreError>,
}

impl ResilientStore {
    pub fn new(handle: StoreHandle, policy: RetryPolicy<StoreError>) -> Self {
        let executor = RetryExecutor::new(policy);
        let outcome_executor = executor
            .clone()
            .with_policy(outcome_policy(executor.policy()));
        Self {
            handle,
            executor,
            outcome_executor,
        }
    }

    /// Resolve `id` through `registry`. Fails immediately on an unknown id;
    /// that is a wiring mistake, not something a retry can fix.
    pub fn connect<E: StorageEngine>(
        registry: &StoreRegistry<E>,
        id: ActorId,
        policy: RetryPolicy<StoreError>,
    ) -> Result<Self, StoreError> {
        Ok(Self::new(registry.get(id)?, policy))
    }

    pub fn with_logger(mut self, logger: Arc<dyn RetryLogger>) -> Self {
        self.executor = self.executor.with_logger(Arc::clone(&logger));
        self.outcome_executor = self.outcome_executor.with_logger(logger);
        self
    }

    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.executor = self.executor.with_cancel(signal.clone());
        self.outcome_executor = self.outcome_executor.with_cancel(signal);
        self
    }

    /// The unwrapped handle, for calls that must not be retried.
    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub async fn get_doc<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<VersionedDoc<T>>, StoreError> {
        self.executor.run(|| self.handle.get_doc(key)).await
    }

    pub async fn require_doc<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<VersionedDoc<T>, StoreError> {
        self.executor.run(|| self.handle.require_doc(key)).await
    }

    /// Engine failures are retried, timeouts are not. After a timeout the
    /// write may or may not have been applied; a retry would compare against
    /// the caller's own write and report a false `ok: false`.
    pub async fn cas_put<V: Serialize + ?Sized>(
        &self,
        key: &str,
        expected_version: u64,
        value: &V,
    ) -> Result<CasResult, StoreError> {
        self.outcome_executor
            .run(|| self.handle.cas_put(key, expected_version, value))
            .await
    }

    pub async fn put<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
    ) -> Result<u64, StoreError> {
        self.executor.run(|| self.handle.put(key, value)).await
    }

    /// Like `cas_put`, a timeout is returned rather than retried: a re-sent
    /// delete would report `false` for a key the first send removed.
    pub async fn del(&self, key: &str) -> Result<bool, StoreError> {
        self.outcome_executor.run(|| self.handle.del(key)).await
    }

    pub async fn has(&self, key: &str) -> Result<bool, StoreError> {
        self.executor.run(|| self.handle.has(key)).await
    }

    pub async fn list_prefix<T: DeserializeOwned>(
        &self,
        prefix: &str,
        limit: Option<usize>,
    ) -> Result<Vec<T>, StoreError> {
        self.executor
            .run(|| self.handle.list_prefix(prefix, limit))
            .await
    }

    pub async fn list_keys(&self, options: ListOptions) -> Result<ListPage, StoreError> {
        self.executor
            .run(|| self.handle.list_keys(options.clone()))
            .await
    }
}
