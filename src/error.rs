use std::fmt;
use std::time::Duration;

use crate::engine::EngineError;
use crate::registry::ActorId;
use crate::retry::{Cancelled, TimeoutError};

/// Error type for versioned store operations.
///
/// A stale compare-and-swap is not an error: `cas_put` reports it as
/// `CasResult { ok: false, .. }`. `Conflict` only appears from the strict
/// wrappers (`cas_put_strict`, `update`, typed collection writes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key does not exist where a document was required.
    NotFound { key: String },
    /// Optimistic concurrency conflict surfaced by a strict-mode write.
    Conflict {
        key: String,
        expected: u64,
        actual: u64,
    },
    /// A single attempt exceeded its configured timeout.
    Timeout { timeout: Duration },
    /// The caller's cancel signal fired.
    Cancelled,
    /// The request was rejected before reaching storage (e.g. empty key, bad cursor).
    Validation(String),
    /// No actor is registered under this identity.
    UnknownActor(ActorId),
    /// The actor has shut down and no longer accepts commands.
    ActorStopped,
    /// The storage engine failed underneath the actor.
    Engine(String),
    /// Serialization/deserialization error.
    Serde(String),
}

impl StoreError {
    /// Whether a retry has a chance of succeeding.
    ///
    /// Timeouts and engine failures are transient; everything else is a
    /// property of the request or of the deployment and will fail again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Timeout { .. } | StoreError::Engine(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { key } => write!(f, "document not found: {}", key),
            StoreError::Conflict {
                key,
                expected,
                actual,
            } => write!(
                f,
                "stale version for {} (expected version {}, actual {})",
                key, expected, actual
            ),
            StoreError::Timeout { timeout } => {
                write!(f, "operation timed out after {}ms", timeout.as_millis())
            }
            StoreError::Cancelled => write!(f, "operation cancelled"),
            StoreError::Validation(msg) => write!(f, "invalid request: {}", msg),
            StoreError::UnknownActor(id) => write!(f, "no store actor registered for {}", id),
            StoreError::ActorStopped => write!(f, "store actor has stopped"),
            StoreError::Engine(msg) => write!(f, "storage engine error: {}", msg),
            StoreError::Serde(msg) => write!(f, "document serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<EngineError> for StoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidCursor(msg) => StoreError::Validation(msg),
            other => StoreError::Engine(other.to_string()),
        }
    }
}

impl From<TimeoutError> for StoreError {
    fn from(err: TimeoutError) -> Self {
        StoreError::Timeout {
            timeout: err.timeout,
        }
    }
}

impl From<Cancelled> for StoreError {
    fn from(_: Cancelled) -> Self {
        StoreError::Cancelled
    }
}
