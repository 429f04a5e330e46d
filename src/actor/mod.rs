//! Store actors - one serialized writer per key namespace.
//!
//! A [`StoreActor`] owns a [`StorageEngine`](crate::StorageEngine) and runs as
//! a tokio task that drains a bounded mailbox one command at a time. Because
//! no two commands for a namespace ever interleave, the version check and the
//! write inside `cas_put` are atomic without any lock held across the
//! boundary. Callers talk to the actor through a cloneable [`StoreHandle`].
//!
//! Reads are queued behind writes, so a read observes every write that was
//! acknowledged before it was sent.
//!
//! ## Example
//!
//! ```ignore
//! use versioned_store::{InMemoryEngine, StoreActor, StoreConfig, ActorId, NO_DOCUMENT};
//!
//! let id = ActorId::from_name("grades");
//! let handle = StoreActor::spawn(id, InMemoryEngine::new(), StoreConfig::default());
//! let result = handle.cas_put("grades:alice", NO_DOCUMENT, &grade).await?;
//! assert!(result.ok);
//! ```

mod actor;
mod handle;

use tokio::sync::oneshot;

use crate::doc::{CasResult, Codec};
use crate::engine::{ListOptions, ListPage, StoredDoc};
use crate::error::StoreError;

pub use actor::StoreActor;
pub use handle::StoreHandle;

/// Configuration for a store actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Commands that may queue before senders wait for room.
    pub mailbox_capacity: usize,
    /// Upper bound on keys returned by a single list call.
    pub max_list_limit: usize,
    /// Payload encoding used by handles to this actor.
    pub codec: Codec,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            max_list_limit: 1000,
            codec: Codec::Json,
        }
    }
}

impl StoreConfig {
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    pub fn with_max_list_limit(mut self, limit: usize) -> Self {
        self.max_list_limit = limit;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Resolve a caller-supplied limit against the configured ceiling.
    pub(crate) fn clamp_limit(&self, limit: Option<usize>) -> usize {
        limit.map_or(self.max_list_limit, |l| l.min(self.max_list_limit))
    }
}

/// Counters kept by a store actor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ActorStats {
    /// Commands processed, of any kind.
    pub commands: usize,
    /// Compare-and-swap writes that were applied.
    pub cas_applied: usize,
    /// Compare-and-swap writes rejected for a stale version.
    pub cas_rejected: usize,
    /// Unconditional writes (single or batched keys).
    pub puts: usize,
    /// Keys actually removed.
    pub deletes: usize,
}

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

/// Messages a handle sends to its actor. Payloads are already encoded.
pub(crate) enum Command {
    Get {
        key: String,
        reply: Reply<Option<StoredDoc>>,
    },
    GetMany {
        keys: Vec<String>,
        reply: Reply<Vec<(String, StoredDoc)>>,
    },
    Has {
        key: String,
        reply: Reply<bool>,
    },
    CasPut {
        key: String,
        expected: u64,
        bytes: Vec<u8>,
        reply: Reply<CasResult>,
    },
    Put {
        key: String,
        bytes: Vec<u8>,
        reply: Reply<u64>,
    },
    PutMany {
        entries: Vec<(String, Vec<u8>)>,
        reply: Reply<Vec<(String, u64)>>,
    },
    Delete {
        key: String,
        reply: Reply<bool>,
    },
    DeleteMany {
        keys: Vec<String>,
        reply: Reply<usize>,
    },
    ListValues {
        prefix: String,
        limit: Option<usize>,
        reply: Reply<Vec<StoredDoc>>,
    },
    ListKeys {
        options: ListOptions,
        reply: Reply<ListPage>,
    },
    Stats {
        reply: oneshot::Sender<ActorStats>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "get",
            Command::GetMany { .. } => "get_many",
            Command::Has { .. } => "has",
            Command::CasPut { .. } => "cas_put",
            Command::Put { .. } => "put",
            Command::PutMany { .. } => "put_many",
            Command::Delete { .. } => "delete",
            Command::DeleteMany { .. } => "delete_many",
            Command::ListValues { .. } => "list_values",
            Command::ListKeys { .. } => "list_keys",
            Command::Stats { .. } => "stats",
            Command::Shutdown { .. } => "shutdown",
        }
    }
}
