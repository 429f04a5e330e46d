mod actor;
mod collection;
mod doc;
mod engine;
mod error;
mod registry;
mod resilient;
pub mod retry;

pub use actor::{ActorStats, StoreActor, StoreConfig, StoreHandle};
pub use collection::Collection;
pub use doc::{CasResult, Codec, Document, VersionedDoc, NO_DOCUMENT};
pub use engine::{
    EngineError, InMemoryCheckpoint, InMemoryEngine, ListOptions, ListPage, StorageEngine,
    StoredDoc,
};
pub use error::StoreError;
pub use registry::{ActorId, StoreRegistry};
pub use resilient::{default_store_policy, ResilientStore};
pub use retry::{with_retry, RetryExecutor, RetryPolicy, RetrySettings};
