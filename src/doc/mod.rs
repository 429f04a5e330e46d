//! Documents - versioned values and compare-and-swap outcomes.
//!
//! Every key in a store holds a [`VersionedDoc`]. The version starts at 1 on
//! the first write, advances by exactly one on every successful write, and is
//! the only witness used for optimistic concurrency control.
//!
//! ## Example
//!
//! ```ignore
//! use versioned_store::{CasResult, NO_DOCUMENT};
//!
//! let first = handle.cas_put("grades:alice", NO_DOCUMENT, &grade).await?;
//! assert_eq!(first, CasResult::applied(1));
//!
//! // A second writer still holding NO_DOCUMENT loses the race.
//! let stale = handle.cas_put("grades:alice", NO_DOCUMENT, &other).await?;
//! assert_eq!(stale, CasResult::stale(1));
//! ```

mod codec;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub use codec::Codec;

/// Version reported for a key that holds no document.
///
/// `cas_put` against an absent key succeeds only with this expected version.
pub const NO_DOCUMENT: u64 = 0;

/// A document together with the version it was read or written at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedDoc<T> {
    pub version: u64,
    pub data: T,
}

impl<T> VersionedDoc<T> {
    pub fn new(version: u64, data: T) -> Self {
        Self { version, data }
    }

    /// Transform the payload, keeping the version.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> VersionedDoc<U> {
        VersionedDoc {
            version: self.version,
            data: f(self.data),
        }
    }
}

/// Outcome of a compare-and-swap write.
///
/// `ok == true`: the write was applied and `version` is the new version.
/// `ok == false`: the expected version was stale and `version` is the
/// current one, so the caller can re-read and merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasResult {
    pub ok: bool,
    pub version: u64,
}

impl CasResult {
    pub fn applied(version: u64) -> Self {
        Self { ok: true, version }
    }

    pub fn stale(current: u64) -> Self {
        Self {
            ok: false,
            version: current,
        }
    }
}

/// Trait for types stored in a typed [`Collection`](crate::Collection).
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// The collection name for this document type (e.g. "grades", "announcements").
    /// Used as the key prefix: documents live under `"COLLECTION:id"`.
    const COLLECTION: &'static str;

    /// Returns the unique identifier for this document within its collection.
    fn id(&self) -> &str;
}
