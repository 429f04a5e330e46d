//! StorageEngine - the key-value substrate underneath a store actor.
//!
//! The actor layers compare-and-swap semantics on top of the plain
//! get/put/delete/list primitives defined here. Engines never see concurrent
//! calls: each one is owned by exactly one actor.

mod in_memory;

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

pub use in_memory::{InMemoryCheckpoint, InMemoryEngine};

/// A document as the engine stores it: encoded payload plus version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDoc {
    pub version: u64,
    pub bytes: Vec<u8>,
}

/// Options for listing keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only keys starting with this prefix.
    pub prefix: Option<String>,
    /// Maximum number of keys in the page.
    pub limit: Option<usize>,
    /// Resume after the page that returned this cursor.
    pub cursor: Option<String>,
}

impl ListOptions {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

/// One page of a key listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// `true` when no keys remain after this page.
    pub is_complete: bool,
    /// Opaque cursor for the next page; present iff `is_complete` is false.
    pub cursor: Option<String>,
}

/// Error type for storage engine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The underlying lock primitive was poisoned.
    Poisoned(String),
    /// The substrate failed to read or write.
    Io(String),
    /// A list cursor could not be decoded.
    InvalidCursor(String),
    /// Any other engine error.
    Other(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Poisoned(msg) => write!(f, "engine lock poisoned: {}", msg),
            EngineError::Io(msg) => write!(f, "engine io error: {}", msg),
            EngineError::InvalidCursor(msg) => write!(f, "invalid list cursor: {}", msg),
            EngineError::Other(msg) => write!(f, "engine error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Key-value primitives a store actor needs from its substrate.
///
/// Implementations talk to memory, disk, a replicated log, etc. The actor
/// guarantees single-threaded access, so `&mut self` writes need no extra
/// synchronization inside the engine.
pub trait StorageEngine: Send + 'static {
    /// State captured by [`checkpoint`](Self::checkpoint) for rollback.
    type Checkpoint: Send;

    fn get(&self, key: &str) -> Result<Option<StoredDoc>, EngineError>;

    /// Fetch several keys; absent keys are skipped.
    fn get_many(&self, keys: &[String]) -> Result<Vec<(String, StoredDoc)>, EngineError> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(doc) = self.get(key)? {
                found.push((key.clone(), doc));
            }
        }
        Ok(found)
    }

    fn put(&mut self, key: &str, doc: StoredDoc) -> Result<(), EngineError>;

    fn put_many(&mut self, entries: Vec<(String, StoredDoc)>) -> Result<(), EngineError> {
        for (key, doc) in entries {
            self.put(&key, doc)?;
        }
        Ok(())
    }

    /// Remove a key. Returns true if it existed.
    fn delete(&mut self, key: &str) -> Result<bool, EngineError>;

    /// Remove several keys. Returns how many existed.
    fn delete_many(&mut self, keys: &[String]) -> Result<usize, EngineError> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn contains(&self, key: &str) -> Result<bool, EngineError> {
        Ok(self.get(key)?.is_some())
    }

    fn list(&self, options: &ListOptions) -> Result<ListPage, EngineError>;

    fn checkpoint(&self) -> Result<Self::Checkpoint, EngineError>;

    /// Keep everything written since `checkpoint`. Wrapping engines must
    /// forward this to the engine they wrap.
    fn commit(&mut self, _checkpoint: Self::Checkpoint) -> Result<(), EngineError> {
        Ok(())
    }

    fn rollback(&mut self, checkpoint: Self::Checkpoint) -> Result<(), EngineError>;

    /// Run `f` against the engine, restoring the prior state if it fails.
    fn transaction<R, F>(&mut self, f: F) -> Result<R, EngineError>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<R, EngineError>,
    {
        let checkpoint = self.checkpoint()?;
        match f(self) {
            Ok(value) => {
                self.commit(checkpoint)?;
                Ok(value)
            }
            Err(err) => {
                self.rollback(checkpoint)?;
                Err(err)
            }
        }
    }
}

/// Encode an insertion sequence number as an opaque cursor.
pub(crate) fn encode_cursor(seq: u64) -> String {
    URL_SAFE_NO_PAD.encode(seq.to_be_bytes())
}

pub(crate) fn decode_cursor(cursor: &str) -> Result<u64, EngineError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|e| EngineError::InvalidCursor(e.to_string()))?;
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| EngineError::InvalidCursor(format!("cursor {:?} has wrong length", cursor)))?;
    Ok(u64::from_be_bytes(bytes))
}
