//! Registry - stable addressing from namespace names to store actors.
//!
//! Callers never hold a pointer to an actor; they hold an [`ActorId`] derived
//! from the namespace name and resolve it through a [`StoreRegistry`].

mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

pub use registry::StoreRegistry;

/// Stable identity of a store actor.
///
/// Derived from the namespace name with xxh3, so the same name maps to the
/// same id in every process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(u64);

impl ActorId {
    pub fn from_name(name: &str) -> Self {
        ActorId(xxh3_64(name.as_bytes()))
    }

    pub fn from_raw(raw: u64) -> Self {
        ActorId(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
