use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::StoreError;

/// Encoding used for document payloads at rest.
///
/// `Json` is self-describing and works for any serde type, including
/// `serde_json::Value`. `Bitcode` is a compact binary format; it needs the
/// concrete type to decode and cannot round-trip `deserialize_any` types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Json,
    Bitcode,
}

impl Codec {
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        match self {
            Codec::Json => serde_json::to_vec(value).map_err(serde_error),
            Codec::Bitcode => bitcode::serialize(value).map_err(serde_error),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError> {
        match self {
            Codec::Json => serde_json::from_slice(bytes).map_err(serde_error),
            Codec::Bitcode => bitcode::deserialize(bytes).map_err(serde_error),
        }
    }
}

fn serde_error(err: impl fmt::Display) -> StoreError {
    StoreError::Serde(err.to_string())
}
