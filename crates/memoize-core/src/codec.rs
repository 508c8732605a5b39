//! Serialization collaborator for cache entries.
//!
//! The same codec produces the in-memory blobs and the on-disk files, so an
//! entry read back from either tier decodes identically.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::MemoizeResult;

/// Encodes return values to bytes and back.
pub trait Codec {
    fn encode<T: Serialize>(&self, value: &T) -> MemoizeResult<Vec<u8>>;
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> MemoizeResult<T>;
}

/// Compact JSON via `serde_json`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> MemoizeResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> MemoizeResult<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
