//! Record value encoding
//!
//! Full records live only in the primary partition, stored as MessagePack.
//! Values are never compared by the engine, so no ordering property is needed.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, CodecResult};

/// Serialize a record for the primary partition.
pub fn pack_value<V: Serialize + ?Sized>(value: &V) -> CodecResult<Vec<u8>> {
    rmp_serde::to_vec(value).map_err(|e| CodecError::Value(e.to_string()))
}

/// Deserialize a record read from the primary partition.
pub fn unpack_value<V: DeserializeOwned>(bytes: &[u8]) -> CodecResult<V> {
    rmp_serde::from_slice(bytes).map_err(|e| CodecError::Value(e.to_string()))
}
