//! Core types for Strata multi-index collections
//!
//! This crate is the leaf of the workspace. It provides:
//! - `codec`: order-preserving key encoding and record value encoding
//! - `compare`: the per-index key-compare policy
//! - `error`: the error taxonomy shared by the storage and index layers
//! - `config`: options for opening indices and iterators
//!
//! Nothing here performs I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod compare;
pub mod config;
pub mod error;

pub use codec::{
    pack_key, pack_value, unpack_key, unpack_key_prefix, unpack_value, KeyDecode, KeyEncode,
};
pub use compare::{FirstField, KeyCompare, OrdLess};
pub use config::IndexConfig;
pub use error::{CodecError, CodecResult, IndexError, IndexResult, StorageError};
