//! Key and value codec
//!
//! - `key`: order-preserving, self-delimiting encoding for index keys and IDs
//! - `value`: MessagePack encoding for full records
//!
//! The engine orders entries by raw bytes. Key encodings are chosen so that
//! byte order equals `Ord` order of the decoded keys, and so that a packed key
//! followed by anything still sorts between its neighbours. The second property
//! lets non-unique secondary entries append the record ID to the key.

pub mod key;
pub mod value;

pub use key::{pack_key, unpack_key, unpack_key_prefix, KeyDecode, KeyEncode};
pub use value::{pack_value, unpack_value};
