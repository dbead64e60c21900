//! Error taxonomy
//!
//! Three layers of errors, each a `thiserror` enum:
//!
//! - [`CodecError`]: malformed bytes. Always classified as data corruption.
//! - [`StorageError`]: faults reported by the key-value engine.
//! - [`IndexError`]: everything an index operation can return. Wraps the
//!   other two with `#[from]` so `?` works across layers.
//!
//! "Not found" is never an error for searches: a missing key yields the
//! end sentinel iterator. Every variant of [`IndexError`] that does reach
//! a caller terminates the operation that produced it.

use thiserror::Error;

/// Errors raised while encoding or decoding keys and values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a complete key component was read
    #[error("unexpected end of input: needed {needed} more bytes")]
    UnexpectedEof {
        /// Bytes still required
        needed: usize,
    },

    /// A tag or escape byte had an unknown value
    #[error("invalid tag byte 0x{0:02x}")]
    InvalidTag(u8),

    /// A string key did not hold valid UTF-8
    #[error("string key is not valid UTF-8")]
    InvalidUtf8,

    /// A complete key was decoded but bytes remained
    #[error("{0} trailing bytes after key")]
    TrailingBytes(usize),

    /// The record value serializer rejected the payload
    #[error("value codec: {0}")]
    Value(String),
}

/// Result type for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Errors reported by a key-value engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The requested partition was never created
    #[error("unknown partition {0}")]
    UnknownPartition(String),

    /// A partition with this name already exists
    #[error("partition '{0}' already exists")]
    PartitionExists(String),

    /// The engine failed to serve a read or write
    #[error("engine I/O failure: {0}")]
    Io(String),
}

/// Errors returned by index, iterator and collection operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Stored bytes could not be decoded
    #[error("codec fault (data corruption): {0}")]
    Codec(#[from] CodecError),

    /// The engine reported a failure
    #[error("storage engine fault: {0}")]
    Storage(#[from] StorageError),

    /// A secondary entry resolves to an ID with no primary record
    #[error("partition divergence: index '{index}' references id {id} with no primary entry")]
    PartitionDivergence {
        /// Name of the secondary index holding the dangling entry
        index: String,
        /// Debug rendering of the dangling ID
        id: String,
    },

    /// A live (unsnapshotted) iterator stood on a record that a concurrent
    /// write removed before the dereference
    #[error("record {id} behind index '{index}' was removed after the cursor opened")]
    RecordRemoved {
        /// Name of the index the iterator walks
        index: String,
        /// Debug rendering of the removed ID
        id: String,
    },

    /// Dereference of an iterator that is not on an entry
    #[error("iterator is not positioned on an entry")]
    InvalidPosition,

    /// Insert of a record whose ID is already present
    #[error("record with id {0} already exists")]
    DuplicateId(String),

    /// Insert or modify would put two records under one unique key
    #[error("unique index '{index}' already contains key {key}")]
    UniqueViolation {
        /// Name of the unique index
        index: String,
        /// Debug rendering of the colliding key
        key: String,
    },

    /// A modification changed the record's identity
    #[error("modification changed the record id from {from} to {to}")]
    IdChanged {
        /// ID before the modification
        from: String,
        /// ID after the modification
        to: String,
    },

    /// Remove or modify of an ID that is not stored
    #[error("no record with id {0}")]
    NotFound(String),

    /// Configuration could not be parsed or is inconsistent
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IndexError {
    /// Build a divergence error for a dangling secondary entry.
    pub fn divergence(index: impl Into<String>, id: &impl std::fmt::Debug) -> Self {
        IndexError::PartitionDivergence {
            index: index.into(),
            id: format!("{:?}", id),
        }
    }

    /// Build the error for a record removed behind a live cursor.
    pub fn removed(index: impl Into<String>, id: &impl std::fmt::Debug) -> Self {
        IndexError::RecordRemoved {
            index: index.into(),
            id: format!("{:?}", id),
        }
    }

    /// Whether this error signals corrupted or inconsistent storage.
    ///
    /// Fatal errors mean the engine contents can no longer be trusted;
    /// the remaining variants are caller errors or lost races with a writer.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IndexError::Codec(_) | IndexError::Storage(_) | IndexError::PartitionDivergence { .. }
        )
    }
}

/// Result type for index operations
pub type IndexResult<T> = std::result::Result<T, IndexError>;
