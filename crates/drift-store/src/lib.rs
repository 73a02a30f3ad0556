//! # drift-store
//!
//! Storage layer for Drift.
//!
//! Three pieces live here:
//!
//! - [`ByteStore`] and its backends — the flat get/put key-value seam
//!   the rest of the system treats as external storage.
//! - [`BlobInfoStore`] — translation between `(path, SCM revision hash)`
//!   pairs and the opaque blob identities used internally.
//! - [`StatusCache`] — commit-keyed memoization of working-copy status
//!   computations with sequence-number freshness, LRU eviction, and
//!   in-flight request coalescing.

mod blobinfo;
mod bytestore;
mod status_cache;

pub use blobinfo::{BlobInfo, BlobInfoStore};
pub use bytestore::{ByteStore, FsByteStore, MemoryStore, StoreStats};
pub use status_cache::{
    SeqStatusPair, SequenceNumber, StatusCache, StatusFuture, StatusLookup, StatusPromise,
};

use drift_model::{Hash, ModelError};
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown blob identity {0}")]
    UnknownBlob(Hash),

    #[error("corrupt blob info record for {id}: {details}")]
    CorruptRecord { id: Hash, details: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
