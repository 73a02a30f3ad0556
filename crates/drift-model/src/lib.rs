//! # drift-model
//!
//! Core data model shared by the Drift subsystems: 20-byte content
//! hashes, normalized relative paths, tree entries emitted by the
//! manifest assembler, and the working-copy status types consumed by
//! the status cache.

mod hash;
mod path;
mod status;
mod tree;

pub use hash::Hash;
pub use path::{RelativePath, RelativePathBuf};
pub use status::{FileStatus, ScmStatus};
pub use tree::{FileType, TreeEntry};

use thiserror::Error;

/// Errors produced while constructing model values from untrusted input.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid hash length: expected {expected} bytes, got {actual}")]
    InvalidHashLength { expected: usize, actual: usize },

    #[error("invalid hex hash {0:?}")]
    InvalidHex(String),

    #[error("invalid relative path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, ModelError>;
