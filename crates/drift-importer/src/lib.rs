//! # drift-importer
//!
//! Imports source-control data into Drift by driving an external SCM
//! helper process over a framed binary protocol on its standard pipes.
//!
//! The [`FramedChannel`] moves length-prefixed chunks; the
//! [`ScmImporter`] issues manifest and file-content requests over it,
//! minting blob identities through the store layer and folding manifest
//! entries into a content-addressed tree with the
//! [`ManifestAssembler`].

mod assembler;
mod channel;
mod importer;

pub use assembler::ManifestAssembler;
pub use channel::{
    ChunkHeader, FramedChannel, CMD_CAT_FILE, CMD_MANIFEST, FLAG_ERROR, FLAG_MORE_CHUNKS,
    HEADER_SIZE,
};
pub use importer::{HelperImporter, ScmImporter};

use drift_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the importer and its channel.
#[derive(Error, Debug)]
pub enum ImportError {
    /// Malformed framing or manifest data. Fatal for the request; the
    /// channel may be unrecoverable.
    #[error("helper protocol violation: {0}")]
    Protocol(String),

    /// Failure reported by the helper itself. Fatal for the request;
    /// the channel remains usable.
    #[error("helper error: {0}")]
    Helper(String),

    /// The helper's pipe is gone; no further requests are possible.
    #[error("helper channel closed")]
    ChannelClosed(#[source] std::io::Error),

    /// A read ended mid-message.
    #[error("truncated helper message")]
    Truncated(#[source] std::io::Error),

    #[error("failed to spawn helper {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ImportError>;
