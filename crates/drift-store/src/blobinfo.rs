use std::sync::Arc;

use drift_model::{Hash, RelativePath, RelativePathBuf};
use tracing::warn;

use crate::{ByteStore, Result, StoreError};

/// Key namespace suffix for blob info records inside the shared
/// byte-store. A dedicated column family would make this unnecessary.
const BLOB_KEY_SUFFIX: &[u8] = b"hgx";

/// Minimum size of a serialized record: revision hash plus path length.
const MIN_RECORD_SIZE: usize = Hash::RAW_SIZE + 4;

/// The `(path, revision hash)` pair a blob identity resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub path: RelativePathBuf,
    pub rev: Hash,
}

/// Translates between `(path, SCM revision hash)` pairs and the opaque
/// blob identities Drift uses internally.
///
/// The SCM assigns file revision hashes that are only meaningful
/// relative to a path, so a path-independent identity has to be minted:
/// the SHA-1 of the serialized pair. The mapping back is persisted in
/// the byte-store so blob reads can recover the pair later.
///
/// Record layout: `rev[20] || path_len[u32 BE] || path_bytes`, stored
/// under the key `blob_identity[20] || "hgx"`.
pub struct BlobInfoStore {
    store: Arc<dyn ByteStore>,
}

impl BlobInfoStore {
    pub fn new(store: Arc<dyn ByteStore>) -> Self {
        Self { store }
    }

    /// Mint the blob identity for `(path, rev)` and persist the reverse
    /// mapping. Deterministic; re-writing an existing record is a no-op.
    pub fn put(&self, path: &RelativePath, rev: Hash) -> Result<Hash> {
        let record = serialize_record(path, rev);
        let blob_id = Hash::sha1_of(&record);
        self.store.put(&blob_key(blob_id), &record)?;
        Ok(blob_id)
    }

    /// Resolve a blob identity back to its `(path, rev)` pair.
    pub fn get(&self, blob_id: Hash) -> Result<BlobInfo> {
        let record = self
            .store
            .get(&blob_key(blob_id))?
            .ok_or(StoreError::UnknownBlob(blob_id))?;
        parse_record(blob_id, &record)
    }
}

fn blob_key(blob_id: Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(Hash::RAW_SIZE + BLOB_KEY_SUFFIX.len());
    key.extend_from_slice(blob_id.as_bytes());
    key.extend_from_slice(BLOB_KEY_SUFFIX);
    key
}

fn serialize_record(path: &RelativePath, rev: Hash) -> Vec<u8> {
    let path_bytes = path.as_bytes();
    let mut record = Vec::with_capacity(MIN_RECORD_SIZE + path_bytes.len());
    record.extend_from_slice(rev.as_bytes());
    record.extend_from_slice(&(path_bytes.len() as u32).to_be_bytes());
    record.extend_from_slice(path_bytes);
    record
}

fn parse_record(blob_id: Hash, record: &[u8]) -> Result<BlobInfo> {
    let corrupt = |details: String| {
        warn!(blob_id = %blob_id, %details, "corrupt blob info record");
        StoreError::CorruptRecord {
            id: blob_id,
            details,
        }
    };

    if record.len() < MIN_RECORD_SIZE {
        return Err(corrupt(format!("record too short ({} bytes)", record.len())));
    }

    // Checked length above; from_bytes cannot fail here.
    let rev = Hash::from_bytes(&record[..Hash::RAW_SIZE])?;

    let len_bytes: [u8; 4] = record[Hash::RAW_SIZE..MIN_RECORD_SIZE]
        .try_into()
        .expect("slice is four bytes");
    let declared_len = u32::from_be_bytes(len_bytes) as usize;
    let path_bytes = &record[MIN_RECORD_SIZE..];
    if path_bytes.len() != declared_len {
        return Err(corrupt(format!(
            "inconsistent path length: declared {}, got {}",
            declared_len,
            path_bytes.len()
        )));
    }

    let path_str = std::str::from_utf8(path_bytes)
        .map_err(|e| corrupt(format!("path is not valid UTF-8: {e}")))?;
    let path = RelativePathBuf::parse(path_str)
        .map_err(|e| corrupt(format!("path is not a valid relative path: {e}")))?;

    Ok(BlobInfo { path, rev })
}
