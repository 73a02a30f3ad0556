use std::fmt;

use sha1::{Digest, Sha1};

use crate::{ModelError, Result};

/// A 20-byte content identifier.
///
/// Used both for SCM revision hashes received on the wire and for the
/// internal blob and tree identities Drift mints itself. Ordering and
/// equality are bytewise.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; 20]);

impl Hash {
    pub const RAW_SIZE: usize = 20;
    pub const HEX_SIZE: usize = Self::RAW_SIZE * 2;

    /// Wrap an existing 20-byte array.
    pub const fn from_raw(bytes: [u8; Self::RAW_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy a hash out of a byte slice. The slice must be exactly 20 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; Self::RAW_SIZE] =
            bytes
                .try_into()
                .map_err(|_| ModelError::InvalidHashLength {
                    expected: Self::RAW_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(raw))
    }

    /// Parse a 40-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != Self::HEX_SIZE {
            return Err(ModelError::InvalidHex(hex.to_string()));
        }
        let mut raw = [0u8; Self::RAW_SIZE];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk)
                .map_err(|_| ModelError::InvalidHex(hex.to_string()))?;
            raw[i] = u8::from_str_radix(s, 16)
                .map_err(|_| ModelError::InvalidHex(hex.to_string()))?;
        }
        Ok(Self(raw))
    }

    /// Compute the SHA-1 digest of a byte range.
    pub fn sha1_of(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; Self::RAW_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
