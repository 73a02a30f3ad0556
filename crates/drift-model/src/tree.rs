use serde::{Deserialize, Serialize};

use crate::Hash;

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum FileType {
    Regular = 0,
    Executable = 1,
    Symlink = 2,
    Directory = 3,
}

impl FileType {
    /// Single-byte tag used in the serialized tree format.
    pub fn tag(self) -> u8 {
        match self {
            FileType::Regular => b'f',
            FileType::Executable => b'x',
            FileType::Symlink => b'l',
            FileType::Directory => b'd',
        }
    }
}

/// A named child of a directory: a blob or tree identity plus metadata.
///
/// `owner_permissions` holds the owner rwx bits only; group/other bits
/// are derived elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub id: Hash,
    pub name: String,
    pub file_type: FileType,
    pub owner_permissions: u8,
}

impl TreeEntry {
    pub fn new(id: Hash, name: impl Into<String>, file_type: FileType, owner_permissions: u8) -> Self {
        Self {
            id,
            name: name.into(),
            file_type,
            owner_permissions: owner_permissions & 0b111,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_masked_to_three_bits() {
        let entry = TreeEntry::new(Hash::sha1_of(b"x"), "a", FileType::Regular, 0xff);
        assert_eq!(entry.owner_permissions, 0b111);
    }

    #[test]
    fn test_type_tags_are_distinct() {
        let tags = [
            FileType::Regular.tag(),
            FileType::Executable.tag(),
            FileType::Symlink.tag(),
            FileType::Directory.tag(),
        ];
        let mut dedup = tags.to_vec();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), tags.len());
    }
}
