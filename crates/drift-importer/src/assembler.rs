use std::collections::BTreeMap;

use drift_model::{FileType, Hash, RelativePath, RelativePathBuf, TreeEntry};
use tracing::trace;

/// Builds a content-addressed directory tree from a stream of manifest
/// entries arriving in arbitrary order.
///
/// Entries are grouped per directory; `finish` walks the directories
/// deepest-first, canonicalizes each one (children sorted by name,
/// bytewise), hashes a deterministic serialization, and threads the
/// resulting directory identities up to the root. The same entry set
/// always produces the same root hash, whatever the insertion order.
pub struct ManifestAssembler {
    dirs: BTreeMap<RelativePathBuf, Vec<TreeEntry>>,
}

impl ManifestAssembler {
    pub fn new() -> Self {
        let mut dirs = BTreeMap::new();
        dirs.insert(RelativePath::root().to_owned(), Vec::new());
        Self { dirs }
    }

    /// Register `entry` as a child of `dir`, creating `dir` and any
    /// missing ancestors.
    pub fn process_entry(&mut self, dir: &RelativePath, entry: TreeEntry) {
        let mut ancestor = dir;
        while !ancestor.is_empty() && !self.dirs.contains_key(ancestor) {
            self.dirs.insert(ancestor.to_owned(), Vec::new());
            ancestor = ancestor.dirname();
        }
        self.dirs
            .get_mut(dir)
            .expect("directory created above")
            .push(entry);
    }

    /// Hash every directory bottom-up and return the root identity.
    pub fn finish(mut self) -> Hash {
        // A parent is always a strict prefix of its children plus a
        // separator, so reverse lexicographic order visits children
        // before parents.
        let paths: Vec<RelativePathBuf> = self.dirs.keys().rev().cloned().collect();
        let mut root_hash = None;

        for path in paths {
            let mut entries = self.dirs.remove(&path).expect("path listed above");
            entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

            let hash = hash_directory(&entries);
            trace!(dir = %path, entries = entries.len(), hash = %hash, "hashed directory");

            if path.is_empty() {
                root_hash = Some(hash);
            } else {
                let dir_entry =
                    TreeEntry::new(hash, path.basename(), FileType::Directory, 0b111);
                self.dirs
                    .get_mut(path.dirname())
                    .expect("ancestors exist for every directory")
                    .push(dir_entry);
            }
        }

        root_hash.expect("root directory always present")
    }
}

impl Default for ManifestAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic, injective serialization of one directory's children.
/// Per entry: type tag, permission bits, identity, then the
/// length-prefixed name so names can never bleed into each other.
fn hash_directory(entries: &[TreeEntry]) -> Hash {
    let mut buf = Vec::new();
    for entry in entries {
        buf.push(entry.file_type.tag());
        buf.push(entry.owner_permissions);
        buf.extend_from_slice(entry.id.as_bytes());
        buf.extend_from_slice(&(entry.name.len() as u32).to_be_bytes());
        buf.extend_from_slice(entry.name.as_bytes());
    }
    Hash::sha1_of(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(s: &str) -> &RelativePath {
        RelativePath::new(s).unwrap()
    }

    fn file_entry(name: &str, seed: &str) -> TreeEntry {
        TreeEntry::new(Hash::sha1_of(seed.as_bytes()), name, FileType::Regular, 0b110)
    }

    #[test]
    fn test_empty_manifest_has_a_root() {
        let root = ManifestAssembler::new().finish();
        assert_eq!(root, hash_directory(&[]));
    }

    #[test]
    fn test_ancestors_are_created() {
        let mut assembler = ManifestAssembler::new();
        assembler.process_entry(rel("a/b/c"), file_entry("deep.txt", "1"));
        assert!(assembler.dirs.contains_key(rel("a")));
        assert!(assembler.dirs.contains_key(rel("a/b")));

        let root = assembler.finish();
        assert_ne!(root, ManifestAssembler::new().finish());
    }

    #[test]
    fn test_root_hash_is_insertion_order_independent() {
        let entries = [
            ("", file_entry("top.txt", "t")),
            ("dir", file_entry("a.txt", "a")),
            ("dir", file_entry("b.txt", "b")),
            ("dir/sub", file_entry("c.txt", "c")),
            ("other", file_entry("d.txt", "d")),
        ];

        let forward = {
            let mut assembler = ManifestAssembler::new();
            for (dir, entry) in entries.iter() {
                assembler.process_entry(rel(dir), entry.clone());
            }
            assembler.finish()
        };

        let reversed = {
            let mut assembler = ManifestAssembler::new();
            for (dir, entry) in entries.iter().rev() {
                assembler.process_entry(rel(dir), entry.clone());
            }
            assembler.finish()
        };

        let interleaved = {
            let mut assembler = ManifestAssembler::new();
            for index in [2usize, 0, 4, 1, 3] {
                let (dir, entry) = &entries[index];
                assembler.process_entry(rel(dir), entry.clone());
            }
            assembler.finish()
        };

        assert_eq!(forward, reversed);
        assert_eq!(forward, interleaved);
    }

    #[test]
    fn test_content_changes_root_hash() {
        let build = |seed: &str| {
            let mut assembler = ManifestAssembler::new();
            assembler.process_entry(rel("dir"), file_entry("f.txt", seed));
            assembler.finish()
        };
        assert_ne!(build("one"), build("two"));
    }

    #[test]
    fn test_name_boundaries_are_unambiguous() {
        // ("ab", "c") and ("a", "bc") must not collide thanks to the
        // length-prefixed names.
        let one = {
            let mut assembler = ManifestAssembler::new();
            assembler.process_entry(rel(""), file_entry("ab", "x"));
            assembler.process_entry(rel(""), file_entry("c", "x"));
            assembler.finish()
        };
        let other = {
            let mut assembler = ManifestAssembler::new();
            assembler.process_entry(rel(""), file_entry("a", "x"));
            assembler.process_entry(rel(""), file_entry("bc", "x"));
            assembler.finish()
        };
        assert_ne!(one, other);
    }
}
