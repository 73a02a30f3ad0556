use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{RelativePath, RelativePathBuf};

/// Change-kind of a single path relative to a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FileStatus {
    Added = 0,
    Modified = 1,
    Removed = 2,
    Ignored = 3,
    Clean = 4,
    NotTracked = 5,
}

/// The diff between the working copy and a commit: a mapping from path
/// to change-kind. Iteration order is deterministic (path order).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmStatus {
    entries: BTreeMap<RelativePathBuf, FileStatus>,
}

impl ScmStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: RelativePathBuf, status: FileStatus) {
        self.entries.insert(path, status);
    }

    pub fn get(&self, path: &RelativePath) -> Option<FileStatus> {
        self.entries.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelativePath, FileStatus)> {
        self.entries.iter().map(|(path, status)| (path.as_path(), *status))
    }
}

impl FromIterator<(RelativePathBuf, FileStatus)> for ScmStatus {
    fn from_iter<I: IntoIterator<Item = (RelativePathBuf, FileStatus)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
