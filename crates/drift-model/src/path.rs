use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{ModelError, Result};

/// A borrowed, normalized relative path.
///
/// Canonical form: forward-slash separated, no leading separator, no
/// empty components, no `.` or `..` segments. The empty path names the
/// repository root directory.
///
/// This is a thin validated view over `str`, shaped like the
/// `std::path::Path` / `PathBuf` pair.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RelativePath(str);

impl RelativePath {
    /// Validate and borrow a string as a relative path.
    pub fn new(s: &str) -> Result<&Self> {
        validate(s)?;
        Ok(Self::from_str_unchecked(s))
    }

    /// The empty path, naming the root directory.
    pub fn root() -> &'static Self {
        Self::from_str_unchecked("")
    }

    fn from_str_unchecked(s: &str) -> &Self {
        // Safety: RelativePath is repr(transparent) over str.
        unsafe { &*(s as *const str as *const RelativePath) }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parent directory of this path; the root path for a top-level name.
    pub fn dirname(&self) -> &RelativePath {
        match self.0.rfind('/') {
            Some(idx) => Self::from_str_unchecked(&self.0[..idx]),
            None => Self::root(),
        }
    }

    /// Final component of this path; empty only for the root path.
    pub fn basename(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Append a single component.
    pub fn join(&self, name: &str) -> RelativePathBuf {
        if self.is_empty() {
            RelativePathBuf(name.to_string())
        } else {
            RelativePathBuf(format!("{}/{}", &self.0, name))
        }
    }
}

fn validate(s: &str) -> Result<()> {
    let invalid = |reason| ModelError::InvalidPath {
        path: s.to_string(),
        reason,
    };
    if s.is_empty() {
        return Ok(());
    }
    if s.starts_with('/') {
        return Err(invalid("leading separator"));
    }
    for component in s.split('/') {
        match component {
            "" => return Err(invalid("empty component")),
            "." | ".." => return Err(invalid("dot component")),
            _ => {}
        }
    }
    Ok(())
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelativePath({:?})", &self.0)
    }
}

impl ToOwned for RelativePath {
    type Owned = RelativePathBuf;

    fn to_owned(&self) -> RelativePathBuf {
        RelativePathBuf(self.0.to_string())
    }
}

/// An owned, normalized relative path.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativePathBuf(String);

impl RelativePathBuf {
    /// Validate and take ownership of a path string.
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        validate(&s)?;
        Ok(Self(s))
    }

    pub fn as_path(&self) -> &RelativePath {
        RelativePath::from_str_unchecked(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for RelativePathBuf {
    type Target = RelativePath;

    fn deref(&self) -> &RelativePath {
        self.as_path()
    }
}

impl Borrow<RelativePath> for RelativePathBuf {
    fn borrow(&self) -> &RelativePath {
        self.as_path()
    }
}

impl From<&RelativePath> for RelativePathBuf {
    fn from(path: &RelativePath) -> Self {
        path.to_owned()
    }
}

impl fmt::Display for RelativePathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RelativePathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelativePathBuf({:?})", &self.0)
    }
}

impl Serialize for RelativePathBuf {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RelativePathBuf {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        RelativePathBuf::parse(s).map_err(serde::de::Error::custom)
    }
}
