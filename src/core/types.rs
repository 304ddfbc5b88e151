//! Core data types for fastpack

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// 32-byte SHA-256 digest of a filtered source tree
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeDigest([u8; 32]);

impl TreeDigest {
    /// Create a digest from a 32-byte array
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        TreeDigest(bytes)
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create a digest from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut array = [0u8; 32];
        array.copy_from_slice(&bytes);
        Ok(TreeDigest(array))
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TreeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TreeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeDigest({})", &hex::encode(self.0)[..8])
    }
}

impl From<[u8; 32]> for TreeDigest {
    fn from(bytes: [u8; 32]) -> Self {
        TreeDigest(bytes)
    }
}

// Serialized as hex so reports and CLI output stay readable
impl Serialize for TreeDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TreeDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        TreeDigest::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}

/// Classification of a surviving tree entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file (or a dereferenced link to one)
    File,
    /// Directory
    Directory,
    /// Symbolic link kept as a link, with its raw target text
    Symlink { target: String },
}

impl EntryKind {
    /// Single-byte tag folded into the digest
    pub fn tag(&self) -> u8 {
        match self {
            EntryKind::File => b'F',
            EntryKind::Directory => b'D',
            EntryKind::Symlink { .. } => b'L',
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// One filesystem object that survived ignore filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path relative to the source root, `/`-separated on every host
    pub rel_path: String,
    /// Absolute path on disk (reads through links when dereferencing)
    pub abs_path: PathBuf,
    /// Entry classification
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn new(rel_path: impl Into<String>, abs_path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        Self {
            rel_path: rel_path.into(),
            abs_path: abs_path.into(),
            kind,
        }
    }
}

/// Render a relative path with `/` separators regardless of host conventions
///
/// `.` components are dropped. Returns `None` when a component is not valid
/// UTF-8: such a name has no canonical form, and a lossy rendering would let
/// two distinct names collide.
pub fn canonical_rel_path(rel: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in rel.components() {
        if component == Component::CurDir {
            continue;
        }
        parts.push(component.as_os_str().to_str()?);
    }
    Some(parts.join("/"))
}
