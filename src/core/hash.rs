//! Digest folding over tree entries

use crate::core::types::{EntryKind, TreeDigest};
use sha2::{Digest, Sha256};
use std::io::{self, Read};

/// Running SHA-256 over a sequence of tree entries
///
/// Each entry contributes its canonical path, a NUL separator, its kind tag
/// and then a length-prefixed payload (file content or link target).
/// Timestamps, permission bits, ownership and inode numbers never enter the
/// hash.
pub struct DigestComputer {
    hasher: Sha256,
    entries: usize,
}

impl DigestComputer {
    /// Create a new digest computer
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            entries: 0,
        }
    }

    /// Fold an entry header; regular files must follow with `content_len`
    /// bytes through [`DigestComputer::update`] or a [`HashingReader`]
    pub fn begin_entry(&mut self, rel_path: &str, kind: &EntryKind, content_len: u64) {
        self.entries += 1;
        self.hasher.update(rel_path.as_bytes());
        self.hasher.update([0u8]);
        self.hasher.update([kind.tag()]);

        match kind {
            EntryKind::File => self.hasher.update(content_len.to_le_bytes()),
            EntryKind::Symlink { target } => {
                self.hasher.update((target.len() as u64).to_le_bytes());
                self.hasher.update(target.as_bytes());
            },
            EntryKind::Directory => {},
        }
    }

    /// Update the hash with file content bytes
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Number of entries folded so far
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Finalize the hash and return the digest
    pub fn finalize(self) -> TreeDigest {
        TreeDigest::from_bytes(self.hasher.finalize().into())
    }
}

impl Default for DigestComputer {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader adapter that folds every byte it yields into a [`DigestComputer`]
///
/// Lets the archive builder and the digest consume one read of each file.
pub struct HashingReader<'a, R> {
    inner: R,
    digest: &'a mut DigestComputer,
}

impl<'a, R: Read> HashingReader<'a, R> {
    pub fn new(inner: R, digest: &'a mut DigestComputer) -> Self {
        Self { inner, digest }
    }
}

impl<R: Read> Read for HashingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }
}
