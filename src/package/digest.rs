//! Digest computation over a filtered walk

use crate::config::options::{CopyStyle, PackageOptions};
use crate::core::error::Result;
use crate::core::hash::{DigestComputer, HashingReader};
use crate::core::types::{EntryKind, TreeDigest, TreeEntry};
use crate::ignore::IgnoreGroup;
use crate::package::walker::{TreeWalker, WalkStats};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::warn;

/// Compute the digest of `source` filtered by `group`, links kept as links
pub fn compute_digest(source: &Path, group: &IgnoreGroup) -> Result<TreeDigest> {
    let walker = TreeWalker::new(source, group);
    Ok(fold_walk(walker)?.0)
}

/// Compute the digest `package` would produce for the same tree and options
pub fn compute_digest_for(source: &Path, options: &PackageOptions) -> Result<TreeDigest> {
    options.validate()?;
    let source = super::resolve_source(source)?;
    let group = IgnoreGroup::from_options(&source, options);
    let walker = configure_walker(TreeWalker::new(&source, &group), options);
    Ok(fold_walk(walker)?.0)
}

/// Apply the walk-shaping options shared by digesting and packaging
pub(crate) fn configure_walker<'g>(
    walker: TreeWalker<'g>,
    options: &PackageOptions,
) -> TreeWalker<'g> {
    let walker = walker.deref_symlinks(options.deref_symlinks);
    match options.copy_style {
        CopyStyle::LoadedModules => walker.with_module_files(&options.module_files),
        CopyStyle::All => walker,
    }
}

/// Drive a walk to completion, folding every entry into one digest
pub fn fold_walk(mut walker: TreeWalker<'_>) -> Result<(TreeDigest, WalkStats)> {
    let mut digest = DigestComputer::new();
    let mut unreadable = 0;

    for entry in walker.by_ref() {
        if !fold_entry(&mut digest, &entry)? {
            unreadable += 1;
        }
    }

    let mut stats = walker.into_stats();
    stats.record_unreadable(unreadable);
    Ok((digest.finalize(), stats))
}

/// Fold one entry, reading file content from disk
///
/// Returns `false` when the file could not be opened; such an entry
/// contributes nothing.
pub fn fold_entry(digest: &mut DigestComputer, entry: &TreeEntry) -> io::Result<bool> {
    match &entry.kind {
        EntryKind::File => {
            let Some((file, len)) = open_regular(entry) else {
                return Ok(false);
            };
            digest.begin_entry(&entry.rel_path, &entry.kind, len);
            io::copy(&mut HashingReader::new(file.take(len), digest), &mut io::sink())?;
        },
        kind => digest.begin_entry(&entry.rel_path, kind, 0),
    }
    Ok(true)
}

/// Open a file entry and read its current length
///
/// Failures are logged and reported as `None` so one unreadable file never
/// aborts a walk.
pub(crate) fn open_regular(entry: &TreeEntry) -> Option<(File, u64)> {
    let opened = File::open(&entry.abs_path).and_then(|file| {
        let len = file.metadata()?.len();
        Ok((file, len))
    });

    match opened {
        Ok(opened) => Some(opened),
        Err(e) => {
            warn!(path = %entry.abs_path.display(), error = %e, "Skipping unreadable file");
            None
        },
    }
}
