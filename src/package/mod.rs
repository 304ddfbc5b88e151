//! Packaging pipeline: walk once, digest and archive, name by digest
//!
//! [`package`] drives a single [`walker::TreeWalker`] pass and feeds every
//! entry to both the digest and the archive builder; file content is read
//! once and hashed as the archive consumes it. The archive is written to a
//! temporary file in the output directory and renamed to
//! `fast<digest>.tar.gz` only after everything succeeded.

pub mod archive;
pub mod digest;
pub mod walker;

use crate::config::options::PackageOptions;
use crate::core::error::{PackagingError, Result};
use crate::core::hash::{DigestComputer, HashingReader};
use crate::core::types::{EntryKind, TreeDigest};
use crate::ignore::IgnoreGroup;
use archive::{ArchiveBuilder, ArchiveSink};
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walker::{TreeWalker, WalkStats};

pub use digest::{compute_digest, compute_digest_for};

/// Prefix of every packaged archive's file name
pub const FAST_PREFIX: &str = "fast";

/// Suffix of every packaged archive's file name
pub const FAST_FILE_ENDING: &str = ".tar.gz";

/// Result of one packaging run
#[derive(Debug, Clone, Serialize)]
pub struct PackagedArchive {
    /// Final location of the archive
    pub archive_path: PathBuf,
    /// Digest of the filtered tree
    pub digest: TreeDigest,
    /// Walk counters
    pub stats: WalkStats,
}

/// File name for the archive of a tree with the given digest
pub fn archive_file_name(digest: &TreeDigest) -> String {
    format!("{}{}{}", FAST_PREFIX, digest, FAST_FILE_ENDING)
}

/// Join a remote base location with a digest for the upload collaborator
///
/// `remote_location("s3://my-s3-bucket/dir", "123abc")` yields
/// `s3://my-s3-bucket/dir/123abc.tar.gz`. No I/O is performed.
pub fn remote_location(base_uri: &str, digest: &str) -> String {
    format!(
        "{}/{}{}",
        base_uri.trim_end_matches('/'),
        digest,
        FAST_FILE_ENDING
    )
}

/// Package `source_dir` into `output_dir` and return the archive location
pub fn package(
    source_dir: &Path,
    output_dir: &Path,
    options: &PackageOptions,
) -> Result<PackagedArchive> {
    options.validate()?;
    let source = resolve_source(source_dir)?;
    let output = resolve_output(output_dir)?;

    let group = IgnoreGroup::from_options(&source, options);

    let temp = tempfile::Builder::new()
        .prefix(".fastpack-")
        .suffix(".tmp")
        .tempfile_in(&output)
        .map_err(|e| PackagingError::output_not_writable(output.clone(), e))?;
    let temp_path = temp.path().to_path_buf();
    let sink = ArchiveSink::open(
        options.compression,
        options.compression_level,
        temp.as_file().try_clone()?,
    )?;

    debug!(
        source = %source.display(),
        temp = %temp_path.display(),
        backend = ?sink.backend(),
        sources = group.sources().len(),
        "Packaging"
    );

    let mut walker = digest::configure_walker(TreeWalker::new(&source, &group), options)
        .exclude_path(&temp_path);
    let mut archive = ArchiveBuilder::new(sink);
    let mut hasher = DigestComputer::new();
    let mut unreadable = 0;

    for entry in walker.by_ref() {
        match &entry.kind {
            EntryKind::File => {
                let Some((file, len)) = digest::open_regular(&entry) else {
                    unreadable += 1;
                    continue;
                };
                hasher.begin_entry(&entry.rel_path, &entry.kind, len);
                let content = HashingReader::new(file.take(len), &mut hasher);
                archive.append_file(&entry.rel_path, len, content)?;
            },
            EntryKind::Directory => {
                hasher.begin_entry(&entry.rel_path, &entry.kind, 0);
                archive.append_directory(&entry.rel_path)?;
            },
            EntryKind::Symlink { target } => {
                hasher.begin_entry(&entry.rel_path, &entry.kind, 0);
                archive.append_symlink(&entry.rel_path, target)?;
            },
        }
    }

    let mut stats = walker.into_stats();
    stats.record_unreadable(unreadable);

    archive.into_inner()?.finish()?;
    let digest = hasher.finalize();

    let archive_path = output.join(archive_file_name(&digest));
    if archive_path.exists() {
        debug!(path = %archive_path.display(), "Replacing existing archive");
        fs::remove_file(&archive_path)?;
    }
    temp.persist(&archive_path).map_err(|e| e.error)?;

    info!(
        archive = %archive_path.display(),
        digest = %digest,
        files = stats.files,
        directories = stats.directories,
        symlinks = stats.symlinks,
        skipped = stats.skipped,
        "Packaged source tree"
    );

    Ok(PackagedArchive {
        archive_path,
        digest,
        stats,
    })
}

/// Validate and canonicalize a source directory
pub(crate) fn resolve_source(source_dir: &Path) -> Result<PathBuf> {
    if !source_dir.exists() {
        return Err(PackagingError::source_not_found(source_dir.to_path_buf()));
    }
    if !source_dir.is_dir() {
        return Err(PackagingError::SourceNotDirectory {
            path: source_dir.to_path_buf(),
        });
    }
    Ok(dunce::canonicalize(source_dir)?)
}

/// Validate and canonicalize an output directory
fn resolve_output(output_dir: &Path) -> Result<PathBuf> {
    if !output_dir.is_dir() {
        return Err(PackagingError::OutputNotDirectory {
            path: output_dir.to_path_buf(),
        });
    }
    Ok(dunce::canonicalize(output_dir)?)
}
