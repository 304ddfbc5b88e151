//! fastpack - reproducible, ignore-aware source packaging
//!
//! fastpack turns a source directory into a compressed tar archive whose
//! name is derived from the content it holds. Two runs over identical trees,
//! on different machines and at different times, produce the same digest and
//! byte-identical archives.
//!
//! # Pipeline
//!
//! - **Ignore rules**: `.gitignore` and `.dockerignore` files at any depth, a
//!   standard table of noise entries, and caller predicates, ORed together
//! - **Tree walk**: sorted, depth-first, pruning ignored directories and
//!   skipping broken links and special files
//! - **Digest**: SHA-256 over paths, entry kinds and content, never over
//!   timestamps, ownership or permissions
//! - **Archive**: tar with normalized headers, gzip-compressed, written
//!   atomically as `fast<digest>.tar.gz`
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use fastpack::{package, remote_location, PackageOptions};
//! use std::path::Path;
//!
//! let options = PackageOptions::default();
//! let packaged = package(Path::new("./my-project"), Path::new("/tmp"), &options)?;
//!
//! println!("archive: {}", packaged.archive_path.display());
//! println!("upload to: {}", remote_location("s3://bucket/fast", &packaged.digest.to_hex()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod core;
pub mod ignore;
pub mod package;

// Re-export commonly used types
pub use core::{
    error::{PackagingError, Result},
    types::{EntryKind, TreeDigest, TreeEntry},
};

pub use config::{CompressionBackend, CopyStyle, CustomIgnore, IgnoreKind, PackageOptions};

pub use ignore::{IgnoreGroup, IgnoreSource};

pub use package::{
    archive_file_name, compute_digest, compute_digest_for, package, remote_location,
    walker::{TreeWalker, WalkStats},
    PackagedArchive, FAST_FILE_ENDING, FAST_PREFIX,
};

/// Current version of fastpack
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
