//! Core types and utilities for fastpack
//!
//! This module contains the fundamental data types, error handling,
//! and digest folding used throughout the packager.

pub mod error;
pub mod hash;
pub mod types;

// Re-export commonly used items
pub use error::{PackagingError, Result};
pub use hash::{DigestComputer, HashingReader};
pub use types::{canonical_rel_path, EntryKind, TreeDigest, TreeEntry};
