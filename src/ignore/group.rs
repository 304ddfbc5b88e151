//! Ignore group: the union of all active ignore sources for one run

use crate::config::options::{IgnoreKind, PackageOptions};
use crate::core::types::canonical_rel_path;
use crate::ignore::source::IgnoreSource;
use std::path::{Path, PathBuf};

/// Ordered set of ignore sources combined with logical OR
///
/// A negation inside one source can only re-include what that same source
/// excluded; it never overrides another source's exclusion.
#[derive(Debug, Clone)]
pub struct IgnoreGroup {
    /// Source root as given by the caller
    root: PathBuf,
    /// Canonical form of the root, for resolving absolute query paths
    canonical_root: Option<PathBuf>,
    /// Member sources in application order
    sources: Vec<IgnoreSource>,
    /// Whether the built-in default sources were unioned in
    includes_defaults: bool,
}

impl IgnoreGroup {
    /// Build a group from explicit source kinds only
    pub fn new(root: &Path, kinds: &[IgnoreKind]) -> Self {
        let mut group = Self::empty(root);
        for kind in dedup_kinds(kinds.iter().copied()) {
            group.sources.push(IgnoreSource::load(kind, root));
        }
        group
    }

    /// A group with no sources; nothing is ignored
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            canonical_root: dunce::canonicalize(root).ok(),
            sources: Vec::new(),
            includes_defaults: false,
        }
    }

    /// Build the group described by packaging options
    ///
    /// Explicit kinds come first, then custom predicates, then the default
    /// sources when `keep_default_ignores` is set.
    pub fn from_options(root: &Path, options: &PackageOptions) -> Self {
        let defaults: &[IgnoreKind] = if options.keep_default_ignores {
            IgnoreKind::DEFAULTS
        } else {
            &[]
        };

        let explicit: Vec<_> = options
            .ignores
            .iter()
            .copied()
            .filter(|kind| !defaults.contains(kind))
            .collect();

        let mut group = Self::new(root, &explicit);
        for custom in &options.custom_ignores {
            group.sources.push(IgnoreSource::custom(custom.clone()));
        }
        for kind in defaults {
            group.sources.push(IgnoreSource::load(*kind, root));
        }
        group.includes_defaults = options.keep_default_ignores;
        group
    }

    /// Append one more source
    pub fn with_source(mut self, source: IgnoreSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Source root this group was loaded for
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Member sources in application order
    pub fn sources(&self) -> &[IgnoreSource] {
        &self.sources
    }

    /// Whether the built-in default sources are members
    pub fn includes_defaults(&self) -> bool {
        self.includes_defaults
    }

    /// Check a single entry without consulting its ancestors
    ///
    /// Used by the walker, which has already pruned ignored parents.
    pub fn is_ignored_entry(&self, rel_path: &str, is_dir: bool) -> bool {
        self.sources
            .iter()
            .any(|source| source.is_ignored(rel_path, is_dir))
    }

    /// Check a `/`-separated relative path, including every ancestor
    /// directory: anything below an ignored directory is ignored too
    pub fn is_ignored_rel(&self, rel_path: &str, is_dir: bool) -> bool {
        let rel_path = rel_path.trim_matches('/');
        if rel_path.is_empty() {
            return false;
        }

        let ancestor_ignored = rel_path
            .match_indices('/')
            .any(|(idx, _)| self.is_ignored_entry(&rel_path[..idx], true));

        ancestor_ignored || self.is_ignored_entry(rel_path, is_dir)
    }

    /// Check a path given either relative to the root or as an absolute path
    /// under it; whether it is a directory is read from the filesystem
    ///
    /// Paths outside the root are never ignored.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Some(rel) = self.relativize(path) else {
            return false;
        };

        let is_dir = self
            .root
            .join(&rel)
            .symlink_metadata()
            .map(|meta| meta.is_dir())
            .unwrap_or(false);

        match canonical_rel_path(&rel) {
            Some(rel) => self.is_ignored_rel(&rel, is_dir),
            None => false,
        }
    }

    fn relativize(&self, path: &Path) -> Option<PathBuf> {
        if path.is_relative() {
            return Some(path.to_path_buf());
        }

        if let Ok(rel) = path.strip_prefix(&self.root) {
            return Some(rel.to_path_buf());
        }

        let canonical_root = self.canonical_root.as_ref()?;
        if let Ok(rel) = path.strip_prefix(canonical_root) {
            return Some(rel.to_path_buf());
        }

        // The query may itself need canonicalizing (e.g. a /tmp symlink)
        let parent = dunce::canonicalize(path.parent()?).ok()?;
        let rel_parent = parent.strip_prefix(canonical_root).ok()?;
        Some(rel_parent.join(path.file_name()?))
    }
}

fn dedup_kinds(kinds: impl Iterator<Item = IgnoreKind>) -> Vec<IgnoreKind> {
    let mut seen = Vec::new();
    for kind in kinds {
        if !seen.contains(&kind) {
            seen.push(kind);
        }
    }
    seen
}
