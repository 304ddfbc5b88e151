//! Deterministic, pruning traversal of a source tree

use crate::core::types::{canonical_rel_path, EntryKind, TreeEntry};
use crate::ignore::IgnoreGroup;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Counters gathered during one walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Regular files yielded
    pub files: usize,
    /// Directories yielded
    pub directories: usize,
    /// Symlinks yielded as links
    pub symlinks: usize,
    /// Entries (including whole subtrees, counted once) removed by ignore rules
    pub ignored: usize,
    /// Entries outside the loaded-module selection
    pub unselected: usize,
    /// Broken links, special files and unreadable entries
    pub skipped: usize,
}

impl WalkStats {
    /// Total entries yielded
    pub fn total(&self) -> usize {
        self.files + self.directories + self.symlinks
    }

    /// Move files that were yielded but could not be opened to `skipped`
    pub(crate) fn record_unreadable(&mut self, count: usize) {
        self.files = self.files.saturating_sub(count);
        self.skipped += count;
    }
}

/// Files (and their ancestor directories) a loaded-modules walk may yield
#[derive(Debug, Clone, Default)]
struct ModuleSelection {
    files: BTreeSet<String>,
    directories: BTreeSet<String>,
}

impl ModuleSelection {
    fn new(root: &Path, module_files: &[PathBuf]) -> Self {
        let canonical_root = dunce::canonicalize(root).ok();
        let mut selection = Self::default();

        for file in module_files {
            let rel = if file.is_absolute() {
                let stripped = file.strip_prefix(root).ok().or_else(|| {
                    canonical_root
                        .as_deref()
                        .and_then(|canonical| file.strip_prefix(canonical).ok())
                });
                match stripped {
                    Some(rel) => rel,
                    None => {
                        debug!(path = %file.display(), "Module file is outside the source root");
                        continue;
                    },
                }
            } else {
                file.as_path()
            };

            let Some(rel) = canonical_rel_path(rel) else {
                debug!(path = %file.display(), "Module file path is not valid UTF-8");
                continue;
            };
            for (idx, _) in rel.match_indices('/') {
                selection.directories.insert(rel[..idx].to_string());
            }
            selection.files.insert(rel);
        }

        selection
    }

    fn admits(&self, rel_path: &str, is_dir: bool) -> bool {
        if is_dir {
            self.directories.contains(rel_path)
        } else {
            self.files.contains(rel_path)
        }
    }
}

/// Single-pass, depth-first walk yielding [`TreeEntry`] values in sorted
/// order
///
/// Ignored directories are pruned without being read. Broken links, special
/// files and unreadable entries are logged and skipped, never returned as
/// errors. The iterator is not restartable; walk again for a second pass.
pub struct TreeWalker<'g> {
    root: PathBuf,
    group: &'g IgnoreGroup,
    inner: walkdir::IntoIter,
    selection: Option<ModuleSelection>,
    exclude: Option<PathBuf>,
    stats: WalkStats,
}

impl<'g> TreeWalker<'g> {
    /// Create a walker over `root` filtered by `group`
    pub fn new(root: &Path, group: &'g IgnoreGroup) -> Self {
        Self {
            root: root.to_path_buf(),
            group,
            inner: Self::build_inner(root, false),
            selection: None,
            exclude: None,
            stats: WalkStats::default(),
        }
    }

    fn build_inner(root: &Path, follow_links: bool) -> walkdir::IntoIter {
        WalkDir::new(root)
            .min_depth(1)
            .follow_links(follow_links)
            .sort_by_file_name()
            .into_iter()
    }

    /// Follow symlinks and yield their targets instead of the links
    pub fn deref_symlinks(mut self, deref: bool) -> Self {
        self.inner = Self::build_inner(&self.root, deref);
        self
    }

    /// Only yield the given module files and the directories containing them
    pub fn with_module_files(mut self, module_files: &[PathBuf]) -> Self {
        self.selection = Some(ModuleSelection::new(&self.root, module_files));
        self
    }

    /// Never yield this exact path (e.g. an archive being written inside
    /// the tree)
    pub fn exclude_path(mut self, path: &Path) -> Self {
        self.exclude = Some(path.to_path_buf());
        self
    }

    /// Counters gathered so far
    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    /// Consume the walker and return its counters
    pub fn into_stats(self) -> WalkStats {
        self.stats
    }

    fn record_error(&mut self, err: walkdir::Error) {
        self.stats.skipped += 1;
        let path = err
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        if let Some(ancestor) = err.loop_ancestor() {
            debug!(path = %path, ancestor = %ancestor.display(), "Skipping symlink cycle");
        } else if err
            .io_error()
            .map(|e| e.kind() == std::io::ErrorKind::NotFound)
            .unwrap_or(false)
        {
            debug!(path = %path, "Skipping dangling symlink");
        } else {
            warn!(path = %path, error = %err, "Skipping unreadable entry");
        }
    }

    fn classify(&self, path: &Path, file_type: fs::FileType) -> Option<EntryKind> {
        if file_type.is_dir() {
            Some(EntryKind::Directory)
        } else if file_type.is_file() {
            Some(EntryKind::File)
        } else if file_type.is_symlink() {
            match fs::read_link(path) {
                Ok(target) => match target.into_os_string().into_string() {
                    Ok(target) => Some(EntryKind::Symlink { target }),
                    Err(_) => {
                        warn!(path = %path.display(), "Skipping symlink with non-UTF-8 target");
                        None
                    },
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable symlink");
                    None
                },
            }
        } else {
            debug!(path = %path.display(), "Skipping special file");
            None
        }
    }
}

impl Iterator for TreeWalker<'_> {
    type Item = TreeEntry;

    fn next(&mut self) -> Option<TreeEntry> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    self.record_error(err);
                    continue;
                },
            };

            let is_dir = entry.file_type().is_dir();

            if self.exclude.as_deref() == Some(entry.path()) {
                continue;
            }

            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let Some(rel_path) = canonical_rel_path(rel) else {
                warn!(path = %entry.path().display(), "Skipping entry with non-UTF-8 name");
                self.stats.skipped += 1;
                if is_dir {
                    self.inner.skip_current_dir();
                }
                continue;
            };

            if self.group.is_ignored_entry(&rel_path, is_dir) {
                self.stats.ignored += 1;
                if is_dir {
                    self.inner.skip_current_dir();
                }
                continue;
            }

            if let Some(selection) = &self.selection {
                if !selection.admits(&rel_path, is_dir) {
                    self.stats.unselected += 1;
                    if is_dir {
                        self.inner.skip_current_dir();
                    }
                    continue;
                }
            }

            let Some(kind) = self.classify(entry.path(), entry.file_type()) else {
                self.stats.skipped += 1;
                continue;
            };

            match kind {
                EntryKind::File => self.stats.files += 1,
                EntryKind::Directory => self.stats.directories += 1,
                EntryKind::Symlink { .. } => self.stats.symlinks += 1,
            }

            return Some(TreeEntry::new(rel_path, entry.path(), kind));
        }
    }
}
