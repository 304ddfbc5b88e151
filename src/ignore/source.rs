//! Ignore sources: one provenance of exclusion rules each

use crate::config::options::{CustomIgnore, IgnoreKind};
use crate::core::types::canonical_rel_path;
use crate::ignore::pattern::{parse_rules, Pattern};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Built-in default rules: version-control metadata, bytecode and cache
/// directories, virtual environments and credential dot-files
///
/// `__pycache__/*` removes the contents of a bytecode directory but keeps the
/// directory entry itself.
pub const STANDARD_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "*.pyc",
    ".cache",
    ".cache/*",
    "__pycache__/*",
    "**/__pycache__/*",
    ".venv",
    "venv",
    ".env",
];

/// Name of the version-control metadata directory skipped during rule
/// file discovery
const VCS_DIR: &str = ".git";

/// One provenance of ignore rules
#[derive(Debug, Clone)]
pub enum IgnoreSource {
    /// Rules loaded from every rule file of one name found in the tree
    RuleFiles {
        kind: IgnoreKind,
        patterns: Vec<Pattern>,
        files_loaded: usize,
    },
    /// A fixed rule table anchored at the root
    Standard { patterns: Vec<Pattern> },
    /// A caller-supplied predicate over `/`-separated relative paths
    Custom(CustomIgnore),
}

impl IgnoreSource {
    /// Load the source of the given kind for the tree rooted at `root`
    pub fn load(kind: IgnoreKind, root: &Path) -> Self {
        match kind.rule_file_name() {
            Some(file_name) => Self::from_rule_files(kind, file_name, root),
            None => Self::standard(),
        }
    }

    /// The built-in default table
    pub fn standard() -> Self {
        Self::from_table(STANDARD_IGNORE_PATTERNS)
    }

    /// A fixed table of rules anchored at the root
    pub fn from_table(table: &[&str]) -> Self {
        let patterns = table
            .iter()
            .filter_map(|line| Pattern::parse(line, ""))
            .collect();
        Self::Standard { patterns }
    }

    /// Wrap a caller-supplied predicate
    pub fn custom(ignore: CustomIgnore) -> Self {
        Self::Custom(ignore)
    }

    /// Scan `root` for rule files named `file_name`
    ///
    /// Each directory's rule file is read before its subdirectories are
    /// entered, so parent rules always precede (and lose to) deeper ones.
    /// Directories excluded by the rules loaded so far are not descended
    /// into: nothing below them can be re-included, so their rule files
    /// could never change a verdict.
    fn from_rule_files(kind: IgnoreKind, file_name: &str, root: &Path) -> Self {
        let rule_file = file_name.to_owned();
        let mut walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by(move |a, b| {
                let a_rule = a.file_name() == rule_file.as_str();
                let b_rule = b.file_name() == rule_file.as_str();
                b_rule
                    .cmp(&a_rule)
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter();

        let mut patterns = Vec::new();
        let mut files_loaded = 0;

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry during rule discovery");
                    continue;
                },
            };
            if entry.depth() == 0 {
                continue;
            }

            let is_dir = entry.file_type().is_dir();
            let rel_path = entry
                .path()
                .strip_prefix(root)
                .ok()
                .and_then(canonical_rel_path);
            let Some(rel_path) = rel_path else {
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            };

            if is_dir {
                if entry.file_name() == VCS_DIR || last_match_ignores(&patterns, &rel_path, true) {
                    walker.skip_current_dir();
                }
                continue;
            }

            if !entry.file_type().is_file() || entry.file_name() != file_name {
                continue;
            }

            let anchor = rel_path
                .rsplit_once('/')
                .map(|(dir, _)| dir.to_string())
                .unwrap_or_default();

            match fs::read_to_string(entry.path()) {
                Ok(content) => {
                    patterns.extend(parse_rules(&content, &anchor));
                    files_loaded += 1;
                },
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Failed to read ignore file");
                },
            }
        }

        debug!(
            source = kind.name(),
            files = files_loaded,
            patterns = patterns.len(),
            "Loaded ignore rules"
        );

        Self::RuleFiles {
            kind,
            patterns,
            files_loaded,
        }
    }

    /// Display name of this source
    pub fn name(&self) -> &str {
        match self {
            Self::RuleFiles { kind, .. } => kind.name(),
            Self::Standard { .. } => IgnoreKind::Standard.name(),
            Self::Custom(custom) => custom.name(),
        }
    }

    /// The kind for file-based and built-in sources
    pub fn kind(&self) -> Option<IgnoreKind> {
        match self {
            Self::RuleFiles { kind, .. } => Some(*kind),
            Self::Standard { .. } => Some(IgnoreKind::Standard),
            Self::Custom(_) => None,
        }
    }

    /// Loaded patterns, in evaluation order
    pub fn patterns(&self) -> &[Pattern] {
        match self {
            Self::RuleFiles { patterns, .. } | Self::Standard { patterns } => patterns,
            Self::Custom(_) => &[],
        }
    }

    /// Check one path against this source only
    ///
    /// Patterns are evaluated in load order and the last match wins, so a
    /// negation can re-include what an earlier rule of this source excluded.
    pub fn is_ignored(&self, rel_path: &str, is_dir: bool) -> bool {
        match self {
            Self::Custom(custom) => custom.is_ignored(rel_path),
            _ => last_match_ignores(self.patterns(), rel_path, is_dir),
        }
    }
}

/// Evaluate rules in order; the last matching rule decides
fn last_match_ignores(patterns: &[Pattern], rel_path: &str, is_dir: bool) -> bool {
    let mut ignored = false;
    for pattern in patterns {
        if pattern.matches(rel_path, is_dir) {
            ignored = !pattern.negated;
        }
    }
    ignored
}
