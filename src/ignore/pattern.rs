//! Gitignore-style pattern parsing and matching
//!
//! Patterns are compiled with the `glob` crate. A line that fails to compile
//! is kept as a literal that never matches, so one bad rule cannot block a
//! walk.

use glob::{MatchOptions, Pattern as GlobPattern};
use tracing::warn;

/// Match options shared by every compiled pattern
///
/// `*` never crosses a `/`, and dot-files are matched like any other name.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A single compiled ignore rule
#[derive(Debug, Clone)]
pub struct Pattern {
    /// The rule text as written (after trimming)
    pub original: String,
    /// Whether this is a re-inclusion rule (starts with `!`)
    pub negated: bool,
    /// Directory the rule was loaded from, relative to the source root
    /// (`""` for the root itself)
    pub anchor: String,
    /// Rule ended in `/` and only matches directories
    pub directory_only: bool,
    /// Rule contains a `/` and matches against the full anchored path
    /// instead of the basename
    pub rooted: bool,
    /// Compiled glob; `None` for malformed rules
    glob: Option<GlobPattern>,
}

impl Pattern {
    /// Parse one line of a rule file anchored at `anchor`
    ///
    /// Returns `None` for blank lines and comments.
    pub fn parse(line: &str, anchor: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let line = trim_unescaped_trailing_spaces(line);

        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (negated, body) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };

        // `\#` and `\!` escape a leading marker character
        let body = body
            .strip_prefix("\\#")
            .map(|rest| format!("#{rest}"))
            .or_else(|| body.strip_prefix("\\!").map(|rest| format!("!{rest}")))
            .unwrap_or_else(|| body.to_string());

        let (directory_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest.to_string()),
            None => (false, body),
        };

        if body.is_empty() {
            return None;
        }

        // A separator anywhere but the end anchors the rule to its directory
        let rooted = body.contains('/');
        let body = body.strip_prefix('/').unwrap_or(&body).to_string();
        // glob has no backslash escape for spaces
        let body = body.replace("\\ ", " ");

        let glob = match GlobPattern::new(&body) {
            Ok(glob) => Some(glob),
            Err(e) => {
                warn!(pattern = %line, anchor = %anchor, error = %e, "Treating malformed ignore pattern as non-matching");
                None
            },
        };

        Some(Self {
            original: line.to_string(),
            negated,
            anchor: anchor.trim_matches('/').to_string(),
            directory_only,
            rooted,
            glob,
        })
    }

    /// Whether the rule failed to compile
    pub fn is_malformed(&self) -> bool {
        self.glob.is_none()
    }

    /// Whether this rule's anchor directory contains `rel_path`
    pub fn applies_to(&self, rel_path: &str) -> bool {
        self.local_path(rel_path).is_some()
    }

    /// Check whether the rule matches a `/`-separated path relative to the
    /// source root
    pub fn matches(&self, rel_path: &str, is_dir: bool) -> bool {
        let Some(glob) = &self.glob else {
            return false;
        };

        if self.directory_only && !is_dir {
            return false;
        }

        let Some(local) = self.local_path(rel_path) else {
            return false;
        };

        if self.rooted {
            glob.matches_with(local, MATCH_OPTIONS)
        } else {
            // Bare names match at any depth below the anchor
            let basename = local.rsplit('/').next().unwrap_or(local);
            glob.matches_with(basename, MATCH_OPTIONS)
        }
    }

    /// Strip the anchor directory from `rel_path`
    fn local_path<'p>(&self, rel_path: &'p str) -> Option<&'p str> {
        if self.anchor.is_empty() {
            return Some(rel_path);
        }
        rel_path
            .strip_prefix(self.anchor.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }
}

/// Parse the contents of a rule file into patterns anchored at `anchor`
pub fn parse_rules(content: &str, anchor: &str) -> Vec<Pattern> {
    content
        .lines()
        .filter_map(|line| Pattern::parse(line, anchor))
        .collect()
}

/// Trailing spaces are dropped unless escaped with a backslash
fn trim_unescaped_trailing_spaces(line: &str) -> &str {
    let trimmed = line.trim_end_matches(' ');
    if trimmed.ends_with('\\') && trimmed.len() < line.len() {
        &line[..trimmed.len() + 1]
    } else {
        trimmed
    }
}
