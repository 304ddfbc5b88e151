//! Packaging options
//!
//! Options are plain serde data so they can be read from a TOML file; the
//! parts that cannot be serialized (caller predicates, module file lists) are
//! attached with builder methods.

use crate::core::error::{PackagingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Kind of a built-in ignore source
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreKind {
    /// `.gitignore` files anywhere in the tree
    #[value(name = "gitignore")]
    GitIgnore,
    /// `.dockerignore` files anywhere in the tree
    #[value(name = "dockerignore")]
    DockerIgnore,
    /// The fixed standard table
    Standard,
}

impl IgnoreKind {
    /// Sources unioned in when `keep_default_ignores` is set
    pub const DEFAULTS: &'static [IgnoreKind] = &[
        IgnoreKind::GitIgnore,
        IgnoreKind::DockerIgnore,
        IgnoreKind::Standard,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IgnoreKind::GitIgnore => "gitignore",
            IgnoreKind::DockerIgnore => "dockerignore",
            IgnoreKind::Standard => "standard",
        }
    }

    /// Rule file name for file-based sources
    pub fn rule_file_name(self) -> Option<&'static str> {
        match self {
            IgnoreKind::GitIgnore => Some(".gitignore"),
            IgnoreKind::DockerIgnore => Some(".dockerignore"),
            IgnoreKind::Standard => None,
        }
    }
}

/// Which files the walker considers before ignore filtering
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CopyStyle {
    /// Only the module files supplied by the caller, plus their directories
    LoadedModules,
    /// Every file under the source root
    #[default]
    All,
}

/// Compression stage applied over the tar stream
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CompressionBackend {
    /// In-process gzip
    #[default]
    Gzip,
    /// External parallel gzip (`pigz`), falling back to gzip when missing
    Pigz,
}

/// Caller-supplied ignore predicate over `/`-separated relative paths
#[derive(Clone)]
pub struct CustomIgnore {
    name: String,
    predicate: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl CustomIgnore {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ignored(&self, rel_path: &str) -> bool {
        (self.predicate)(rel_path)
    }
}

impl fmt::Debug for CustomIgnore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomIgnore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Options for one packaging run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOptions {
    /// Explicit ignore sources, applied before the defaults
    pub ignores: Vec<IgnoreKind>,
    /// Union the default sources with the explicit ones
    pub keep_default_ignores: bool,
    /// Store link targets' content instead of the links themselves
    pub deref_symlinks: bool,
    /// Which files are considered at all
    pub copy_style: CopyStyle,
    /// Compression backend for the archive
    pub compression: CompressionBackend,
    /// Gzip level, 0-9
    pub compression_level: u32,
    /// Caller predicates, each an extra ignore source
    #[serde(skip)]
    pub custom_ignores: Vec<CustomIgnore>,
    /// Module files for [`CopyStyle::LoadedModules`], relative to the source
    /// root or absolute under it
    #[serde(skip)]
    pub module_files: Vec<PathBuf>,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            ignores: Vec::new(),
            keep_default_ignores: true,
            deref_symlinks: false,
            copy_style: CopyStyle::All,
            compression: CompressionBackend::Gzip,
            compression_level: 6,
            custom_ignores: Vec::new(),
            module_files: Vec::new(),
        }
    }
}

impl PackageOptions {
    /// Parse options from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let options: PackageOptions =
            toml::from_str(content).map_err(|e| PackagingError::ConfigurationError {
                reason: format!("Failed to parse packaging options: {}", e),
            })?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serialize the serializable part of the options to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PackagingError::ConfigurationError {
            reason: format!("Failed to serialize packaging options: {}", e),
        })
    }

    /// Check option values that cannot be expressed in the types
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(PackagingError::invalid_options(format!(
                "compression_level must be between 0 and 9, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }

    pub fn with_custom_ignore(mut self, ignore: CustomIgnore) -> Self {
        self.custom_ignores.push(ignore);
        self
    }

    /// Restrict the walk to the given module files
    pub fn with_module_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.copy_style = CopyStyle::LoadedModules;
        self.module_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_deref_symlinks(mut self, deref: bool) -> Self {
        self.deref_symlinks = deref;
        self
    }
}
