//! Error types for fastpack

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for packaging operations
///
/// Only caller-facing failures live here. Filesystem anomalies met during a
/// walk (broken links, special files, unreadable entries) and malformed ignore
/// patterns are logged and skipped instead.
#[derive(Error, Debug)]
pub enum PackagingError {
    /// Source directory errors
    #[error("Source directory not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Source path is not a directory: {path}")]
    SourceNotDirectory { path: PathBuf },

    /// Output directory errors
    #[error("Output path is not a directory: {path}")]
    OutputNotDirectory { path: PathBuf },

    #[error("Output directory is not writable: {path} ({source})")]
    OutputNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Invalid packaging options: {reason}")]
    InvalidOptions { reason: String },

    #[error("Configuration error: {reason}")]
    ConfigurationError { reason: String },

    /// Compression errors
    #[error("Compression failed: {reason}")]
    CompressionFailed { reason: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackagingError {
    /// Create a new source not found error
    pub fn source_not_found(path: PathBuf) -> Self {
        Self::SourceNotFound { path }
    }

    /// Create a new output not writable error
    pub fn output_not_writable(path: PathBuf, source: std::io::Error) -> Self {
        Self::OutputNotWritable { path, source }
    }

    /// Create a new invalid options error
    pub fn invalid_options(reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            reason: reason.into(),
        }
    }

    /// Create a new compression failed error
    pub fn compression_failed(reason: impl Into<String>) -> Self {
        Self::CompressionFailed {
            reason: reason.into(),
        }
    }

    /// Whether this error is a caller precondition failure (bad source or output)
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. }
                | Self::SourceNotDirectory { .. }
                | Self::OutputNotDirectory { .. }
                | Self::OutputNotWritable { .. }
                | Self::InvalidOptions { .. }
        )
    }
}

/// Result type alias for packaging operations
pub type Result<T> = std::result::Result<T, PackagingError>;
