//! Packaging configuration
//!
//! Options for a packaging run, loadable from a TOML file such as
//! `fastpack.toml`.

pub mod options;

// Re-export commonly used items
pub use options::{CompressionBackend, CopyStyle, CustomIgnore, IgnoreKind, PackageOptions};
