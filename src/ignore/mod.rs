//! Layered, gitignore-compatible ignore rules
//!
//! A [`pattern::Pattern`] is one rule, an [`source::IgnoreSource`] is one
//! provenance of rules (`.gitignore` files, `.dockerignore` files, the
//! standard table, or a caller predicate), and an [`group::IgnoreGroup`]
//! ORs the sources of one packaging run together.

pub mod group;
pub mod pattern;
pub mod source;

// Re-export commonly used items
pub use group::IgnoreGroup;
pub use pattern::Pattern;
pub use source::{IgnoreSource, STANDARD_IGNORE_PATTERNS};
