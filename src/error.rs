//! # Error Handling
//!
//! This module defines the centralized error taxonomy for `galsam`. It uses
//! `thiserror` to build a single `Error` enum that covers every failure mode
//! named in the error-handling design: I/O, format, invariant, resource, and
//! configuration errors.
//!
//! ## Key Components
//!
//! - **`Error`**: the main enum. Each variant carries the contextual fields a
//!   user needs to locate the failure (file name, tree index, halo index,
//!   substep) without re-deriving them from a bare message string.
//! - **`Result<T>`**: a type alias for `std::result::Result<T, Error>`.
//!
//! ## Propagation policy
//!
//! Leaf physics routines never return an `Error` — degenerate inputs are
//! clamped to the nearest legal value instead (see `physics`). `IoError` and
//! `FormatError` are recoverable at the file-batching boundary (the caller
//! may skip to the next input file); `InvariantViolation`, `ResourceExhaustion`
//! and `ConfigError` are always fatal and terminate the run. Only the CLI
//! boundary (`commands`) turns an `Err` into a logged message and a process
//! exit code; library code always returns `Result`.

use thiserror::Error;

/// Main error type for `galsam` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The tree file could not be found, read, or its header did not match
    /// any endianness the reader understands.
    #[error("I/O error reading '{path}': {message}")]
    Io { path: String, message: String },

    /// Wraps a bare `std::io::Error` encountered outside a known file context
    /// (e.g. creating an output directory).
    #[error("I/O error: {0}")]
    StdIo(#[from] std::io::Error),

    /// The tree file parsed structurally but contained impossible values:
    /// an out-of-range `Ntrees`, a dangling FOF pointer on a root halo, or
    /// an unrecognized tree-source kind.
    #[error("format error in '{path}' (tree {tree:?}): {message}")]
    Format {
        path: String,
        tree: Option<usize>,
        message: String,
    },

    /// A data-model invariant was violated: more than one central in a halo,
    /// a negative reservoir, a galaxy whose `CentralGal` is out of range.
    #[error(
        "invariant violation in tree {tree} halo {halo:?} substep {substep:?}: {message}"
    )]
    InvariantViolation {
        tree: usize,
        halo: Option<i32>,
        substep: Option<usize>,
        message: String,
    },

    /// The tracking allocator could not satisfy a request, or a persistent
    /// galaxy arena exceeded its `MaxGals` capacity.
    #[error("resource exhausted: {message}")]
    ResourceExhaustion { message: String },

    /// A required configuration parameter was missing, out of its declared
    /// range, or internally inconsistent (e.g. `LastFile < FirstFile`).
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Wraps a `serde_yaml` parse failure encountered while loading the
    /// configuration file.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

impl Error {
    /// Builds an [`Error::Io`] naming the file that failed.
    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Io {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Builds an [`Error::Format`] naming the file and, when known, the tree.
    pub fn format(
        path: impl Into<String>,
        tree: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Error::Format {
            path: path.into(),
            tree,
            message: message.into(),
        }
    }

    /// Builds an [`Error::InvariantViolation`] naming tree/halo/substep context.
    pub fn invariant(
        tree: usize,
        halo: Option<i32>,
        substep: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Error::InvariantViolation {
            tree,
            halo,
            substep,
            message: message.into(),
        }
    }

    /// Builds an [`Error::ResourceExhaustion`].
    pub fn resource(message: impl Into<String>) -> Self {
        Error::ResourceExhaustion {
            message: message.into(),
        }
    }

    /// Builds an [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// True for error kinds that allow an outer file-batching loop to skip
    /// the current file and continue with the next one.
    pub fn is_skippable_at_file_boundary(&self) -> bool {
        matches!(self, Error::Io { .. } | Error::StdIo(_) | Error::Format { .. })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_file() {
        let err = Error::io("trees_063.0", "file not found");
        let display = format!("{err}");
        assert!(display.contains("trees_063.0"));
        assert!(display.contains("file not found"));
    }

    #[test]
    fn format_error_includes_tree_when_known() {
        let err = Error::format("trees_063.0", Some(4), "Ntrees out of bound");
        let display = format!("{err}");
        assert!(display.contains("tree Some(4)"));
    }

    #[test]
    fn invariant_violation_names_tree_halo_substep() {
        let err = Error::invariant(2, Some(17), Some(3), "more than one central in halo");
        let display = format!("{err}");
        assert!(display.contains("tree 2"));
        assert!(display.contains("17"));
        assert!(display.contains("substep Some(3)"));
    }

    #[test]
    fn resource_exhaustion_carries_message() {
        let err = Error::resource("MaxGals exceeded for tree 9");
        assert!(format!("{err}").contains("MaxGals exceeded"));
    }

    #[test]
    fn config_error_carries_message() {
        let err = Error::config("SfrEfficiency must be > 0");
        assert!(format!("{err}").contains("SfrEfficiency"));
    }

    #[test]
    fn io_and_format_are_skippable_invariant_and_resource_are_not() {
        assert!(Error::io("f", "m").is_skippable_at_file_boundary());
        assert!(Error::format("f", None, "m").is_skippable_at_file_boundary());
        assert!(!Error::invariant(0, None, None, "m").is_skippable_at_file_boundary());
        assert!(!Error::resource("m").is_skippable_at_file_boundary());
        assert!(!Error::config("m").is_skippable_at_file_boundary());
    }

    #[test]
    fn std_io_error_converts_via_from() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_error.into();
        assert!(format!("{err}").contains("missing"));
    }
}
