//! Error types for the persistence boundary.

use thiserror::Error;

/// Result type alias using [`TreeError`].
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors surfaced by [`save`], [`load`], and [`load_from_file`].
///
/// Lookup and removal misses are reported as `Option`/`bool` return values,
/// not as errors; everything here is a file or format problem.
///
/// [`save`]: crate::BPlusTreeMap::save
/// [`load`]: crate::BPlusTreeMap::load
/// [`load_from_file`]: crate::BPlusTreeMap::load_from_file
#[derive(Debug, Error)]
pub enum TreeError {
    /// The file could not be opened, read, or written. Short reads surface
    /// as [`std::io::ErrorKind::UnexpectedEof`].
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not begin with the expected magic number.
    #[error("not a B+ tree file: bad magic {found:#010x}")]
    BadMagic { found: u32 },

    /// The file uses a format version this build does not understand.
    #[error("incompatible file version: expected {expected}, got {found}")]
    BadVersion { expected: u32, found: u32 },

    /// The file was saved from a tree of a different order. `load` refuses
    /// rather than silently rebalancing; `load_from_file` constructs a tree
    /// with the file's order instead.
    #[error(
        "tree order mismatch: file has order {file}, tree has order {tree} \
         (use load_from_file to adopt the file's order)"
    )]
    OrderMismatch { file: usize, tree: usize },
}
