//! Operational error types for store mutations and persistence.
//!
//! Parse-time problems are never errors here; they travel as diagnostics
//! on the parse result. These variants cover failures a caller must
//! handle: missing notes, invalid parents, and disk I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Failures from Note Store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested note does not exist.
    #[error("note not found: {0}")]
    NoteNotFound(String),

    /// The supplied parent id does not resolve to a note.
    #[error("parent note not found: {0}")]
    ParentNotFound(String),

    /// Attaching to this parent would cycle the parent chain.
    #[error("circular reference detected at {0}")]
    CircularReference(String),

    /// An explicitly supplied id is already taken.
    #[error("duplicate note id: {0}")]
    DuplicateId(String),

    /// An explicitly supplied id is not a well-formed id.
    #[error("invalid note id: {0}")]
    InvalidId(String),

    /// The project file does not exist.
    #[error("project file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Reading the project file failed.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the project file failed. The engine never retries; retry
    /// policy belongs to the caller.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
