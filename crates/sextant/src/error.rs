//! Error types for Sextant operations.
//!
//! Errors are split in two:
//!
//! - **`Error`**: failures that halt the current operation (opening an
//!   incompatible snapshot, database failures, invalid raw queries)
//! - **`IndexError`**: per-file failures that are collected into
//!   [`IndexStats`](crate::types::IndexStats) while the run continues
//!
//! `IndexErrorKind` keeps the 4xx/5xx split: input problems are the
//! project's (a file that does not parse), internal problems are ours.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Sextant operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Sextant operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or arguments
    #[error("configuration error: {0}")]
    Config(String),

    /// A snapshot segment for a required table is missing or unreadable
    #[error("snapshot error in table '{table}': {message}")]
    Snapshot {
        /// Table whose segment failed to load
        table: String,
        /// What went wrong
        message: String,
    },

    /// The snapshot was written by an incompatible schema
    #[error(
        "snapshot table '{table}' has incompatible schema (expected {expected}, found {found}); reset the index"
    )]
    SchemaMismatch {
        /// Table whose segment did not match
        table: String,
        /// What this build expects
        expected: String,
        /// What the snapshot contains
        found: String,
    },

    /// A raw query named an unknown table/column or tried to write
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Internal invariant violated
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns `true` when the failure can be cleared by resetting the index.
    #[must_use]
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. })
    }
}

/// Error encountered while indexing a specific file.
///
/// Collected during indexing; the indexer moves on to the remaining files.
#[derive(Debug, Clone)]
pub struct IndexError {
    /// Path to the file that failed, relative to the source root
    pub path: PathBuf,
    /// Category of the error
    pub kind: IndexErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.path.display(),
            self.message,
            self.kind
        )
    }
}

impl std::error::Error for IndexError {}

/// Categorization of indexing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorKind {
    // === Input Problems (analogous to HTTP 4xx) ===
    /// Source file could not be parsed
    ParseFailed,

    /// File content is not valid UTF-8
    EncodingError,

    // === Internal Problems (analogous to HTTP 5xx) ===
    /// Could not read the file from disk
    IoError,

    /// Database operation failed for this file
    DatabaseError,
}

impl std::fmt::Display for IndexErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseFailed => write!(f, "parse failed"),
            Self::EncodingError => write!(f, "encoding error"),
            Self::IoError => write!(f, "I/O error"),
            Self::DatabaseError => write!(f, "database error"),
        }
    }
}

impl IndexErrorKind {
    /// Returns `true` if this is an input problem (4xx-style).
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::ParseFailed | Self::EncodingError)
    }

    /// Returns `true` if this is an internal problem (5xx-style).
    #[must_use]
    pub fn is_internal_error(&self) -> bool {
        matches!(self, Self::IoError | Self::DatabaseError)
    }
}

impl IndexError {
    /// Create a new indexing error.
    #[must_use]
    pub fn new(path: PathBuf, kind: IndexErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Create a parse error for a file.
    #[must_use]
    pub fn parse_failed(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(path, IndexErrorKind::ParseFailed, message)
    }

    /// Create an encoding error for a file.
    #[must_use]
    pub fn encoding_error(path: PathBuf) -> Self {
        Self::new(path, IndexErrorKind::EncodingError, "file is not valid UTF-8")
    }

    /// Create an I/O error for a file.
    #[must_use]
    pub fn io_error(path: PathBuf, error: &std::io::Error) -> Self {
        Self::new(path, IndexErrorKind::IoError, error.to_string())
    }

    /// Create a database error scoped to one file's transaction.
    #[must_use]
    pub fn database_error(path: PathBuf, error: &Error) -> Self {
        Self::new(path, IndexErrorKind::DatabaseError, error.to_string())
    }
}
