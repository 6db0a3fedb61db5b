//! Centralized error types for the MHTML library.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the MHTML library.
///
/// Only parsing and file access fail with an error. Queries and mutations
/// on an already constructed [`Archive`](crate::model::archive::Archive)
/// report failure through `Option`/`bool` so that callers iterating over
/// many resources can skip bad entries.
#[derive(Error, Debug)]
pub enum MhtmlError {
    /// I/O error with the associated file path.
    #[error("I/O error accessing '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("MHTML file not found: {0}")]
    FileNotFound(PathBuf),

    /// A header block ran out of input before its terminating blank line.
    #[error("Malformed header at offset {offset}: {reason}")]
    MalformedHeader { offset: usize, reason: String },

    /// The archive cannot take part in the requested operation.
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    /// The Content-Transfer-Encoding is unknown or missing.
    #[error("Unsupported content transfer encoding: {0}")]
    UnsupportedEncoding(String),

    /// The body could not be decoded with its declared encoding.
    #[error("Failed to decode {encoding} content: {reason}")]
    Decode { encoding: String, reason: String },
}

/// Convenience alias for `Result<T, MhtmlError>`.
pub type Result<T> = std::result::Result<T, MhtmlError>;

impl MhtmlError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
