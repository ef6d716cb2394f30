//! Error types for the scannotate library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scannotate operations.
///
/// Recoverable decode conditions (truncated buffers, out-of-range face
/// indices, non-finite coordinates) never surface here; they are absorbed
/// into the decoded value and counted in its [`DecodeStats`]. Only inputs
/// with no recognizable structure, or unreadable files, produce an error.
///
/// [`DecodeStats`]: crate::ply::DecodeStats
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Header is missing or cannot be interpreted at all
    #[error("Malformed PLY header: {0}")]
    MalformedHeader(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse or serialize error (scene graphs, annotation documents)
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a malformed header error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedHeader(msg.into())
    }
}

/// Result type alias for scannotate operations.
pub type Result<T> = std::result::Result<T, Error>;
