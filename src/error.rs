//! Error types for the crocus crate.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, CrocusError>;

/// Errors that can occur while encoding, decoding or querying an index.
#[derive(Debug, Error)]
pub enum CrocusError {
    /// An I/O error from the underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data failed to decode. The decode is aborted; the cursor
    /// position is unrecoverable after this error.
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    /// A caller-supplied argument violated an encode-time invariant.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An index-level operation failed.
    #[error("Index error: {0}")]
    Index(String),
}

impl CrocusError {
    /// Create a corrupt-data error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        CrocusError::Corrupt(msg.into())
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        CrocusError::InvalidArgument(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        CrocusError::Index(msg.into())
    }
}
