//! Error taxonomy for the versioning engine.

use thiserror::Error;

/// Result type used throughout rewind-core and the journal crate.
pub type Result<T> = std::result::Result<T, RewindError>;

/// Coarse classification of a [`RewindError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Content or metadata I/O failed (disk, permissions, corruption).
    StorageFailure,
    /// The requested snapshot, path or branch has no data.
    NotFound,
    /// Malformed timestamp, branch name or reference.
    InvalidArgument,
}

/// Errors raised by the storage and reconstruction layers.
#[derive(Debug, Error)]
pub enum RewindError {
    /// Filesystem I/O error with a description of what was being done.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Metadata store failure.
    #[error("Metadata store error: {0}")]
    Storage(String),

    /// A stored record could not be decoded.
    #[error("Corrupted record: {0}")]
    Corrupted(String),

    /// Nothing matched the query.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied a malformed value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl RewindError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an invalid argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            Self::Io { .. } | Self::Storage(_) | Self::Corrupted(_) => ErrorKind::StorageFailure,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    /// Whether this error means "no data" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Attach context to `std::io::Result` values.
pub trait IoContext<T> {
    fn io_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| RewindError::io(context(), e))
    }
}
