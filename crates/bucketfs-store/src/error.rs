//! Storage error types.

use std::error::Error as StdError;

/// Errors raised by the filesystem store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The object key cannot be mapped safely onto the filesystem.
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// The bucket name cannot be mapped safely onto the filesystem.
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    /// A filesystem operation failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A metadata document could not be encoded or decoded.
    #[error("Invalid object metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The incoming object body failed while it was being written.
    #[error("Object body failed: {0}")]
    Body(#[source] Box<dyn StdError + Send + Sync>),
}

impl StoreError {
    /// Wrap a body stream failure.
    pub fn body(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Body(err.into())
    }

    /// The body failure, if this error came from the incoming stream.
    #[must_use]
    pub fn body_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Body(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
