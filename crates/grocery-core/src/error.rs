//! Error types for grocery-core

use thiserror::Error;

use crate::remote::RemoteError;
use crate::sync::SyncError;

/// Result type alias using grocery-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in grocery-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local storage error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend call failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Synchronization failed
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A background task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Background(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Background(error.to_string())
    }
}
