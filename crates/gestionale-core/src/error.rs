//! Error types for gestionale-core

use thiserror::Error;

/// Result type alias using gestionale-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gestionale-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Backing store never became ready within the bound
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the operation for missing permissions
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Document missing on the remote store (possibly already deleted)
    #[error("Reservation not found: {0}")]
    NotFound(String),

    /// Positional index outside the fallback list bounds
    #[error("Invalid local reservation index: {0}")]
    InvalidIndex(usize),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error (fallback file access)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Any other backend error, surfaced with its raw message
    #[error("Store error: {0}")]
    Store(String),
}
