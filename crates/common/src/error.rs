//! Error types for Ecom OS

use thiserror::Error;

/// Result type alias using Ecom OS Error
pub type Result<T> = std::result::Result<T, Error>;

/// Ecom OS error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Resource already exists: {kind} with id {id}")]
    AlreadyExists { kind: String, id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
