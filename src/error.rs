// src/error.rs

use thiserror::Error;

/// Core error types for Stickerbox
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP failure after retries were exhausted
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// Manifest/config JSON fails the schema or a cross-field invariant
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The pack's crash marker is present, another update owns it
    #[error("Pack `{0}` is already being updated")]
    AlreadyUpdatingError(String),

    /// Slug absent from the hub, or pack absent locally
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Install target directory already present
    #[error("Already exists: {0}")]
    AlreadyExistsError(String),

    /// HTTP client or worker pool construction failure
    #[error("Failed to initialize: {0}")]
    InitError(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using Stickerbox's Error type
pub type Result<T> = std::result::Result<T, Error>;
