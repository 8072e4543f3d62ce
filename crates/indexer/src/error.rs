use codescope_backend::{BackendError, EmbeddingError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Failure of one extractor on one file; the file is skipped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Extractor '{language}' panicked on {path}")]
    Panicked { language: String, path: String },
}
