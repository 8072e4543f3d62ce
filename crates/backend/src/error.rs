use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Invalid document {id}: {reason}")]
    InvalidDocument { id: String, reason: String },
}

impl BackendError {
    /// Transient failures worth another attempt
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    pub fn dimension_mismatch(expected: usize, found: usize) -> Self {
        Self::Schema(format!(
            "vector dimension mismatch: expected {expected}, found {found}"
        ))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("Nothing to embed")]
    EmptyInput,

    #[error("Embedding provider failed: {0}")]
    Provider(String),
}
