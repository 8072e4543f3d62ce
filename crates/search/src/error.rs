use codescope_backend::{BackendError, EmbeddingError};
use codescope_graph::GraphError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("All retrieval channels failed: {0}")]
    AllChannelsFailed(String),

    #[error("Search cancelled")]
    Cancelled,

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<toml::de::Error> for SearchError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
