//! # Codescope Backend
//!
//! The two retrieval channels of hybrid search and the seam to the backing
//! search engine.
//!
//! - [`SearchBackend`]: keyword query, kNN query, index management
//! - [`InMemoryBackend`]: bundled engine (fuzzy keyword matching, exact cosine kNN)
//! - [`SimilarityAdapter`]: retries, deadlines, degrade-to-empty channel outcomes
//! - [`Embedder`]: text embedding provider; [`HashingEmbedder`] for offline use

mod adapter;
mod analyzer;
mod backend;
mod embedding;
mod error;
mod memory;
mod types;

pub use adapter::{
    AdapterConfig, Channel, ChannelOutcome, ChannelRequest, ChannelStatus, SimilarityAdapter,
};
pub use analyzer::analyze;
pub use backend::SearchBackend;
pub use embedding::{Embedder, HashingEmbedder};
pub use error::{BackendError, EmbeddingError, Result};
pub use memory::InMemoryBackend;
pub use types::{
    Field, FieldBoost, IndexSchema, IndexedDocument, KeywordQuery, KnnQuery, Metadata,
    SearchFilter, SearchHit, Similarity, DEFAULT_FIELD_BOOSTS,
};
