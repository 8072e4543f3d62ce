//! # Codescope Indexer
//!
//! Turns source files into a published graph snapshot and a populated
//! search index.
//!
//! ## Pipeline
//!
//! ```text
//! SourceFile[]
//!     │
//!     ├──> Extractors (blocking pool, batches of 16)
//!     │      └─> {nodes, relations} per file
//!     │
//!     ├──> Graph builder + metrics
//!     │      └─> GraphSnapshot (next version)
//!     │
//!     ├──> Similarity backend (one document per entity, embedded)
//!     │
//!     └──> SnapshotStore::publish (atomic swap)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use codescope_backend::{
//!     AdapterConfig, HashingEmbedder, InMemoryBackend, IndexSchema, SimilarityAdapter,
//! };
//! use codescope_graph::SnapshotStore;
//! use codescope_indexer::{ExtractorRegistry, Ingestor, JsonExtractor, SourceFile};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let embedder = Arc::new(HashingEmbedder::default());
//!     let adapter = Arc::new(SimilarityAdapter::new(
//!         Arc::new(InMemoryBackend::new()),
//!         IndexSchema::new(HashingEmbedder::DEFAULT_DIMENSION),
//!         AdapterConfig::default(),
//!     ));
//!     adapter.initialize().await?;
//!
//!     let mut registry = ExtractorRegistry::new();
//!     registry.register(JsonExtractor);
//!     let ingestor = Ingestor::new(registry, adapter, embedder, Arc::new(SnapshotStore::default()));
//!
//!     let report = ingestor
//!         .rebuild(vec![SourceFile::new("README.md", "# project")])
//!         .await?;
//!     println!("Published v{} with {} nodes", report.snapshot_version, report.nodes);
//!     Ok(())
//! }
//! ```

mod error;
mod extractor;
mod ingestor;
mod report;
mod source;

pub use error::{ExtractionError, IndexerError, Result};
pub use extractor::{Extractor, ExtractorRegistry, JsonExtractor};
pub use ingestor::{IngestConfig, Ingestor, UNKNOWN_LANGUAGE};
pub use report::{FileError, IngestReport};
pub use source::SourceFile;
