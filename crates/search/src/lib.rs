//! # Codescope Search
//!
//! Graph-aware hybrid retrieval.
//!
//! ## Query flow
//!
//! ```text
//! query + context
//!     │
//!     ├──> IntentClassifier (rule table, optional confidence advisor)
//!     │
//!     ├──> keyword channel ─┐
//!     ├──> vector channel ──┤ (concurrent, deadline-bounded, degrade on failure)
//!     │                     │
//!     │                     └──> RrfFusion (dedupe, 1/(k + rank))
//!     │
//!     └──> IntelligentRanker (semantic, structural, contextual, pattern, importance)
//!            └─ score = weighted sum × intent confidence
//! ```
//!
//! [`ImpactAnalyzer`] answers "what breaks if this changes" from the same
//! graph snapshot.
//!
//! ## Example
//!
//! ```no_run
//! use codescope_backend::{AdapterConfig, HashingEmbedder, IndexSchema, InMemoryBackend, SimilarityAdapter};
//! use codescope_graph::SnapshotStore;
//! use codescope_search::{EngineConfig, HybridSearch};
//! use std::sync::Arc;
//!
//! # async fn run() -> codescope_search::Result<()> {
//! let config = EngineConfig::default();
//! let adapter = SimilarityAdapter::new(
//!     Arc::new(InMemoryBackend::new()),
//!     IndexSchema::new(config.embedding.dimension),
//!     config.adapter.clone(),
//! );
//! adapter.initialize().await?;
//! let search = HybridSearch::new(
//!     Arc::new(adapter),
//!     Arc::new(HashingEmbedder::new(config.embedding.dimension)),
//!     Arc::new(SnapshotStore::default()),
//!     config,
//! );
//! let response = search.search("who calls parse_config", None, 10).await?;
//! for result in response.results {
//!     println!("{} {:.3}", result.id, result.score);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod fusion;
mod hybrid;
mod impact;
mod intent;
mod ranker;

pub use config::{EmbeddingConfig, EngineConfig, FusionConfig, QueryConfig};
pub use error::{Result, SearchError};
pub use fusion::{FusedEntry, RrfFusion, DEFAULT_RRF_K};
pub use hybrid::HybridSearch;
pub use impact::{ImpactAnalyzer, ImpactThresholds, IMPACT_RELATIONS};
pub use intent::{
    extract_keywords, requested_patterns, ConfidenceAdvisor, IntentClassifier, DEFAULT_CONFIDENCE,
    PRECEDENCE,
};
pub use ranker::{
    Candidate, FactorWeights, IntelligentRanker, RankedCandidate, RankingContext, WeightOverride,
    WeightTable,
};
