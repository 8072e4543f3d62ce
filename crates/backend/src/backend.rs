use crate::error::Result;
use crate::types::{IndexSchema, IndexedDocument, KeywordQuery, KnnQuery, SearchHit};
use async_trait::async_trait;
use std::collections::HashSet;

/// Backing search engine.
///
/// Implementations own the physical index; callers talk to it through
/// [`crate::SimilarityAdapter`], which adds retries, deadlines and the
/// degrade-to-empty policy.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Create `index` with `schema`, or verify an existing index matches it
    async fn ensure_index(&self, index: &str, schema: &IndexSchema) -> Result<()>;

    /// Upsert documents by id; returns the number written
    async fn index_documents(&self, index: &str, documents: Vec<IndexedDocument>)
        -> Result<usize>;

    /// Delete every document whose id is not in `keep`; returns the number removed
    async fn retain_documents(&self, index: &str, keep: &HashSet<String>) -> Result<usize>;

    /// Stored documents among `ids`; unknown ids are skipped
    async fn get_documents(&self, index: &str, ids: &[String]) -> Result<Vec<IndexedDocument>>;

    /// Delete documents by id; returns the number removed
    async fn delete_documents(&self, index: &str, ids: &HashSet<String>) -> Result<usize>;

    async fn keyword_query(&self, index: &str, query: &KeywordQuery) -> Result<Vec<SearchHit>>;

    async fn knn_query(&self, index: &str, query: &KnnQuery) -> Result<Vec<SearchHit>>;

    async fn document_count(&self, index: &str) -> Result<usize>;
}
