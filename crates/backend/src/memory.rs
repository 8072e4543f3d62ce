use crate::analyzer::analyze;
use crate::backend::SearchBackend;
use crate::error::{BackendError, Result};
use crate::types::{
    Field, IndexSchema, IndexedDocument, KeywordQuery, KnnQuery, SearchFilter, SearchHit,
};
use async_trait::async_trait;
use codescope_protocol::SearchType;
use ndarray::Array1;
use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32String};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

/// Analyzed form of one document
struct StoredDocument {
    document: IndexedDocument,
    content_tokens: Vec<Utf32String>,
    identifier_tokens: Vec<Utf32String>,
    path_tokens: Vec<Utf32String>,
    /// Unit-length embedding
    vector: Option<Array1<f32>>,
}

impl StoredDocument {
    fn new(document: IndexedDocument) -> Self {
        let tokens = |text: &str| -> Vec<Utf32String> {
            analyze(text)
                .into_iter()
                .map(|t| Utf32String::from(t.as_str()))
                .collect()
        };
        let vector = document
            .embedding
            .as_ref()
            .and_then(|values| unit_vector(values));
        Self {
            content_tokens: tokens(&document.content),
            identifier_tokens: tokens(&document.identifier),
            path_tokens: tokens(&document.path),
            vector,
            document,
        }
    }

    fn tokens(&self, field: Field) -> &[Utf32String] {
        match field {
            Field::Content => &self.content_tokens,
            Field::Identifier => &self.identifier_tokens,
            Field::Path => &self.path_tokens,
        }
    }

    fn hit(&self, score: f32, search_type: SearchType) -> SearchHit {
        SearchHit {
            id: self.document.id.clone(),
            score,
            content: self.document.content.clone(),
            metadata: self.document.metadata.clone(),
            search_type,
        }
    }
}

struct MemoryIndex {
    schema: IndexSchema,
    documents: BTreeMap<String, StoredDocument>,
}

impl MemoryIndex {
    fn candidates<'a>(
        &'a self,
        filter: Option<&'a SearchFilter>,
    ) -> impl Iterator<Item = &'a StoredDocument> + 'a {
        self.documents
            .values()
            .filter(move |doc| filter.map_or(true, |f| f.matches(&doc.document.metadata)))
    }
}

/// Bundled backend keeping every index in memory.
///
/// Keyword scoring fuzzy-matches each analyzed query term against the
/// analyzed tokens of every boosted field; kNN is exact cosine similarity.
#[derive(Default)]
pub struct InMemoryBackend {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ensure_index(&self, index: &str, schema: &IndexSchema) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        if let Some(existing) = indexes.get(index) {
            if !existing.schema.is_compatible(schema) {
                return Err(BackendError::dimension_mismatch(
                    schema.dimension,
                    existing.schema.dimension,
                ));
            }
            log::debug!("Index '{index}' already exists");
            return Ok(());
        }
        indexes.insert(
            index.to_string(),
            MemoryIndex {
                schema: schema.clone(),
                documents: BTreeMap::new(),
            },
        );
        log::info!("Created index '{index}' (dimension {})", schema.dimension);
        Ok(())
    }

    async fn index_documents(
        &self,
        index: &str,
        documents: Vec<IndexedDocument>,
    ) -> Result<usize> {
        let mut indexes = self.indexes.write().await;
        let target = indexes
            .get_mut(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;

        for document in &documents {
            if document.id.is_empty() {
                return Err(BackendError::InvalidDocument {
                    id: document.id.clone(),
                    reason: "empty id".to_string(),
                });
            }
            if let Some(embedding) = &document.embedding {
                if embedding.len() != target.schema.dimension {
                    return Err(BackendError::dimension_mismatch(
                        target.schema.dimension,
                        embedding.len(),
                    ));
                }
            }
        }

        let written = documents.len();
        for document in documents {
            target
                .documents
                .insert(document.id.clone(), StoredDocument::new(document));
        }
        log::debug!("Indexed {written} documents into '{index}'");
        Ok(written)
    }

    async fn retain_documents(&self, index: &str, keep: &HashSet<String>) -> Result<usize> {
        let mut indexes = self.indexes.write().await;
        let target = indexes
            .get_mut(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;
        let before = target.documents.len();
        target.documents.retain(|id, _| keep.contains(id));
        Ok(before - target.documents.len())
    }

    async fn get_documents(&self, index: &str, ids: &[String]) -> Result<Vec<IndexedDocument>> {
        let indexes = self.indexes.read().await;
        let source = indexes
            .get(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;
        Ok(ids
            .iter()
            .filter_map(|id| source.documents.get(id))
            .map(|stored| stored.document.clone())
            .collect())
    }

    async fn delete_documents(&self, index: &str, ids: &HashSet<String>) -> Result<usize> {
        let mut indexes = self.indexes.write().await;
        let target = indexes
            .get_mut(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;
        let before = target.documents.len();
        target.documents.retain(|id, _| !ids.contains(id));
        Ok(before - target.documents.len())
    }

    async fn keyword_query(&self, index: &str, query: &KeywordQuery) -> Result<Vec<SearchHit>> {
        let indexes = self.indexes.read().await;
        let source = indexes
            .get(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;

        let terms = analyze(&query.text);
        if terms.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let mut matcher = Matcher::new(Config::DEFAULT);
        let patterns: Vec<(Pattern, f32)> = terms
            .iter()
            .map(|term| {
                let pattern = Pattern::parse(term, CaseMatching::Ignore, Normalization::Smart);
                let own = Utf32String::from(term.as_str());
                #[allow(clippy::cast_precision_loss)]
                let self_score = pattern
                    .score(own.slice(..), &mut matcher)
                    .unwrap_or(1)
                    .max(1) as f32;
                (pattern, self_score)
            })
            .collect();

        let mut hits: Vec<SearchHit> = source
            .candidates(query.filter.as_ref())
            .filter_map(|doc| {
                let mut total = 0.0f32;
                for (pattern, self_score) in &patterns {
                    for boost in &query.fields {
                        let best = doc
                            .tokens(boost.field)
                            .iter()
                            .filter_map(|token| pattern.score(token.slice(..), &mut matcher))
                            .max();
                        if let Some(best) = best {
                            #[allow(clippy::cast_precision_loss)]
                            let ratio = (best as f32 / self_score).min(1.0);
                            total += boost.boost * ratio;
                        }
                    }
                }
                (total > 0.0).then(|| doc.hit(total, SearchType::Keyword))
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn knn_query(&self, index: &str, query: &KnnQuery) -> Result<Vec<SearchHit>> {
        let indexes = self.indexes.read().await;
        let source = indexes
            .get(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;

        if query.vector.len() != source.schema.dimension {
            return Err(BackendError::dimension_mismatch(
                source.schema.dimension,
                query.vector.len(),
            ));
        }
        let Some(needle) = unit_vector(&query.vector) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = source
            .candidates(query.filter.as_ref())
            .filter_map(|doc| {
                let vector = doc.vector.as_ref()?;
                Some(doc.hit(needle.dot(vector), SearchType::Vector))
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn document_count(&self, index: &str) -> Result<usize> {
        let indexes = self.indexes.read().await;
        indexes
            .get(index)
            .map(|i| i.documents.len())
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))
    }
}

fn unit_vector(values: &[f32]) -> Option<Array1<f32>> {
    let vector = Array1::from(values.to_vec());
    let norm = vector.dot(&vector).sqrt();
    (norm > f32::EPSILON).then(|| vector / norm)
}

/// Score descending, id ascending
fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const INDEX: &str = "code";

    async fn seeded() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend
            .ensure_index(INDEX, &IndexSchema::new(3))
            .await
            .unwrap();
        backend
            .index_documents(
                INDEX,
                vec![
                    IndexedDocument::new("src/config.rs::parse_config", "fn parse_config(path)")
                        .identifier("parse_config")
                        .path("src/config.rs")
                        .meta("language", "rust")
                        .embedding(vec![1.0, 0.0, 0.0]),
                    IndexedDocument::new("src/http.rs::send_request", "fn send_request(url)")
                        .identifier("send_request")
                        .path("src/http.rs")
                        .meta("language", "rust")
                        .embedding(vec![0.0, 1.0, 0.0]),
                    IndexedDocument::new("web/config.ts::loadConfig", "function loadConfig()")
                        .identifier("loadConfig")
                        .path("web/config.ts")
                        .meta("language", "typescript")
                        .embedding(vec![0.8, 0.6, 0.0]),
                ],
            )
            .await
            .unwrap();
        backend
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[tokio::test]
    async fn ensure_index_is_idempotent_and_checks_dimension() {
        let backend = InMemoryBackend::new();
        backend.ensure_index(INDEX, &IndexSchema::new(3)).await.unwrap();
        backend.ensure_index(INDEX, &IndexSchema::new(3)).await.unwrap();
        let err = backend
            .ensure_index(INDEX, &IndexSchema::new(4))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Schema(_)));
    }

    #[tokio::test]
    async fn keyword_query_matches_analyzed_identifiers() {
        let backend = seeded().await;
        let hits = backend
            .keyword_query(INDEX, &KeywordQuery::multi_field("config parsing", 10))
            .await
            .unwrap();
        assert_eq!(hits[0].id, "src/config.rs::parse_config");
        assert!(ids(&hits).contains(&"web/config.ts::loadConfig"));
        assert!(!ids(&hits).contains(&"src/http.rs::send_request"));
        assert!(hits.iter().all(|h| h.search_type == SearchType::Keyword));
    }

    #[tokio::test]
    async fn keyword_query_honours_filter_and_limit() {
        let backend = seeded().await;
        let mut query = KeywordQuery::multi_field("config", 10);
        query.filter = Some(SearchFilter::eq("language", "typescript"));
        let hits = backend.keyword_query(INDEX, &query).await.unwrap();
        assert_eq!(ids(&hits), vec!["web/config.ts::loadConfig"]);

        let limited = backend
            .keyword_query(INDEX, &KeywordQuery::multi_field("config", 1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn knn_orders_by_cosine() {
        let backend = seeded().await;
        let hits = backend
            .knn_query(
                INDEX,
                &KnnQuery {
                    vector: vec![2.0, 0.0, 0.0],
                    limit: 2,
                    filter: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            ids(&hits),
            vec!["src/config.rs::parse_config", "web/config.ts::loadConfig"]
        );
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn rejects_wrong_dimensions_and_missing_index() {
        let backend = seeded().await;
        let err = backend
            .index_documents(
                INDEX,
                vec![IndexedDocument::new("x", "y").embedding(vec![1.0])],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Schema(_)));
        assert_eq!(backend.document_count(INDEX).await.unwrap(), 3);

        let missing = backend
            .keyword_query("other", &KeywordQuery::multi_field("config", 5))
            .await
            .unwrap_err();
        assert_eq!(missing, BackendError::IndexNotFound("other".to_string()));
    }

    #[tokio::test]
    async fn retain_prunes_stale_documents() {
        let backend = seeded().await;
        let keep: HashSet<String> = ["src/http.rs::send_request".to_string()].into();
        assert_eq!(backend.retain_documents(INDEX, &keep).await.unwrap(), 2);
        assert_eq!(backend.document_count(INDEX).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_and_delete_by_id() {
        let backend = seeded().await;
        let ids = vec![
            "src/http.rs::send_request".to_string(),
            "missing".to_string(),
        ];
        let found = backend.get_documents(INDEX, &ids).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "src/http.rs::send_request");

        let doomed: HashSet<String> = ids.into_iter().collect();
        assert_eq!(backend.delete_documents(INDEX, &doomed).await.unwrap(), 1);
        assert_eq!(backend.document_count(INDEX).await.unwrap(), 2);
    }
}
