//! End-to-end rebuilds: extraction, graph build, indexing and publication

use async_trait::async_trait;
use codescope_backend::{
    AdapterConfig, BackendError, ChannelRequest, HashingEmbedder, InMemoryBackend, IndexSchema,
    IndexedDocument, KeywordQuery, KnnQuery, SearchBackend, SearchHit, SimilarityAdapter,
};
use codescope_graph::{
    ExtractedNode, ExtractedRelation, Extraction, NodeType, RelationType, SnapshotStore, SymbolRef,
};
use codescope_indexer::{
    ExtractionError, Extractor, ExtractorRegistry, IndexerError, Ingestor, SourceFile,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Line-oriented toy language:
///
/// ```text
/// class UserService        # node on this line
/// UserService uses Repo    # relation
/// fail                     # extraction error
/// panic                    # extractor panic
/// ```
struct ToyExtractor;

impl Extractor for ToyExtractor {
    fn language(&self) -> &str {
        "toy"
    }

    fn extensions(&self) -> &[&str] {
        &["toy"]
    }

    fn extract(&self, path: &str, content: &str) -> Result<Extraction, ExtractionError> {
        let mut extraction = Extraction::default();
        for (i, line) in content.lines().enumerate() {
            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                ["fail"] => {
                    return Err(ExtractionError::Parse {
                        path: path.to_string(),
                        reason: "bad input".to_string(),
                    })
                }
                ["panic"] => panic!("toy extractor blew up"),
                [kind, name] => {
                    let node_type: NodeType = serde_json::from_value(serde_json::json!(kind))
                        .map_err(|e| ExtractionError::Parse {
                            path: path.to_string(),
                            reason: e.to_string(),
                        })?;
                    extraction
                        .nodes
                        .push(ExtractedNode::new(*name, node_type).lines(i + 1, i + 1));
                }
                [source, relation, target] => {
                    let relation: RelationType =
                        serde_json::from_value(serde_json::json!(relation)).map_err(|e| {
                            ExtractionError::Parse {
                                path: path.to_string(),
                                reason: e.to_string(),
                            }
                        })?;
                    extraction.relations.push(ExtractedRelation::new(
                        SymbolRef::named(*source),
                        relation,
                        SymbolRef::named(*target),
                    ));
                }
                _ => {}
            }
        }
        Ok(extraction)
    }
}

/// In-memory backend whose prune step can be made to fail
#[derive(Default)]
struct PruneFailingBackend {
    inner: InMemoryBackend,
    fail_prune: AtomicBool,
}

#[async_trait]
impl SearchBackend for PruneFailingBackend {
    fn name(&self) -> &str {
        "prune-failing"
    }

    async fn ensure_index(&self, index: &str, schema: &IndexSchema) -> codescope_backend::Result<()> {
        self.inner.ensure_index(index, schema).await
    }

    async fn index_documents(
        &self,
        index: &str,
        documents: Vec<IndexedDocument>,
    ) -> codescope_backend::Result<usize> {
        self.inner.index_documents(index, documents).await
    }

    async fn retain_documents(
        &self,
        index: &str,
        keep: &HashSet<String>,
    ) -> codescope_backend::Result<usize> {
        if self.fail_prune.load(Ordering::SeqCst) {
            return Err(BackendError::Schema("prune rejected".to_string()));
        }
        self.inner.retain_documents(index, keep).await
    }

    async fn get_documents(
        &self,
        index: &str,
        ids: &[String],
    ) -> codescope_backend::Result<Vec<IndexedDocument>> {
        self.inner.get_documents(index, ids).await
    }

    async fn delete_documents(
        &self,
        index: &str,
        ids: &HashSet<String>,
    ) -> codescope_backend::Result<usize> {
        self.inner.delete_documents(index, ids).await
    }

    async fn keyword_query(
        &self,
        index: &str,
        query: &KeywordQuery,
    ) -> codescope_backend::Result<Vec<SearchHit>> {
        self.inner.keyword_query(index, query).await
    }

    async fn knn_query(
        &self,
        index: &str,
        query: &KnnQuery,
    ) -> codescope_backend::Result<Vec<SearchHit>> {
        self.inner.knn_query(index, query).await
    }

    async fn document_count(&self, index: &str) -> codescope_backend::Result<usize> {
        self.inner.document_count(index).await
    }
}

struct Harness {
    ingestor: Ingestor,
    adapter: Arc<SimilarityAdapter>,
    store: Arc<SnapshotStore>,
}

async fn harness(initialize: bool) -> Harness {
    let embedder = Arc::new(HashingEmbedder::new(64));
    let adapter = Arc::new(SimilarityAdapter::new(
        Arc::new(InMemoryBackend::new()),
        IndexSchema::new(64),
        AdapterConfig::default(),
    ));
    if initialize {
        adapter.initialize().await.unwrap();
    }
    let store = Arc::new(SnapshotStore::default());
    let mut registry = ExtractorRegistry::new();
    registry.register(ToyExtractor);
    let ingestor = Ingestor::new(registry, adapter.clone(), embedder, store.clone());
    Harness {
        ingestor,
        adapter,
        store,
    }
}

fn project() -> Vec<SourceFile> {
    vec![
        SourceFile::new(
            "app/service.toy",
            "class UserService\nfunction load_user\nUserService uses UserRepo\nload_user calls UserRepo",
        ),
        SourceFile::new("app/repo.toy", "interface UserRepo\nclass PgUserRepo\nPgUserRepo implements UserRepo"),
        SourceFile::new("README.md", "User management service and repository"),
    ]
}

#[tokio::test]
async fn test_rebuild_publishes_graph_and_documents() -> anyhow::Result<()> {
    let h = harness(true).await;
    let report = h.ingestor.rebuild(project()).await?;

    assert_eq!(report.files_processed, 2);
    assert_eq!(report.files_skipped, 1);
    assert!(report.extraction_errors.is_empty());
    assert_eq!(report.nodes, 4);
    assert_eq!(report.edges, 3);
    // one document per node plus the README
    assert_eq!(report.documents, 5);
    assert_eq!(report.snapshot_version, 1);

    let snapshot = h.store.current();
    assert_eq!(snapshot.version(), 1);
    let repo = snapshot.graph().find_node("app/repo.toy", "UserRepo").unwrap();
    assert_eq!(snapshot.graph().find_dependents(repo, 1).len(), 3);

    let outcome = h
        .adapter
        .keyword_search("UserRepo", &ChannelRequest::new(10))
        .await;
    assert!(outcome.is_ok());
    assert_eq!(outcome.hits[0].id, "app/repo.toy::UserRepo");
    assert_eq!(outcome.hits[0].content, "interface UserRepo");

    let readme = h
        .adapter
        .keyword_search("management", &ChannelRequest::new(10))
        .await;
    assert_eq!(readme.hits[0].id, "README.md");
    Ok(())
}

#[tokio::test]
async fn test_failed_extractions_are_skipped() -> anyhow::Result<()> {
    let h = harness(true).await;
    let mut files = project();
    files.push(SourceFile::new("app/broken.toy", "class Broken\nfail"));
    files.push(SourceFile::new("app/crash.toy", "panic"));

    let report = h.ingestor.rebuild(files).await?;
    assert_eq!(report.files_processed, 2);
    let failed: Vec<&str> = report
        .extraction_errors
        .iter()
        .map(|e| e.path.as_str())
        .collect();
    assert_eq!(failed, vec!["app/broken.toy", "app/crash.toy"]);
    assert_eq!(report.nodes, 4);
    Ok(())
}

#[tokio::test]
async fn test_rebuild_replaces_snapshot_and_prunes_documents() -> anyhow::Result<()> {
    let h = harness(true).await;
    h.ingestor.rebuild(project()).await?;
    let first = h.store.current();

    let smaller = vec![SourceFile::new("app/repo.toy", "interface UserRepo")];
    let report = h.ingestor.rebuild(smaller).await?;
    assert_eq!(report.snapshot_version, 2);
    assert_eq!(report.documents, 1);
    assert_eq!(report.documents_pruned, 4);

    // readers holding the old snapshot are unaffected
    assert_eq!(first.graph().node_count(), 4);
    assert_eq!(h.store.current().graph().node_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_backend_failure_keeps_previous_snapshot() {
    // index never created, so indexing fails before publication
    let h = harness(false).await;
    let err = h.ingestor.rebuild(project()).await.unwrap_err();
    assert!(matches!(err, IndexerError::Backend(_)));
    assert_eq!(h.store.current().version(), 0);
    assert_eq!(h.store.current().graph().node_count(), 0);
}

#[tokio::test]
async fn test_unresolved_relations_are_reported() -> anyhow::Result<()> {
    let h = harness(true).await;
    let files = vec![SourceFile::new(
        "lib.toy",
        "function main\nmain calls missing_helper",
    )];
    let report = h.ingestor.rebuild(files).await?;
    assert_eq!(report.resolution_warnings, 1);
    assert_eq!(report.edges, 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_prune_rolls_back_the_index() -> anyhow::Result<()> {
    let backend = Arc::new(PruneFailingBackend::default());
    let adapter = Arc::new(SimilarityAdapter::new(
        backend.clone(),
        IndexSchema::new(64),
        AdapterConfig::default(),
    ));
    adapter.initialize().await?;
    let store = Arc::new(SnapshotStore::default());
    let mut registry = ExtractorRegistry::new();
    registry.register(ToyExtractor);
    let ingestor = Ingestor::new(
        registry,
        adapter.clone(),
        Arc::new(HashingEmbedder::new(64)),
        store.clone(),
    );
    ingestor.rebuild(project()).await?;
    let count = backend.document_count("codescope").await?;

    backend.fail_prune.store(true, Ordering::SeqCst);
    let mut files: Vec<SourceFile> = project()
        .into_iter()
        .filter(|f| f.path != "README.md")
        .collect();
    files.push(SourceFile::new("README.md", "Audit subsystem notes"));
    files.push(SourceFile::new("app/audit.toy", "class AuditTrail"));
    let err = ingestor.rebuild(files).await.unwrap_err();
    assert!(matches!(err, IndexerError::Backend(BackendError::Schema(_))));
    assert_eq!(store.current().version(), 1);

    // the added document is gone and the overwritten one is restored
    assert_eq!(backend.document_count("codescope").await?, count);
    let audit = adapter
        .keyword_search("AuditTrail", &ChannelRequest::new(10))
        .await;
    assert!(audit.hits.iter().all(|hit| hit.id != "app/audit.toy::AuditTrail"));
    let readme = adapter
        .fetch_documents(&["README.md".to_string()])
        .await?;
    assert_eq!(readme[0].content, "User management service and repository");
    Ok(())
}
