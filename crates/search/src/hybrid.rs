use crate::config::EngineConfig;
use crate::error::{Result, SearchError};
use crate::fusion::{FusedEntry, RrfFusion};
use crate::impact::ImpactAnalyzer;
use crate::intent::{requested_patterns, IntentClassifier};
use crate::ranker::{Candidate, IntelligentRanker, RankedCandidate, RankingContext};
use codescope_backend::{
    Channel, ChannelOutcome, ChannelRequest, Embedder, EmbeddingError, SearchHit,
    SimilarityAdapter,
};
use codescope_graph::{GraphMetadata, GraphSnapshot, NodeId, PatternRegistry, SnapshotStore};
use codescope_protocol::{
    ImpactReport, Intent, QueryContext, RankedResult, ScoreExplanation, SearchResponse, SearchType,
};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Hybrid search: keyword and vector channels fused with RRF, re-ranked by graph signals
pub struct HybridSearch {
    adapter: Arc<SimilarityAdapter>,
    embedder: Arc<dyn Embedder>,
    store: Arc<SnapshotStore>,
    classifier: IntentClassifier,
    fusion: RrfFusion,
    ranker: IntelligentRanker,
    impact: ImpactAnalyzer,
    pattern_tags: Vec<String>,
    config: EngineConfig,
    embeddings: Mutex<LruCache<String, Arc<Vec<f32>>>>,
}

impl HybridSearch {
    #[must_use]
    pub fn new(
        adapter: Arc<SimilarityAdapter>,
        embedder: Arc<dyn Embedder>,
        store: Arc<SnapshotStore>,
        config: EngineConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.embedding.cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            adapter,
            embedder,
            store,
            classifier: IntentClassifier::new(),
            fusion: RrfFusion::new(config.fusion.k),
            ranker: IntelligentRanker::new(config.ranking.clone()),
            impact: ImpactAnalyzer::new(config.impact.clone()),
            pattern_tags: PatternRegistry::with_default_rules().known_tags(),
            config,
            embeddings: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Replace the intent classifier (e.g. one with a confidence advisor)
    #[must_use]
    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Pattern tags queries may ask for; match the registry used at build time
    #[must_use]
    pub fn with_pattern_tags(mut self, tags: Vec<String>) -> Self {
        self.pattern_tags = tags;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot currently served to queries
    #[must_use]
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.store.current()
    }

    /// Search with graph-aware ranking
    pub async fn search(
        &self,
        query: &str,
        context: Option<&QueryContext>,
        limit: usize,
    ) -> Result<SearchResponse> {
        self.search_with_cancel(query, context, limit, &CancellationToken::new())
            .await
    }

    /// Search that stops with [`SearchError::Cancelled`] once `cancel` fires
    pub async fn search_with_cancel(
        &self,
        query: &str,
        context: Option<&QueryContext>,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse> {
        let query = self.validate(query, limit)?;
        let context = context.cloned().unwrap_or_default();

        let intent = self.classifier.classify(query, &context);
        log::debug!(
            "Hybrid search: query='{query}', intent={} ({:.2}), limit={limit}",
            intent.intent_type,
            intent.confidence
        );

        // one snapshot for the whole query
        let snapshot = self.store.current();

        let pool = limit.saturating_mul(self.config.fusion.candidate_multiplier.max(1));
        let started = Instant::now();
        let deadline = started + self.config.adapter.call_timeout();
        let request = ChannelRequest::new(pool).deadline(deadline);

        let channels = async {
            let keyword = self.adapter.keyword_search(query, &request);
            // the embedding counts against the vector channel's deadline
            let vector = async {
                let embed_and_search = async {
                    match self.query_embedding(query).await {
                        Ok(embedding) => self.adapter.vector_search(&embedding, &request).await,
                        Err(err) => {
                            log::warn!("Query embedding failed: {err}");
                            ChannelOutcome::unavailable(Channel::Vector, err.to_string())
                        }
                    }
                };
                match tokio::time::timeout_at(deadline, embed_and_search).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        log::warn!("vector channel timed out after {:?}", started.elapsed());
                        ChannelOutcome::timed_out(Channel::Vector, started)
                    }
                }
            };
            tokio::join!(keyword, vector)
        };

        let (keyword, vector) = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                log::debug!("Search cancelled: query='{query}'");
                return Err(SearchError::Cancelled);
            }
            outcomes = channels => outcomes,
        };

        let failed_channels: Vec<String> = [&keyword, &vector]
            .into_iter()
            .filter(|outcome| !outcome.is_ok())
            .map(|outcome| outcome.channel.as_str().to_string())
            .collect();
        if failed_channels.len() == 2 {
            return Err(SearchError::AllChannelsFailed(format!(
                "keyword: {:?}, vector: {:?}",
                keyword.status, vector.status
            )));
        }
        let degraded = !failed_channels.is_empty();
        if degraded {
            log::warn!("Degraded search, failed channels: {failed_channels:?}");
        }

        log::debug!(
            "Channels: keyword={} hits ({:?}), vector={} hits ({:?})",
            keyword.hits.len(),
            keyword.elapsed,
            vector.hits.len(),
            vector.elapsed
        );

        let fused = self.fusion.fuse(&[hit_ids(&keyword.hits), hit_ids(&vector.hits)]);
        let hits = index_hits(&keyword.hits, &vector.hits);
        let channels_by_id: HashMap<&str, &FusedEntry> =
            fused.iter().map(|entry| (entry.id.as_str(), entry)).collect();

        let candidates: Vec<Candidate> = fused
            .iter()
            .map(|entry| to_candidate(entry, &snapshot, hits.get(entry.id.as_str()).copied()))
            .collect();

        let requested = requested_patterns(&intent, &self.pattern_tags);
        let ranking = RankingContext {
            intent: &intent,
            query_context: &context,
            requested_patterns: &requested,
            snapshot: &snapshot,
        };
        let mut ranked = self.ranker.rank(candidates, &ranking);
        ranked.truncate(limit);

        let results = ranked
            .into_iter()
            .filter_map(|ranked| {
                let entry = channels_by_id.get(ranked.candidate.id.as_str())?;
                Some(self.to_result(
                    ranked,
                    entry,
                    hits.get(entry.id.as_str()).copied(),
                    &intent,
                    &snapshot,
                    &failed_channels,
                ))
            })
            .collect();

        Ok(SearchResponse {
            results,
            intent,
            degraded,
            snapshot_version: snapshot.version(),
        })
    }

    /// Blast radius of changing `node` in the current snapshot
    pub fn analyze_impact(&self, node: NodeId, max_distance: usize) -> Result<ImpactReport> {
        let snapshot = self.store.current();
        Ok(self.impact.analyze(&snapshot, node, max_distance)?)
    }

    /// Impact analysis addressed by symbol name
    pub fn analyze_symbol_impact(
        &self,
        name: &str,
        file_path: Option<&str>,
        max_distance: usize,
    ) -> Result<ImpactReport> {
        let snapshot = self.store.current();
        let node = snapshot.resolve_symbol(name, file_path)?;
        Ok(self.impact.analyze(&snapshot, node, max_distance)?)
    }

    /// Graph metadata of `node`, bounded by the configured hop count
    #[must_use]
    pub fn metadata(&self, node: NodeId) -> Option<GraphMetadata> {
        self.store
            .current()
            .metadata(node, self.config.query.metadata_hops)
    }

    fn validate<'q>(&self, query: &'q str, limit: usize) -> Result<&'q str> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(SearchError::InvalidQuery("query is empty".to_string()));
        }
        let max_length = self.config.query.max_length;
        if trimmed.chars().count() > max_length {
            return Err(SearchError::InvalidQuery(format!(
                "query exceeds {max_length} characters"
            )));
        }
        if !trimmed.chars().any(char::is_alphanumeric) {
            return Err(SearchError::InvalidQuery(
                "query has no searchable terms".to_string(),
            ));
        }
        if limit == 0 {
            return Err(SearchError::InvalidQuery(
                "limit must be positive".to_string(),
            ));
        }
        Ok(trimmed)
    }

    async fn query_embedding(&self, query: &str) -> Result<Arc<Vec<f32>>> {
        if let Some(cached) = self.embeddings.lock().await.get(query) {
            return Ok(Arc::clone(cached));
        }

        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        let embedding = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|err| EmbeddingError::Provider(err.to_string()))??;

        let embedding = Arc::new(embedding);
        self.embeddings
            .lock()
            .await
            .put(query.to_string(), Arc::clone(&embedding));
        Ok(embedding)
    }

    fn to_result(
        &self,
        ranked: RankedCandidate,
        entry: &FusedEntry,
        hit: Option<&SearchHit>,
        intent: &Intent,
        snapshot: &GraphSnapshot,
        failed_channels: &[String],
    ) -> RankedResult {
        let keyword_rank = entry.ranks.first().copied().flatten();
        let vector_rank = entry.ranks.get(1).copied().flatten();
        let search_type = match (keyword_rank, vector_rank) {
            (Some(_), Some(_)) => SearchType::Hybrid,
            (None, Some(_)) => SearchType::Vector,
            _ => SearchType::Keyword,
        };

        let mut metadata = hit.map(|h| h.metadata.clone()).unwrap_or_default();
        if let Some(graph) = ranked
            .candidate
            .node_id
            .and_then(|node| snapshot.metadata(node, self.config.query.metadata_hops))
            .and_then(|meta| serde_json::to_value(meta).ok())
        {
            metadata.insert("graph".to_string(), graph);
        }

        RankedResult {
            id: ranked.candidate.id,
            node_id: ranked.candidate.node_id,
            score: ranked.score,
            content: hit.map(|h| h.content.clone()).unwrap_or_default(),
            metadata,
            search_type,
            explanation: ScoreExplanation {
                keyword_rank,
                vector_rank,
                fused_score: entry.score,
                factors: ranked.factors,
                weighted_sum: ranked.weighted_sum,
                intent_confidence: intent.confidence,
                degraded: !failed_channels.is_empty(),
                failed_channels: failed_channels.to_vec(),
            },
        }
    }
}

fn hit_ids(hits: &[SearchHit]) -> Vec<&str> {
    hits.iter().map(|hit| hit.id.as_str()).collect()
}

/// First hit per id; keyword hits win over vector hits
fn index_hits<'a>(keyword: &'a [SearchHit], vector: &'a [SearchHit]) -> HashMap<&'a str, &'a SearchHit> {
    let mut hits: HashMap<&str, &SearchHit> = HashMap::new();
    for hit in keyword.iter().chain(vector) {
        hits.entry(hit.id.as_str()).or_insert(hit);
    }
    hits
}

fn to_candidate(entry: &FusedEntry, snapshot: &GraphSnapshot, hit: Option<&SearchHit>) -> Candidate {
    let node_id = snapshot.graph().find_by_document_id(&entry.id);
    let file_path = node_id
        .and_then(|id| snapshot.graph().node(id))
        .map(|node| node.file_path.clone())
        .or_else(|| {
            hit.and_then(|h| h.metadata.get("file_path"))
                .and_then(|value| value.as_str())
                .map(str::to_string)
        });
    Candidate {
        id: entry.id.clone(),
        fused_score: entry.score,
        node_id,
        file_path,
    }
}
