use crate::error::{ExtractionError, IndexerError, Result};
use crate::extractor::{Extractor, ExtractorRegistry};
use crate::report::IngestReport;
use crate::source::SourceFile;
use codescope_backend::{
    BackendError, Embedder, EmbeddingError, IndexedDocument, SimilarityAdapter,
};
use codescope_graph::{
    Extraction, GraphBuilder, GraphSnapshot, MetricsConfig, PatternRegistry, SnapshotStore,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Language recorded for files indexed without an extractor
pub const UNKNOWN_LANGUAGE: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Extraction tasks in flight per batch
    pub max_concurrent: usize,
    /// Longest document body sent to the backend, in characters
    pub max_document_chars: usize,
    pub metrics: MetricsConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 16,
            max_document_chars: 8_000,
            metrics: MetricsConfig::default(),
        }
    }
}

enum FileOutcome {
    Extracted {
        file: SourceFile,
        language: String,
        extraction: Extraction,
    },
    Unsupported(SourceFile),
    Failed {
        path: String,
        error: ExtractionError,
    },
}

impl FileOutcome {
    fn path(&self) -> &str {
        match self {
            Self::Extracted { file, .. } | Self::Unsupported(file) => &file.path,
            Self::Failed { path, .. } => path,
        }
    }
}

/// Full rebuilds of the graph snapshot and the search index.
///
/// A rebuild extracts every file, builds the graph and its metrics, indexes
/// one document per entity, and only then publishes the new snapshot. Any
/// failure before publication leaves the previous snapshot serving.
pub struct Ingestor {
    registry: Arc<ExtractorRegistry>,
    patterns: Arc<PatternRegistry>,
    adapter: Arc<SimilarityAdapter>,
    embedder: Arc<dyn Embedder>,
    store: Arc<SnapshotStore>,
    config: IngestConfig,
    rebuild_lock: Mutex<()>,
}

impl Ingestor {
    pub fn new(
        registry: ExtractorRegistry,
        adapter: Arc<SimilarityAdapter>,
        embedder: Arc<dyn Embedder>,
        store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            patterns: Arc::new(PatternRegistry::with_default_rules()),
            adapter,
            embedder,
            store,
            config: IngestConfig::default(),
            rebuild_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_patterns(mut self, patterns: PatternRegistry) -> Self {
        self.patterns = Arc::new(patterns);
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Rebuild everything from `files` and publish the result
    pub async fn rebuild(&self, files: Vec<SourceFile>) -> Result<IngestReport> {
        let _guard = self.rebuild_lock.lock().await;
        let start = Instant::now();
        let mut report = IngestReport::new();
        log::info!("Rebuilding index from {} files", files.len());

        // 1. Extract (parallel), then order by path for a deterministic build
        let mut outcomes = self.extract_parallel(files).await;
        outcomes.sort_by(|a, b| a.path().cmp(b.path()));

        // 2. Build the graph
        let mut builder = GraphBuilder::new();
        let mut sources: HashMap<String, (SourceFile, String)> = HashMap::new();
        let mut whole_files = Vec::new();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Extracted {
                    file,
                    language,
                    extraction,
                } => {
                    report.files_processed += 1;
                    builder.add_file(&file.path, extraction);
                    sources.insert(file.path.clone(), (file, language));
                }
                FileOutcome::Unsupported(file) => {
                    report.files_skipped += 1;
                    whole_files.push(file);
                }
                FileOutcome::Failed { path, error } => {
                    log::warn!("Skipping {path}: {error}");
                    report.add_error(path, error);
                }
            }
        }
        let built = builder.finish();
        report.resolution_warnings = built.warnings.len();

        // 3. Metrics and pattern tags on the blocking pool
        let version = self.store.next_version();
        let metrics = self.config.metrics.clone();
        let patterns = Arc::clone(&self.patterns);
        let graph = built.graph;
        let snapshot = tokio::task::spawn_blocking(move || {
            GraphSnapshot::build(graph, &metrics, &patterns, version)
        })
        .await
        .map_err(|e| IndexerError::TaskFailed(format!("graph metrics: {e}")))?;

        // 4. Index documents, then drop those of vanished entities.
        // The index serves the old snapshot until publication, so a failed
        // write is rolled back to the documents it overwrote.
        let documents = self.build_documents(&snapshot, &sources, whole_files).await?;
        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        let previous = self.adapter.fetch_documents(&ids).await?;
        let keep: HashSet<String> = ids.into_iter().collect();
        match self.write_documents(documents, &keep).await {
            Ok((written, pruned)) => {
                report.documents = written;
                report.documents_pruned = pruned;
            }
            Err(err) => {
                log::error!("Rebuild v{version} failed while indexing: {err}");
                self.roll_back(&keep, previous).await;
                return Err(err.into());
            }
        }

        // 5. Publish
        report.nodes = snapshot.graph().node_count();
        report.edges = snapshot.graph().edge_count();
        report.snapshot_version = version;
        self.store.publish(snapshot);

        #[allow(clippy::cast_possible_truncation)]
        {
            report.time_ms = (start.elapsed().as_millis() as u64).max(1);
        }
        log::info!(
            "Rebuild v{version} done: {} files, {} skipped, {} errors, {} nodes, {} edges, {} documents",
            report.files_processed,
            report.files_skipped,
            report.extraction_errors.len(),
            report.nodes,
            report.edges,
            report.documents
        );
        Ok(report)
    }

    async fn write_documents(
        &self,
        documents: Vec<IndexedDocument>,
        keep: &HashSet<String>,
    ) -> std::result::Result<(usize, usize), BackendError> {
        let written = self.adapter.index_documents(documents).await?;
        let pruned = self.adapter.retain_documents(keep).await?;
        Ok((written, pruned))
    }

    /// Restore the documents a failed write replaced and drop the ones it added
    async fn roll_back(&self, written: &HashSet<String>, previous: Vec<IndexedDocument>) {
        let existed: HashSet<&str> = previous.iter().map(|d| d.id.as_str()).collect();
        let added: HashSet<String> = written
            .iter()
            .filter(|id| !existed.contains(id.as_str()))
            .cloned()
            .collect();

        if let Err(err) = self.adapter.delete_documents(&added).await {
            log::error!("Rollback could not delete {} new documents: {err}", added.len());
        }
        let restored = previous.len();
        if let Err(err) = self.adapter.index_documents(previous).await {
            log::error!("Rollback could not restore {restored} documents: {err}");
        } else {
            log::info!(
                "Rolled back index: {} added removed, {restored} restored",
                added.len()
            );
        }
    }

    fn extractor_for(&self, file: &SourceFile) -> Option<Arc<dyn Extractor>> {
        if let Some(language) = &file.language {
            if let Some(extractor) = self.registry.for_language(language) {
                return Some(extractor);
            }
            log::debug!("No extractor for language '{language}', trying {}", file.path);
        }
        self.registry.for_path(&file.path)
    }

    /// Run extractors on the blocking pool, `max_concurrent` files at a time
    async fn extract_parallel(&self, files: Vec<SourceFile>) -> Vec<FileOutcome> {
        let batch_size = self.config.max_concurrent.max(1);
        let mut outcomes = Vec::with_capacity(files.len());
        let mut pending = files.into_iter().peekable();

        while pending.peek().is_some() {
            let mut tasks = Vec::with_capacity(batch_size);
            for file in pending.by_ref().take(batch_size) {
                let Some(extractor) = self.extractor_for(&file) else {
                    outcomes.push(FileOutcome::Unsupported(file));
                    continue;
                };
                let path = file.path.clone();
                let language = extractor.language().to_string();
                let task = tokio::task::spawn_blocking(move || {
                    let result = extractor.extract(&file.path, &file.content);
                    (file, result)
                });
                tasks.push((path, language, task));
            }

            for (path, language, task) in tasks {
                let outcome = match task.await {
                    Ok((file, Ok(extraction))) => FileOutcome::Extracted {
                        file,
                        language,
                        extraction,
                    },
                    Ok((_, Err(error))) => FileOutcome::Failed { path, error },
                    Err(join_error) => {
                        log::error!("Extractor '{language}' failed on {path}: {join_error}");
                        FileOutcome::Failed {
                            error: ExtractionError::Panicked {
                                language,
                                path: path.clone(),
                            },
                            path,
                        }
                    }
                };
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    async fn build_documents(
        &self,
        snapshot: &GraphSnapshot,
        sources: &HashMap<String, (SourceFile, String)>,
        whole_files: Vec<SourceFile>,
    ) -> Result<Vec<IndexedDocument>> {
        let max_chars = self.config.max_document_chars;
        let mut documents = Vec::with_capacity(snapshot.graph().node_count() + whole_files.len());

        for node in snapshot.graph().nodes() {
            let source = sources.get(&node.file_path);
            let content = source
                .and_then(|(file, _)| file.excerpt(node.lines))
                .or_else(|| node.signature.clone())
                .unwrap_or_else(|| node.name.clone());
            let language = source.map_or(UNKNOWN_LANGUAGE, |(_, language)| language.as_str());

            documents.push(
                IndexedDocument::new(node.document_id(), truncate_chars(&content, max_chars))
                    .identifier(node.name.as_str())
                    .path(node.file_path.as_str())
                    .meta("node_id", node.id.0)
                    .meta("file_path", node.file_path.as_str())
                    .meta("node_type", node.node_type.as_str())
                    .meta("language", language)
                    .meta("start_line", node.lines.start)
                    .meta("end_line", node.lines.end),
            );
        }

        for file in whole_files {
            let stem = file
                .path
                .rsplit('/')
                .next()
                .and_then(|name| name.split('.').next())
                .unwrap_or_default()
                .to_string();
            documents.push(
                IndexedDocument::new(file.path.as_str(), truncate_chars(&file.content, max_chars))
                    .identifier(stem)
                    .path(file.path.as_str())
                    .meta("file_path", file.path.as_str())
                    .meta("node_type", "file")
                    .meta("language", UNKNOWN_LANGUAGE),
            );
        }

        self.attach_embeddings(&mut documents).await?;
        Ok(documents)
    }

    /// Embed every document on the blocking pool; texts with nothing to
    /// embed stay keyword-only
    async fn attach_embeddings(&self, documents: &mut [IndexedDocument]) -> Result<()> {
        let texts: Vec<String> = documents
            .iter()
            .map(|d| format!("{}\n{}", d.identifier, d.content))
            .collect();
        let embedder = Arc::clone(&self.embedder);
        let embeddings = tokio::task::spawn_blocking(move || {
            texts
                .iter()
                .map(|text| match embedder.embed(text) {
                    Ok(vector) => Ok(Some(vector)),
                    Err(EmbeddingError::EmptyInput) => Ok(None),
                    Err(e) => Err(e),
                })
                .collect::<std::result::Result<Vec<_>, EmbeddingError>>()
        })
        .await
        .map_err(|e| IndexerError::TaskFailed(format!("embedding: {e}")))??;

        for (document, embedding) in documents.iter_mut().zip(embeddings) {
            document.embedding = embedding;
        }
        Ok(())
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 0), "");
    }
}
