//! Keyword and vector channels over a [`SearchBackend`].
//!
//! Channel calls never return an error: a failed or timed-out channel yields
//! an empty hit list plus a [`ChannelStatus`] the caller can report as
//! degradation. Connection errors are retried with exponential backoff inside
//! the call deadline; schema errors are not retried.

use crate::backend::SearchBackend;
use crate::error::{BackendError, Result};
use crate::types::{IndexSchema, IndexedDocument, KeywordQuery, KnnQuery, SearchFilter, SearchHit};
use codescope_protocol::SearchType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Result channel feeding fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Keyword,
    Vector,
}

impl Channel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Vector => "vector",
        }
    }

    #[must_use]
    pub const fn search_type(self) -> SearchType {
        match self {
            Self::Keyword => SearchType::Keyword,
            Self::Vector => SearchType::Vector,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ChannelStatus {
    Ok,
    Failed(String),
    TimedOut,
}

/// What one channel produced
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub hits: Vec<SearchHit>,
    pub status: ChannelStatus,
    pub elapsed: Duration,
}

impl ChannelOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ChannelStatus::Ok
    }

    /// Outcome of a channel that could not be queried at all
    #[must_use]
    pub fn unavailable(channel: Channel, reason: impl Into<String>) -> Self {
        Self::failed(channel, ChannelStatus::Failed(reason.into()), Instant::now())
    }

    /// Outcome of a channel whose deadline passed before it answered
    #[must_use]
    pub fn timed_out(channel: Channel, started: Instant) -> Self {
        Self::failed(channel, ChannelStatus::TimedOut, started)
    }

    fn failed(channel: Channel, status: ChannelStatus, started: Instant) -> Self {
        Self {
            channel,
            hits: Vec::new(),
            status,
            elapsed: started.elapsed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub index_name: String,
    /// Extra attempts after a connection failure
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt
    pub retry_backoff_ms: u64,
    /// Upper bound for one channel call, retries included
    pub call_timeout_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            index_name: "codescope".to_string(),
            max_retries: 2,
            retry_backoff_ms: 50,
            call_timeout_ms: 2_000,
        }
    }
}

impl AdapterConfig {
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Per-call knobs for a channel query
#[derive(Debug, Clone, Default)]
pub struct ChannelRequest {
    pub limit: usize,
    pub filter: Option<SearchFilter>,
    /// Caller deadline; the effective deadline is the earlier of this and the call timeout
    pub deadline: Option<Instant>,
}

impl ChannelRequest {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Option<SearchFilter>) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub const fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

pub struct SimilarityAdapter {
    backend: Arc<dyn SearchBackend>,
    schema: IndexSchema,
    config: AdapterConfig,
}

impl SimilarityAdapter {
    pub fn new(backend: Arc<dyn SearchBackend>, schema: IndexSchema, config: AdapterConfig) -> Self {
        Self {
            backend,
            schema,
            config,
        }
    }

    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.config.index_name
    }

    #[must_use]
    pub const fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    #[must_use]
    pub const fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Ensure the backing index exists with a compatible schema. Idempotent.
    pub async fn initialize(&self) -> Result<()> {
        let index = self.index_name();
        self.with_retry("initialize", || self.backend.ensure_index(index, &self.schema))
            .await
            .inspect_err(|err| {
                log::error!(
                    "Failed to initialize index '{index}' on {}: {err}",
                    self.backend.name()
                );
            })
    }

    /// Upsert documents; embeddings must match the schema dimension
    pub async fn index_documents(&self, documents: Vec<IndexedDocument>) -> Result<usize> {
        for document in &documents {
            if let Some(embedding) = &document.embedding {
                if embedding.len() != self.schema.dimension {
                    return Err(BackendError::dimension_mismatch(
                        self.schema.dimension,
                        embedding.len(),
                    ));
                }
            }
        }
        let index = self.index_name();
        self.with_retry("index_documents", || {
            self.backend.index_documents(index, documents.clone())
        })
        .await
    }

    /// Drop documents not in `keep`
    pub async fn retain_documents(&self, keep: &HashSet<String>) -> Result<usize> {
        let index = self.index_name();
        self.with_retry("retain_documents", || self.backend.retain_documents(index, keep))
            .await
    }

    /// Stored versions of `ids`; ids not in the index are skipped
    pub async fn fetch_documents(&self, ids: &[String]) -> Result<Vec<IndexedDocument>> {
        let index = self.index_name();
        self.with_retry("fetch_documents", || self.backend.get_documents(index, ids))
            .await
    }

    /// Delete documents by id
    pub async fn delete_documents(&self, ids: &HashSet<String>) -> Result<usize> {
        let index = self.index_name();
        self.with_retry("delete_documents", || self.backend.delete_documents(index, ids))
            .await
    }

    pub async fn keyword_search(&self, query: &str, request: &ChannelRequest) -> ChannelOutcome {
        let mut keyword = KeywordQuery::multi_field(query, request.limit);
        keyword.filter = request.filter.clone();
        let index = self.index_name();
        self.run_channel(Channel::Keyword, request.deadline, || {
            self.backend.keyword_query(index, &keyword)
        })
        .await
    }

    pub async fn vector_search(&self, embedding: &[f32], request: &ChannelRequest) -> ChannelOutcome {
        if embedding.len() != self.schema.dimension {
            let err = BackendError::dimension_mismatch(self.schema.dimension, embedding.len());
            log::warn!("vector search skipped: {err}");
            return ChannelOutcome::unavailable(Channel::Vector, err.to_string());
        }
        let knn = KnnQuery {
            vector: embedding.to_vec(),
            limit: request.limit,
            filter: request.filter.clone(),
        };
        let index = self.index_name();
        self.run_channel(Channel::Vector, request.deadline, || {
            self.backend.knn_query(index, &knn)
        })
        .await
    }

    async fn run_channel<F, Fut>(
        &self,
        channel: Channel,
        deadline: Option<Instant>,
        call: F,
    ) -> ChannelOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<SearchHit>>>,
    {
        let started = Instant::now();
        let own_deadline = started + self.config.call_timeout();
        let deadline = deadline.map_or(own_deadline, |d| d.min(own_deadline));

        match tokio::time::timeout_at(deadline, self.with_retry(channel.as_str(), call)).await {
            Ok(Ok(mut hits)) => {
                for hit in &mut hits {
                    hit.search_type = channel.search_type();
                }
                log::debug!(
                    "{channel} channel returned {} hits in {:?}",
                    hits.len(),
                    started.elapsed()
                );
                ChannelOutcome {
                    channel,
                    hits,
                    status: ChannelStatus::Ok,
                    elapsed: started.elapsed(),
                }
            }
            Ok(Err(err)) => {
                log::warn!("{channel} channel failed on {}: {err}", self.backend.name());
                ChannelOutcome::failed(channel, ChannelStatus::Failed(err.to_string()), started)
            }
            Err(_) => {
                log::warn!(
                    "{channel} channel timed out after {:?}",
                    started.elapsed()
                );
                ChannelOutcome::timed_out(channel, started)
            }
        }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_backoff() * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    log::warn!(
                        "{operation} failed (attempt {attempt}/{}): {err}; retrying in {delay:?}",
                        self.config.max_retries + 1
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
