use crate::error::Result;
use crate::fusion::DEFAULT_RRF_K;
use crate::impact::ImpactThresholds;
use crate::ranker::WeightTable;
use codescope_backend::{AdapterConfig, HashingEmbedder};
use codescope_graph::MetricsConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// RRF constant
    pub k: f64,
    /// Each channel fetches `limit * candidate_multiplier` hits
    pub candidate_multiplier: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_RRF_K,
            candidate_multiplier: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Longest accepted query, in characters
    pub max_length: usize,
    /// Hop bound for graph metadata attached to results
    pub metadata_hops: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_length: 1_000,
            metadata_hops: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub dimension: usize,
    /// Query embeddings kept in the LRU cache
    pub cache_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: HashingEmbedder::DEFAULT_DIMENSION,
            cache_size: 256,
        }
    }
}

/// Engine configuration; every field has a default
///
/// ```toml
/// [fusion]
/// k = 60.0
///
/// [adapter]
/// index_name = "codescope"
/// call_timeout_ms = 2000
///
/// [ranking.overrides.find_usage]
/// contextual = 0.3
///
/// [graph.clusters]
/// boundary_relations = ["imports"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fusion: FusionConfig,
    pub adapter: AdapterConfig,
    pub query: QueryConfig,
    pub embedding: EmbeddingConfig,
    pub ranking: WeightTable,
    pub impact: ImpactThresholds,
    pub graph: MetricsConfig,
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Loaded engine config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::SearchError::Config(e.to_string()))
    }
}
