//! # Codescope Protocol
//!
//! Types exchanged between the retrieval core and the transport layer above
//! it: ranked search results with their score breakdown, query intents and
//! impact reports.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a node inside one graph snapshot.
///
/// Ids are assigned sequentially during a build pass and are only stable
/// within the snapshot that produced them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Retrieval channel(s) a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Vector,
    Keyword,
    Hybrid,
}

impl SearchType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Keyword => "keyword",
            Self::Hybrid => "hybrid",
        }
    }
}

/// Operational search mode inferred from a query
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    FindSimilar,
    FindDependencies,
    FindUsage,
    FindPattern,
    ImpactAnalysis,
    ArchitectureSearch,
}

impl IntentType {
    pub const ALL: [Self; 6] = [
        Self::FindSimilar,
        Self::FindDependencies,
        Self::FindUsage,
        Self::FindPattern,
        Self::ImpactAnalysis,
        Self::ArchitectureSearch,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FindSimilar => "find_similar",
            Self::FindDependencies => "find_dependencies",
            Self::FindUsage => "find_usage",
            Self::FindPattern => "find_pattern",
            Self::ImpactAnalysis => "impact_analysis",
            Self::ArchitectureSearch => "architecture_search",
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified query intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Intent {
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub confidence: f64,
    pub keywords: Vec<String>,
}

/// Caller-supplied context that shapes classification and ranking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct QueryContext {
    /// File the caller is currently looking at
    pub current_file: Option<String>,
    /// Recently viewed files, most recent first
    pub recent_files: Vec<String>,
    /// Symbol under the caller's cursor
    pub focus_symbol: Option<String>,
}

/// Per-factor relevance signals, each in 0..=1
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RelevanceFactors {
    pub semantic_similarity: f64,
    pub structural_relevance: f64,
    pub contextual_fit: f64,
    pub pattern_match: f64,
    pub importance: f64,
}

/// How a result's final score was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreExplanation {
    /// 1-based rank in the keyword channel, if present there
    pub keyword_rank: Option<usize>,
    /// 1-based rank in the vector channel, if present there
    pub vector_rank: Option<usize>,
    pub fused_score: f64,
    pub factors: RelevanceFactors,
    pub weighted_sum: f64,
    pub intent_confidence: f64,
    /// Set when at least one retrieval channel failed for this query
    pub degraded: bool,
    pub failed_channels: Vec<String>,
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankedResult {
    pub id: String,
    pub node_id: Option<NodeId>,
    pub score: f64,
    pub content: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub search_type: SearchType,
    pub explanation: ScoreExplanation,
}

/// Response of a search call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,
    pub intent: Intent,
    /// Reduced-confidence marker: a channel failed and results come from the survivors
    pub degraded: bool,
    pub snapshot_version: u64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

/// A node affected by a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AffectedNode {
    pub node_id: NodeId,
    pub name: String,
    pub file_path: String,
    /// Hop distance along incoming edges, `None` for cluster-only members
    pub distance: Option<usize>,
    /// Relation of the direct edge into the changed node, if any
    pub relation: Option<String>,
    pub impact_score: f64,
    pub impact_level: ImpactLevel,
    pub high_centrality: bool,
}

/// Result of an impact analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImpactReport {
    pub node_id: NodeId,
    pub direct: Vec<AffectedNode>,
    pub indirect: Vec<AffectedNode>,
    pub total_affected: usize,
    pub high_centrality_affected: usize,
    pub risk_level: RiskLevel,
}
