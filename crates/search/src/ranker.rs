use codescope_graph::GraphSnapshot;
use codescope_protocol::{Intent, IntentType, NodeId, QueryContext, RelevanceFactors};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

const SAME_FILE_FIT: f64 = 0.5;
const RECENT_FILE_FIT: f64 = 0.3;

/// Weight of each relevance factor in the final score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub semantic: f64,
    pub structural: f64,
    pub contextual: f64,
    pub pattern: f64,
    pub importance: f64,
}

impl FactorWeights {
    pub const DEFAULT: Self = Self {
        semantic: 0.30,
        structural: 0.25,
        contextual: 0.15,
        pattern: 0.10,
        importance: 0.20,
    };

    #[must_use]
    pub fn weighted_sum(&self, factors: &RelevanceFactors) -> f64 {
        factors.semantic_similarity * self.semantic
            + factors.structural_relevance * self.structural
            + factors.contextual_fit * self.contextual
            + factors.pattern_match * self.pattern
            + factors.importance * self.importance
    }
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-intent changes to the default weights; unset fields keep the default
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightOverride {
    pub semantic: Option<f64>,
    pub structural: Option<f64>,
    pub contextual: Option<f64>,
    pub pattern: Option<f64>,
    pub importance: Option<f64>,
}

impl WeightOverride {
    #[must_use]
    pub fn apply(&self, base: FactorWeights) -> FactorWeights {
        FactorWeights {
            semantic: self.semantic.unwrap_or(base.semantic),
            structural: self.structural.unwrap_or(base.structural),
            contextual: self.contextual.unwrap_or(base.contextual),
            pattern: self.pattern.unwrap_or(base.pattern),
            importance: self.importance.unwrap_or(base.importance),
        }
    }
}

/// Declarative intent -> weights table.
///
/// Overrides read from configuration are merged over the built-in ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTable {
    pub default: FactorWeights,
    #[serde(deserialize_with = "merge_overrides")]
    pub overrides: BTreeMap<IntentType, WeightOverride>,
}

fn merge_overrides<'de, D>(deserializer: D) -> Result<BTreeMap<IntentType, WeightOverride>, D::Error>
where
    D: Deserializer<'de>,
{
    let custom = BTreeMap::<IntentType, WeightOverride>::deserialize(deserializer)?;
    let mut merged = WeightTable::default().overrides;
    merged.extend(custom);
    Ok(merged)
}

impl Default for WeightTable {
    fn default() -> Self {
        let overrides = BTreeMap::from([
            (
                IntentType::FindPattern,
                WeightOverride {
                    pattern: Some(0.40),
                    semantic: Some(0.20),
                    ..WeightOverride::default()
                },
            ),
            (
                IntentType::FindDependencies,
                WeightOverride {
                    structural: Some(0.40),
                    importance: Some(0.30),
                    ..WeightOverride::default()
                },
            ),
            (
                IntentType::ImpactAnalysis,
                WeightOverride {
                    structural: Some(0.35),
                    importance: Some(0.35),
                    ..WeightOverride::default()
                },
            ),
        ]);
        Self {
            default: FactorWeights::DEFAULT,
            overrides,
        }
    }
}

impl WeightTable {
    #[must_use]
    pub fn weights_for(&self, intent: IntentType) -> FactorWeights {
        self.overrides
            .get(&intent)
            .map_or(self.default, |o| o.apply(self.default))
    }
}

/// A fused hit waiting to be re-ranked
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub fused_score: f64,
    pub node_id: Option<NodeId>,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub factors: RelevanceFactors,
    pub weighted_sum: f64,
    pub score: f64,
}

/// Inputs shared by every candidate of one query
pub struct RankingContext<'a> {
    pub intent: &'a Intent,
    pub query_context: &'a QueryContext,
    /// Pattern tags named by the query
    pub requested_patterns: &'a [String],
    pub snapshot: &'a GraphSnapshot,
}

/// Re-ranks fused hits with graph signals
#[derive(Debug, Clone, Default)]
pub struct IntelligentRanker {
    weights: WeightTable,
}

impl IntelligentRanker {
    #[must_use]
    pub const fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    #[must_use]
    pub const fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Score and sort; equal scores keep their fused order
    #[must_use]
    pub fn rank(&self, candidates: Vec<Candidate>, ctx: &RankingContext<'_>) -> Vec<RankedCandidate> {
        let weights = self.weights.weights_for(ctx.intent.intent_type);
        let max_fused = candidates
            .iter()
            .map(|c| c.fused_score)
            .fold(0.0_f64, f64::max);

        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|candidate| {
                let factors = Self::factors(&candidate, max_fused, ctx);
                let weighted_sum = weights.weighted_sum(&factors);
                RankedCandidate {
                    score: weighted_sum * ctx.intent.confidence,
                    weighted_sum,
                    factors,
                    candidate,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    #[allow(clippy::cast_precision_loss)]
    fn factors(candidate: &Candidate, max_fused: f64, ctx: &RankingContext<'_>) -> RelevanceFactors {
        let semantic_similarity = if max_fused > 0.0 {
            candidate.fused_score / max_fused
        } else {
            0.0
        };

        let contextual_fit = candidate.file_path.as_deref().map_or(0.0, |path| {
            let mut fit = 0.0;
            if ctx.query_context.current_file.as_deref() == Some(path) {
                fit += SAME_FILE_FIT;
            }
            if ctx.query_context.recent_files.iter().any(|f| f == path) {
                fit += RECENT_FILE_FIT;
            }
            f64::min(fit, 1.0)
        });

        let Some(node) = candidate
            .node_id
            .filter(|&id| ctx.snapshot.graph().contains(id))
        else {
            return RelevanceFactors {
                semantic_similarity,
                contextual_fit,
                ..RelevanceFactors::default()
            };
        };

        let metrics = ctx.snapshot.metrics();
        let pattern_match = if ctx.intent.intent_type == IntentType::FindPattern
            && !ctx.requested_patterns.is_empty()
        {
            let hits = ctx
                .requested_patterns
                .iter()
                .filter(|tag| ctx.snapshot.has_pattern(node, tag))
                .count();
            hits as f64 / ctx.requested_patterns.len() as f64
        } else {
            0.0
        };

        RelevanceFactors {
            semantic_similarity,
            structural_relevance: metrics.normalized_pagerank(node),
            contextual_fit,
            pattern_match,
            importance: metrics.normalized_degree(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codescope_graph::{
        CodeGraph, ExtractedNode, MetricsConfig, NodeType, PatternRegistry, RelationType,
    };
    use pretty_assertions::assert_eq;

    fn snapshot() -> GraphSnapshot {
        let mut graph = CodeGraph::new();
        let hub = graph.add_node(ExtractedNode::new("OrderRepository", NodeType::Class).file("repo.rs"));
        let a = graph.add_node(ExtractedNode::new("checkout", NodeType::Function).file("api.rs"));
        let b = graph.add_node(ExtractedNode::new("refund", NodeType::Function).file("api.rs"));
        graph.add_edge(a, hub, RelationType::Calls, 1.0);
        graph.add_edge(b, hub, RelationType::Calls, 1.0);
        GraphSnapshot::build(
            graph,
            &MetricsConfig::default(),
            &PatternRegistry::with_default_rules(),
            1,
        )
    }

    fn candidate(id: &str, fused: f64, node: Option<u32>, file: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            fused_score: fused,
            node_id: node.map(NodeId),
            file_path: Some(file.to_string()),
        }
    }

    fn intent(intent_type: IntentType, confidence: f64) -> Intent {
        Intent {
            intent_type,
            confidence,
            keywords: Vec::new(),
        }
    }

    #[test]
    fn test_weight_table_overrides() {
        let table = WeightTable::default();
        let pattern = table.weights_for(IntentType::FindPattern);
        assert!((pattern.pattern - 0.40).abs() < 1e-12);
        assert!((pattern.semantic - 0.20).abs() < 1e-12);
        assert!((pattern.structural - 0.25).abs() < 1e-12);
        assert_eq!(table.weights_for(IntentType::FindUsage), FactorWeights::DEFAULT);
        let impact = table.weights_for(IntentType::ImpactAnalysis);
        assert!((impact.structural - 0.35).abs() < 1e-12);
        assert!((impact.importance - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_structure_lifts_hub_and_confidence_scales() {
        let snap = snapshot();
        let intent = intent(IntentType::FindDependencies, 0.8);
        let query_context = QueryContext::default();
        let ctx = RankingContext {
            intent: &intent,
            query_context: &query_context,
            requested_patterns: &[],
            snapshot: &snap,
        };

        let ranked = IntelligentRanker::default().rank(
            vec![
                candidate("api.rs::checkout", 0.033, Some(1), "api.rs"),
                candidate("repo.rs::OrderRepository", 0.030, Some(0), "repo.rs"),
                candidate("README.md", 0.031, None, "README.md"),
            ],
            &ctx,
        );

        assert_eq!(ranked[0].candidate.id, "repo.rs::OrderRepository");
        let hub = &ranked[0];
        assert!((hub.factors.structural_relevance - 1.0).abs() < 1e-12);
        assert!((hub.factors.importance - 1.0).abs() < 1e-12);
        assert!((hub.score - hub.weighted_sum * 0.8).abs() < 1e-12);

        let readme = ranked.iter().find(|r| r.candidate.id == "README.md").unwrap();
        assert_eq!(readme.factors.structural_relevance, 0.0);
        assert_eq!(readme.factors.importance, 0.0);
    }

    #[test]
    fn test_contextual_fit_and_stable_ties() {
        let snap = snapshot();
        let intent = intent(IntentType::FindSimilar, 0.5);
        let query_context = QueryContext {
            current_file: Some("api.rs".to_string()),
            recent_files: vec!["api.rs".to_string(), "lib.rs".to_string()],
            focus_symbol: None,
        };
        let ctx = RankingContext {
            intent: &intent,
            query_context: &query_context,
            requested_patterns: &[],
            snapshot: &snap,
        };

        let ranked = IntelligentRanker::default().rank(
            vec![
                candidate("lib.rs::b", 0.02, None, "lib.rs"),
                candidate("lib.rs::a", 0.02, None, "lib.rs"),
                candidate("api.rs::checkout", 0.02, Some(1), "api.rs"),
            ],
            &ctx,
        );
        assert_eq!(ranked[0].candidate.id, "api.rs::checkout");
        assert!((ranked[0].factors.contextual_fit - 0.8).abs() < 1e-12);
        // identical scores keep fusion order
        assert_eq!(ranked[1].candidate.id, "lib.rs::b");
        assert_eq!(ranked[2].candidate.id, "lib.rs::a");
    }

    #[test]
    fn test_pattern_factor_only_for_pattern_intent() {
        let snap = snapshot();
        let requested = vec!["repository".to_string(), "factory".to_string()];
        let query_context = QueryContext::default();
        let hub = || vec![candidate("repo.rs::OrderRepository", 0.03, Some(0), "repo.rs")];

        let pattern_intent = intent(IntentType::FindPattern, 0.7);
        let ranked = IntelligentRanker::default().rank(
            hub(),
            &RankingContext {
                intent: &pattern_intent,
                query_context: &query_context,
                requested_patterns: &requested,
                snapshot: &snap,
            },
        );
        assert!((ranked[0].factors.pattern_match - 0.5).abs() < 1e-12);

        let usage_intent = intent(IntentType::FindUsage, 0.7);
        let ranked = IntelligentRanker::default().rank(
            hub(),
            &RankingContext {
                intent: &usage_intent,
                query_context: &query_context,
                requested_patterns: &requested,
                snapshot: &snap,
            },
        );
        assert_eq!(ranked[0].factors.pattern_match, 0.0);
    }
}
