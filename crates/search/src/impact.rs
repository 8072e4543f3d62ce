//! Change impact estimation over a graph snapshot.

use codescope_graph::{GraphError, GraphSnapshot, RelationType};
use codescope_protocol::{AffectedNode, ImpactLevel, ImpactReport, NodeId, RiskLevel};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Relations whose source breaks when the target changes
pub const IMPACT_RELATIONS: [RelationType; 4] = [
    RelationType::DependsOn,
    RelationType::Calls,
    RelationType::Extends,
    RelationType::Implements,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactThresholds {
    /// More affected nodes than this is high risk
    pub high_risk_total: usize,
    /// More high-centrality nodes than this is high risk
    pub high_risk_central: usize,
    pub medium_risk_total: usize,
    pub medium_risk_central: usize,
    /// Normalized pagerank at which a node counts as high-centrality
    pub high_centrality: f64,
    /// Impact score above which a node is high impact
    pub high_impact: f64,
    pub medium_impact: f64,
    /// Score multiplier per extra hop of distance
    pub distance_decay: f64,
    /// Score multiplier on cluster cohesion for cluster-only nodes
    pub cluster_factor: f64,
}

impl Default for ImpactThresholds {
    fn default() -> Self {
        Self {
            high_risk_total: 20,
            high_risk_central: 5,
            medium_risk_total: 10,
            medium_risk_central: 2,
            high_centrality: 0.7,
            high_impact: 0.8,
            medium_impact: 0.6,
            distance_decay: 0.7,
            cluster_factor: 0.5,
        }
    }
}

impl ImpactThresholds {
    #[must_use]
    pub const fn risk(&self, total: usize, high_centrality: usize) -> RiskLevel {
        if total > self.high_risk_total || high_centrality > self.high_risk_central {
            RiskLevel::High
        } else if total > self.medium_risk_total || high_centrality > self.medium_risk_central {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    #[must_use]
    pub fn impact_level(&self, score: f64) -> ImpactLevel {
        if score > self.high_impact {
            ImpactLevel::High
        } else if score > self.medium_impact {
            ImpactLevel::Medium
        } else {
            ImpactLevel::Low
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImpactAnalyzer {
    thresholds: ImpactThresholds,
}

impl ImpactAnalyzer {
    #[must_use]
    pub const fn new(thresholds: ImpactThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub const fn thresholds(&self) -> &ImpactThresholds {
        &self.thresholds
    }

    /// Nodes affected by changing `node`.
    ///
    /// Direct: sources of impact relations into `node`, plus every node that
    /// reaches `node` within `max_distance` hops. Indirect: the rest of
    /// `node`'s cluster.
    pub fn analyze(
        &self,
        snapshot: &GraphSnapshot,
        node: NodeId,
        max_distance: usize,
    ) -> Result<ImpactReport, GraphError> {
        snapshot.require_node(node)?;
        let graph = snapshot.graph();

        let mut distances: BTreeMap<NodeId, usize> = graph
            .incoming_sources(node, &IMPACT_RELATIONS)
            .into_iter()
            .map(|id| (id, 1))
            .collect();
        for (id, distance) in graph.dependents_with_distance(node, max_distance) {
            distances
                .entry(id)
                .and_modify(|d| *d = (*d).min(distance))
                .or_insert(distance);
        }
        distances.remove(&node);

        let incoming = graph.incoming(node);
        let mut direct: Vec<AffectedNode> = distances
            .iter()
            .filter_map(|(&id, &distance)| {
                let relation = incoming
                    .iter()
                    .filter(|e| e.source == id)
                    .min_by_key(|e| (!IMPACT_RELATIONS.contains(&e.relation), e.relation))
                    .map(|e| e.relation.as_str().to_string());
                let score = self.thresholds.distance_decay.powi(exponent(distance));
                self.affected(snapshot, id, Some(distance), relation, score)
            })
            .collect();
        direct.sort_by_key(|a| (a.distance, a.node_id));

        let direct_ids: HashSet<NodeId> = direct.iter().map(|a| a.node_id).collect();
        let indirect: Vec<AffectedNode> = snapshot
            .metrics()
            .clusters
            .cluster_of(node)
            .map(|cluster| {
                let score = self.thresholds.cluster_factor * cluster.cohesion;
                cluster
                    .members
                    .iter()
                    .filter(|&&id| id != node && !direct_ids.contains(&id))
                    .filter_map(|&id| self.affected(snapshot, id, None, None, score))
                    .collect()
            })
            .unwrap_or_default();

        let total_affected = direct.len() + indirect.len();
        let high_centrality_affected = direct
            .iter()
            .chain(&indirect)
            .filter(|a| a.high_centrality)
            .count();
        let risk_level = self.thresholds.risk(total_affected, high_centrality_affected);

        log::debug!(
            "Impact of {node}: {} direct, {} indirect, {high_centrality_affected} central, risk {risk_level:?}",
            direct.len(),
            indirect.len()
        );

        Ok(ImpactReport {
            node_id: node,
            direct,
            indirect,
            total_affected,
            high_centrality_affected,
            risk_level,
        })
    }

    fn affected(
        &self,
        snapshot: &GraphSnapshot,
        id: NodeId,
        distance: Option<usize>,
        relation: Option<String>,
        impact_score: f64,
    ) -> Option<AffectedNode> {
        let code_node = snapshot.graph().node(id)?;
        Some(AffectedNode {
            node_id: id,
            name: code_node.name.clone(),
            file_path: code_node.file_path.clone(),
            distance,
            relation,
            impact_score,
            impact_level: self.thresholds.impact_level(impact_score),
            high_centrality: snapshot.metrics().normalized_pagerank(id)
                >= self.thresholds.high_centrality,
        })
    }
}

fn exponent(distance: usize) -> i32 {
    i32::try_from(distance.saturating_sub(1)).unwrap_or(i32::MAX)
}
