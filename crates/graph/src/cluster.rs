use crate::types::{CodeGraph, RelationType};
use codescope_protocol::NodeId;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Clustering parameters.
///
/// Clusters are the connected components of the undirected graph formed by
/// every edge whose relation is *not* a boundary relation. Boundary edges
/// (module-level imports and declared dependencies by default) still count
/// towards cohesion and coupling, which is what makes coupling non-trivial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub boundary_relations: Vec<RelationType>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            boundary_relations: vec![RelationType::Imports, RelationType::DependsOn],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterRole {
    Core,
    Peripheral,
    Connector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    /// Ascending node ids
    pub members: Vec<NodeId>,
    pub internal_edges: usize,
    pub external_edges: usize,
    /// internal edges / possible internal edges
    pub cohesion: f64,
    /// external edges / all edges touching the cluster
    pub coupling: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ClusterTable {
    pub clusters: Vec<Cluster>,
    membership: Vec<usize>,
    roles: Vec<ClusterRole>,
}

impl ClusterTable {
    #[must_use]
    pub fn cluster_of(&self, node: NodeId) -> Option<&Cluster> {
        self.membership
            .get(node.index())
            .and_then(|&id| self.clusters.get(id))
    }

    #[must_use]
    pub fn role_of(&self, node: NodeId) -> Option<ClusterRole> {
        self.roles.get(node.index()).copied()
    }
}

/// Partition the graph and score each cluster
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_clusters(
    graph: &CodeGraph,
    config: &ClusterConfig,
    pagerank: &[f64],
) -> ClusterTable {
    let n = graph.node_count();
    if n == 0 {
        return ClusterTable::default();
    }

    let mut components = UnionFind::<usize>::new(n);
    for edge in graph.edges() {
        if !config.boundary_relations.contains(&edge.relation) {
            components.union(edge.source.index(), edge.target.index());
        }
    }

    // Cluster ids follow the smallest member id
    let mut root_to_cluster: HashMap<usize, usize> = HashMap::new();
    let mut membership = vec![0usize; n];
    let mut members: Vec<Vec<NodeId>> = Vec::new();
    for node in graph.nodes() {
        let root = components.find(node.id.index());
        let cluster = *root_to_cluster.entry(root).or_insert_with(|| {
            members.push(Vec::new());
            members.len() - 1
        });
        membership[node.id.index()] = cluster;
        members[cluster].push(node.id);
    }

    let mut internal = vec![0usize; members.len()];
    let mut external = vec![0usize; members.len()];
    let mut node_internal = vec![0usize; n];
    let mut node_external = vec![0usize; n];
    for edge in graph.edges() {
        let (s, t) = (edge.source.index(), edge.target.index());
        if membership[s] == membership[t] {
            internal[membership[s]] += 1;
            node_internal[s] += 1;
            if s != t {
                node_internal[t] += 1;
            }
        } else {
            external[membership[s]] += 1;
            external[membership[t]] += 1;
            node_external[s] += 1;
            node_external[t] += 1;
        }
    }

    let mut roles = vec![ClusterRole::Peripheral; n];
    let clusters: Vec<Cluster> = members
        .into_iter()
        .enumerate()
        .map(|(id, members)| {
            let size = members.len();
            let possible = size * size.saturating_sub(1);
            let cohesion = if possible == 0 {
                0.0
            } else {
                (internal[id] as f64 / possible as f64).min(1.0)
            };
            let touching = internal[id] + external[id];
            let coupling = if touching == 0 {
                0.0
            } else {
                external[id] as f64 / touching as f64
            };

            let mut by_rank = members.clone();
            by_rank.sort_by(|a, b| {
                let pa = pagerank.get(a.index()).copied().unwrap_or(0.0);
                let pb = pagerank.get(b.index()).copied().unwrap_or(0.0);
                pb.total_cmp(&pa).then_with(|| a.cmp(b))
            });
            let core_count = size.div_ceil(4);
            for (position, node) in by_rank.iter().enumerate() {
                let idx = node.index();
                roles[idx] = if position < core_count {
                    ClusterRole::Core
                } else if node_external[idx] * 2 > node_internal[idx] + node_external[idx] {
                    ClusterRole::Connector
                } else {
                    ClusterRole::Peripheral
                };
            }

            Cluster {
                id,
                members,
                internal_edges: internal[id],
                external_edges: external[id],
                cohesion,
                coupling,
            }
        })
        .collect();

    ClusterTable {
        clusters,
        membership,
        roles,
    }
}
