//! Centrality and aggregate metrics over a finished graph.
//!
//! Everything here is a batch computation: it is re-run in full whenever a
//! new snapshot is built and never updated incrementally.

use crate::cluster::{compute_clusters, ClusterConfig, ClusterTable};
use crate::types::CodeGraph;
use codescope_protocol::NodeId;
use petgraph::algo::tarjan_scc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Power-iteration parameters for pagerank
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankConfig {
    pub damping: f64,
    /// L1 change between iterations below which the iteration stops
    pub epsilon: f64,
    pub max_iterations: usize,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            epsilon: 1e-6,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub pagerank: PageRankConfig,
    pub clusters: ClusterConfig,
}

/// Centrality scores of one node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Centrality {
    pub in_degree: usize,
    pub out_degree: usize,
    /// in + out
    pub degree: usize,
    /// Normalized by (n-1)(n-2)
    pub betweenness: f64,
    /// Wasserman-Faust closeness over outgoing paths
    pub closeness: f64,
    pub pagerank: f64,
}

/// Whole-graph aggregates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub average_degree: f64,
    pub max_dependency_depth: usize,
    pub cycle_count: usize,
}

/// All derived metrics of a snapshot
#[derive(Debug, Clone, Default)]
pub struct GraphMetrics {
    pub stats: GraphStats,
    pub centrality: Vec<Centrality>,
    pub clusters: ClusterTable,
    pub pagerank_iterations: usize,
    max_pagerank: f64,
    max_degree: usize,
}

impl GraphMetrics {
    #[must_use]
    pub fn centrality(&self, node: NodeId) -> Option<&Centrality> {
        self.centrality.get(node.index())
    }

    /// Pagerank scaled so the highest-ranked node scores 1.0
    #[must_use]
    pub fn normalized_pagerank(&self, node: NodeId) -> f64 {
        match self.centrality(node) {
            Some(c) if self.max_pagerank > 0.0 => c.pagerank / self.max_pagerank,
            _ => 0.0,
        }
    }

    /// Degree scaled so the best-connected node scores 1.0
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn normalized_degree(&self, node: NodeId) -> f64 {
        match self.centrality(node) {
            Some(c) if self.max_degree > 0 => c.degree as f64 / self.max_degree as f64,
            _ => 0.0,
        }
    }
}

/// Compute centrality, clusters and aggregates for `graph`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_metrics(graph: &CodeGraph, config: &MetricsConfig) -> GraphMetrics {
    let n = graph.node_count();
    let adjacency = simple_adjacency(graph);

    let mut centrality: Vec<Centrality> = graph
        .nodes()
        .map(|node| {
            let in_degree = graph.incoming(node.id).len();
            let out_degree = graph.outgoing(node.id).len();
            Centrality {
                in_degree,
                out_degree,
                degree: in_degree + out_degree,
                ..Centrality::default()
            }
        })
        .collect();

    let (pagerank, iterations) = pagerank(&adjacency, config.pagerank);
    let paths = shortest_path_scores(&adjacency);

    for (idx, c) in centrality.iter_mut().enumerate() {
        c.pagerank = pagerank[idx];
        c.betweenness = paths.betweenness[idx];
        c.closeness = paths.closeness[idx];
    }

    let clusters = compute_clusters(graph, &config.clusters, &pagerank);

    let stats = GraphStats {
        node_count: n,
        edge_count: graph.edge_count(),
        average_degree: if n == 0 {
            0.0
        } else {
            2.0 * graph.edge_count() as f64 / n as f64
        },
        max_dependency_depth: paths.max_depth,
        cycle_count: cycle_count(graph, &adjacency),
    };

    let max_pagerank = pagerank.iter().copied().fold(0.0, f64::max);
    let max_degree = centrality.iter().map(|c| c.degree).max().unwrap_or(0);

    log::debug!(
        "Metrics: {} nodes, {} edges, pagerank converged after {} iterations, {} clusters",
        stats.node_count,
        stats.edge_count,
        iterations,
        clusters.clusters.len()
    );

    GraphMetrics {
        stats,
        centrality,
        clusters,
        pagerank_iterations: iterations,
        max_pagerank,
        max_degree,
    }
}

/// Outgoing adjacency with parallel edges collapsed, neighbors ascending
fn simple_adjacency(graph: &CodeGraph) -> Vec<Vec<usize>> {
    graph
        .nodes()
        .map(|node| {
            graph
                .neighbor_ids(node.id, petgraph::Direction::Outgoing)
                .into_iter()
                .map(NodeId::index)
                .collect()
        })
        .collect()
}

/// Power iteration; dangling nodes spread their mass uniformly.
/// Returns the scores and the number of iterations run.
#[allow(clippy::cast_precision_loss)]
fn pagerank(adjacency: &[Vec<usize>], config: PageRankConfig) -> (Vec<f64>, usize) {
    let n = adjacency.len();
    if n == 0 {
        return (Vec::new(), 0);
    }

    let nf = n as f64;
    let d = config.damping;
    let mut ranks = vec![1.0 / nf; n];
    let mut iterations = 0;

    for _ in 0..config.max_iterations {
        iterations += 1;
        let dangling: f64 = adjacency
            .iter()
            .zip(&ranks)
            .filter(|(out, _)| out.is_empty())
            .map(|(_, rank)| rank)
            .sum();

        let base = (1.0 - d) / nf + d * dangling / nf;
        let mut next = vec![base; n];
        for (v, out) in adjacency.iter().enumerate() {
            if out.is_empty() {
                continue;
            }
            let share = d * ranks[v] / out.len() as f64;
            for &w in out {
                next[w] += share;
            }
        }

        let delta: f64 = next.iter().zip(&ranks).map(|(a, b)| (a - b).abs()).sum();
        ranks = next;
        if delta < config.epsilon {
            break;
        }
    }

    (ranks, iterations)
}

struct PathScores {
    betweenness: Vec<f64>,
    closeness: Vec<f64>,
    max_depth: usize,
}

/// Brandes betweenness plus closeness and max depth from the same BFS sweep
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn shortest_path_scores(adjacency: &[Vec<usize>]) -> PathScores {
    let n = adjacency.len();
    let mut betweenness = vec![0.0; n];
    let mut closeness = vec![0.0; n];
    let mut max_depth = 0usize;

    for s in 0..n {
        let mut stack = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut dist = vec![-1i64; n];
        sigma[s] = 1.0;
        dist[s] = 0;

        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &adjacency[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        let mut reachable = 0usize;
        let mut total_distance = 0usize;
        for (v, &d) in dist.iter().enumerate() {
            if v != s && d > 0 {
                reachable += 1;
                total_distance += d as usize;
                max_depth = max_depth.max(d as usize);
            }
        }
        if total_distance > 0 && n > 1 {
            let r = reachable as f64;
            closeness[s] = (r / (n - 1) as f64) * (r / total_distance as f64);
        }

        let mut delta = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                betweenness[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = ((n - 1) * (n - 2)) as f64;
        for value in &mut betweenness {
            *value /= scale;
        }
    }

    PathScores {
        betweenness,
        closeness,
        max_depth,
    }
}

/// Strongly connected components with more than one node, plus self-loops
fn cycle_count(graph: &CodeGraph, adjacency: &[Vec<usize>]) -> usize {
    let multi_node = tarjan_scc(&graph.graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .count();
    let self_loops = adjacency
        .iter()
        .enumerate()
        .filter(|(v, out)| out.contains(v))
        .count();
    multi_node + self_loops
}
