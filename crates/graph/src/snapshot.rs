use crate::cluster::ClusterRole;
use crate::error::{GraphError, Result};
use crate::metrics::{compute_metrics, Centrality, GraphMetrics, MetricsConfig};
use crate::patterns::{PatternMatch, PatternRegistry};
use crate::types::{CodeGraph, CodeNode, EdgeView, RelationType};
use codescope_protocol::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Typed edges touching a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectRelations {
    pub incoming: Vec<EdgeView>,
    pub outgoing: Vec<EdgeView>,
}

/// Nodes reachable within a hop bound
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectRelations {
    pub dependencies: Vec<NodeId>,
    pub dependents: Vec<NodeId>,
    /// Nodes sharing a container or a direct supertype (two hops away)
    pub siblings: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterMembership {
    pub id: usize,
    pub cohesion: f64,
    pub coupling: f64,
    pub role: ClusterRole,
}

/// Everything the graph knows about one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub node_id: NodeId,
    pub direct: DirectRelations,
    pub indirect: IndirectRelations,
    pub centrality: Centrality,
    pub cluster: ClusterMembership,
    pub patterns: Vec<PatternMatch>,
}

/// Immutable graph plus its derived metrics, served to concurrent readers
#[derive(Debug, Default)]
pub struct GraphSnapshot {
    version: u64,
    graph: CodeGraph,
    metrics: GraphMetrics,
    patterns: Vec<Vec<PatternMatch>>,
}

impl GraphSnapshot {
    /// Compute metrics and pattern tags for a finished graph
    #[must_use]
    pub fn build(
        graph: CodeGraph,
        config: &MetricsConfig,
        registry: &PatternRegistry,
        version: u64,
    ) -> Self {
        let metrics = compute_metrics(&graph, config);
        let patterns = graph
            .nodes()
            .map(|node| registry.detect_patterns(&graph, node.id))
            .collect();
        Self {
            version,
            graph,
            metrics,
            patterns,
        }
    }

    /// Version 0, no nodes
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub const fn graph(&self) -> &CodeGraph {
        &self.graph
    }

    #[must_use]
    pub const fn metrics(&self) -> &GraphMetrics {
        &self.metrics
    }

    pub fn require_node(&self, node: NodeId) -> Result<&CodeNode> {
        self.graph.node(node).ok_or(GraphError::NodeNotFound(node))
    }

    /// Resolve a symbol by name, optionally pinned to a file
    pub fn resolve_symbol(&self, name: &str, file_path: Option<&str>) -> Result<NodeId> {
        let found = match file_path {
            Some(path) => self.graph.find_node(path, name),
            None => self.graph.find_by_name(name).first().copied(),
        };
        found.ok_or_else(|| GraphError::SymbolNotFound(name.to_string()))
    }

    /// Pattern matches detected on `node`, sorted by tag
    #[must_use]
    pub fn patterns(&self, node: NodeId) -> &[PatternMatch] {
        self.patterns.get(node.index()).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn has_pattern(&self, node: NodeId, tag: &str) -> bool {
        self.patterns(node).iter().any(|m| m.tag == tag)
    }

    /// Derived metadata of one node; relation sets are bounded by `max_hops`
    #[must_use]
    pub fn metadata(&self, node: NodeId, max_hops: usize) -> Option<GraphMetadata> {
        self.graph.node(node)?;
        let cluster = self.metrics.clusters.cluster_of(node)?;

        Some(GraphMetadata {
            node_id: node,
            direct: DirectRelations {
                incoming: self.graph.incoming(node),
                outgoing: self.graph.outgoing(node),
            },
            indirect: IndirectRelations {
                dependencies: self.graph.find_dependencies(node, max_hops),
                dependents: self.graph.find_dependents(node, max_hops),
                siblings: if max_hops >= 2 {
                    self.siblings(node)
                } else {
                    Vec::new()
                },
            },
            centrality: self.metrics.centrality(node).copied().unwrap_or_default(),
            cluster: ClusterMembership {
                id: cluster.id,
                cohesion: cluster.cohesion,
                coupling: cluster.coupling,
                role: self
                    .metrics
                    .clusters
                    .role_of(node)
                    .unwrap_or(ClusterRole::Peripheral),
            },
            patterns: self.patterns(node).to_vec(),
        })
    }

    fn siblings(&self, node: NodeId) -> Vec<NodeId> {
        let containers = self
            .graph
            .incoming_sources(node, &[RelationType::Contains]);
        let supertypes = self
            .graph
            .outgoing_targets(node, &[RelationType::Extends, RelationType::Implements]);

        let mut siblings: Vec<NodeId> = containers
            .into_iter()
            .flat_map(|parent| {
                self.graph
                    .outgoing_targets(parent, &[RelationType::Contains])
            })
            .chain(supertypes.into_iter().flat_map(|parent| {
                self.graph
                    .incoming_sources(parent, &[RelationType::Extends, RelationType::Implements])
            }))
            .filter(|&id| id != node)
            .collect();
        siblings.sort_unstable();
        siblings.dedup();
        siblings
    }
}

/// Holder of the snapshot currently served to queries.
///
/// Publishing replaces the shared pointer in one step; readers that already
/// hold an `Arc` keep using the snapshot they started with.
#[derive(Debug)]
pub struct SnapshotStore {
    tx: watch::Sender<Arc<GraphSnapshot>>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(initial: GraphSnapshot) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    /// Snapshot currently being served
    #[must_use]
    pub fn current(&self) -> Arc<GraphSnapshot> {
        self.tx.borrow().clone()
    }

    /// Version the next published snapshot should carry
    #[must_use]
    pub fn next_version(&self) -> u64 {
        self.tx.borrow().version() + 1
    }

    /// Swap in a new snapshot and return the one it replaced
    pub fn publish(&self, snapshot: GraphSnapshot) -> Arc<GraphSnapshot> {
        let version = snapshot.version();
        let previous = self.tx.send_replace(Arc::new(snapshot));
        log::info!(
            "Published graph snapshot v{version} (replacing v{})",
            previous.version()
        );
        previous
    }

    /// Receiver notified on every publication
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<GraphSnapshot>> {
        self.tx.subscribe()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(GraphSnapshot::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtractedNode, NodeType};
    use pretty_assertions::assert_eq;

    fn snapshot(version: u64) -> GraphSnapshot {
        let mut graph = CodeGraph::new();
        let module = graph.add_node(ExtractedNode::new("shapes", NodeType::Module).file("s.py"));
        let shape = graph.add_node(ExtractedNode::new("Shape", NodeType::Interface).file("s.py"));
        let circle = graph.add_node(ExtractedNode::new("Circle", NodeType::Class).file("s.py"));
        let square = graph.add_node(ExtractedNode::new("Square", NodeType::Class).file("s.py"));
        graph.add_edge(module, shape, RelationType::Contains, 1.0);
        graph.add_edge(module, circle, RelationType::Contains, 1.0);
        graph.add_edge(circle, shape, RelationType::Implements, 1.0);
        graph.add_edge(square, shape, RelationType::Implements, 1.0);
        GraphSnapshot::build(
            graph,
            &MetricsConfig::default(),
            &PatternRegistry::with_default_rules(),
            version,
        )
    }

    #[test]
    fn metadata_collects_relations_and_siblings() {
        let snap = snapshot(1);
        let circle = snap.graph().find_node("s.py", "Circle").unwrap();
        let meta = snap.metadata(circle, 2).unwrap();

        assert_eq!(meta.direct.outgoing.len(), 1);
        assert_eq!(meta.direct.incoming.len(), 1);
        assert_eq!(meta.indirect.dependencies, vec![NodeId(1)]);
        assert_eq!(meta.indirect.dependents, vec![NodeId(0)]);
        // Shape via the shared container, Square via the shared interface
        assert_eq!(meta.indirect.siblings, vec![NodeId(1), NodeId(3)]);
        assert!(snap.has_pattern(circle, "strategy"));

        let shallow = snap.metadata(circle, 1).unwrap();
        assert!(shallow.indirect.siblings.is_empty());
    }

    #[test]
    fn publish_swaps_atomically_and_keeps_old_readers_valid() {
        let store = SnapshotStore::default();
        assert_eq!(store.current().version(), 0);
        assert_eq!(store.next_version(), 1);

        let held = store.current();
        let previous = store.publish(snapshot(1));
        assert_eq!(previous.version(), 0);
        assert_eq!(store.current().version(), 1);
        assert_eq!(store.current().graph().node_count(), 4);
        // the reader that started before the swap still sees the old graph
        assert_eq!(held.graph().node_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_see_new_versions() {
        let store = SnapshotStore::default();
        let mut rx = store.subscribe();
        store.publish(snapshot(5));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().version(), 5);
    }
}
