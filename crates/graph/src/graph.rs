use crate::types::{CodeGraph, EdgeView, RelationType};
use codescope_protocol::NodeId;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::VecDeque;

impl CodeGraph {
    /// Outgoing edges of a node, ordered by (target, relation)
    #[must_use]
    pub fn outgoing(&self, node: NodeId) -> Vec<EdgeView> {
        self.edge_views(node, Direction::Outgoing)
    }

    /// Incoming edges of a node, ordered by (source, relation)
    #[must_use]
    pub fn incoming(&self, node: NodeId) -> Vec<EdgeView> {
        self.edge_views(node, Direction::Incoming)
    }

    /// Sources of incoming edges whose relation is one of `relations`
    #[must_use]
    pub fn incoming_sources(&self, node: NodeId, relations: &[RelationType]) -> Vec<NodeId> {
        let mut sources: Vec<NodeId> = self
            .incoming(node)
            .into_iter()
            .filter(|e| relations.contains(&e.relation))
            .map(|e| e.source)
            .collect();
        sources.dedup();
        sources
    }

    /// Targets of outgoing edges whose relation is one of `relations`
    #[must_use]
    pub fn outgoing_targets(&self, node: NodeId, relations: &[RelationType]) -> Vec<NodeId> {
        let mut targets: Vec<NodeId> = self
            .outgoing(node)
            .into_iter()
            .filter(|e| relations.contains(&e.relation))
            .map(|e| e.target)
            .collect();
        targets.dedup();
        targets
    }

    /// In + out edge count
    #[must_use]
    pub fn degree(&self, node: NodeId) -> usize {
        if !self.contains(node) {
            return 0;
        }
        let idx = Self::index(node);
        self.graph.edges_directed(idx, Direction::Outgoing).count()
            + self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    /// Nodes reachable along outgoing edges within `max_depth` hops, in BFS
    /// discovery order, excluding `node` itself.
    #[must_use]
    pub fn find_dependencies(&self, node: NodeId, max_depth: usize) -> Vec<NodeId> {
        self.bounded_bfs(node, max_depth, Direction::Outgoing)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    /// Nodes reaching `node` along incoming edges within `max_depth` hops, in
    /// BFS discovery order, excluding `node` itself.
    #[must_use]
    pub fn find_dependents(&self, node: NodeId, max_depth: usize) -> Vec<NodeId> {
        self.bounded_bfs(node, max_depth, Direction::Incoming)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    /// Like [`Self::find_dependents`] but keeps the hop distance of each node
    #[must_use]
    pub fn dependents_with_distance(&self, node: NodeId, max_depth: usize) -> Vec<(NodeId, usize)> {
        self.bounded_bfs(node, max_depth, Direction::Incoming)
    }

    /// Distinct neighbor ids in one direction, ascending
    pub(crate) fn neighbor_ids(&self, node: NodeId, direction: Direction) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .graph
            .edges_directed(Self::index(node), direction)
            .map(|e| match direction {
                Direction::Outgoing => self.graph[e.target()].id,
                Direction::Incoming => self.graph[e.source()].id,
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn bounded_bfs(
        &self,
        start: NodeId,
        max_depth: usize,
        direction: Direction,
    ) -> Vec<(NodeId, usize)> {
        if !self.contains(start) || max_depth == 0 {
            return Vec::new();
        }

        let mut visited = vec![false; self.node_count()];
        visited[start.index()] = true;
        let mut result = Vec::new();
        let mut queue = VecDeque::from([(start, 0usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth == max_depth {
                continue;
            }
            for next in self.neighbor_ids(current, direction) {
                if visited[next.index()] {
                    continue;
                }
                visited[next.index()] = true;
                result.push((next, depth + 1));
                queue.push_back((next, depth + 1));
            }
        }

        result
    }

    fn edge_views(&self, node: NodeId, direction: Direction) -> Vec<EdgeView> {
        if !self.contains(node) {
            return Vec::new();
        }
        let mut edges: Vec<EdgeView> = self
            .graph
            .edges_directed(Self::index(node), direction)
            .map(|e| EdgeView {
                source: self.graph[e.source()].id,
                target: self.graph[e.target()].id,
                relation: e.weight().relation,
                weight: e.weight().weight,
            })
            .collect();
        edges.sort_by(|a, b| {
            let (ka, kb) = match direction {
                Direction::Outgoing => (a.target, b.target),
                Direction::Incoming => (a.source, b.source),
            };
            ka.cmp(&kb).then_with(|| a.relation.cmp(&b.relation))
        });
        edges
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{CodeGraph, ExtractedNode, NodeType, RelationType};
    use codescope_protocol::NodeId;

    fn chain(len: usize) -> (CodeGraph, Vec<NodeId>) {
        let mut graph = CodeGraph::new();
        let ids: Vec<NodeId> = (0..len)
            .map(|i| {
                graph.add_node(ExtractedNode::new(format!("f{i}"), NodeType::Function).file("a.rs"))
            })
            .collect();
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1], RelationType::Calls, 1.0);
        }
        (graph, ids)
    }

    #[test]
    fn bfs_respects_depth_bound() {
        let (graph, ids) = chain(5);
        assert_eq!(graph.find_dependencies(ids[0], 2), vec![ids[1], ids[2]]);
        assert_eq!(graph.find_dependencies(ids[0], 10), ids[1..].to_vec());
        assert!(graph.find_dependencies(ids[0], 0).is_empty());
        assert_eq!(graph.find_dependents(ids[4], 1), vec![ids[3]]);
    }

    #[test]
    fn bfs_excludes_start_even_in_cycles() {
        let (mut graph, ids) = chain(3);
        graph.add_edge(ids[2], ids[0], RelationType::Calls, 1.0);
        let deps = graph.find_dependencies(ids[0], 5);
        assert_eq!(deps, vec![ids[1], ids[2]]);
    }

    #[test]
    fn bfs_visits_neighbors_in_id_order() {
        let mut graph = CodeGraph::new();
        let root = graph.add_node(ExtractedNode::new("root", NodeType::Module).file("m.rs"));
        let c = graph.add_node(ExtractedNode::new("c", NodeType::Function).file("m.rs"));
        let b = graph.add_node(ExtractedNode::new("b", NodeType::Function).file("m.rs"));
        let a = graph.add_node(ExtractedNode::new("a", NodeType::Function).file("m.rs"));
        graph.add_edge(root, a, RelationType::Contains, 1.0);
        graph.add_edge(root, c, RelationType::Contains, 1.0);
        graph.add_edge(root, b, RelationType::Uses, 1.0);
        graph.add_edge(root, b, RelationType::Contains, 1.0);

        assert_eq!(graph.find_dependencies(root, 1), vec![c, b, a]);
    }

    #[test]
    fn unknown_start_yields_nothing() {
        let (graph, _) = chain(2);
        assert!(graph.find_dependencies(NodeId(42), 3).is_empty());
        assert_eq!(graph.degree(NodeId(42)), 0);
    }
}
