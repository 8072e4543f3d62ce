//! Tests for graph building, traversal and snapshot metrics

use codescope_graph::{
    ClusterRole, CodeGraph, ExtractedNode, ExtractedRelation, Extraction, GraphBuilder,
    GraphSnapshot, MetricsConfig, NodeId, NodeType, PatternRegistry, RelationType, SymbolRef,
};
use pretty_assertions::assert_eq;

fn node(name: &str, ty: NodeType) -> ExtractedNode {
    ExtractedNode::new(name, ty).lines(1, 10)
}

fn rel(source: &str, relation: RelationType, target: &str) -> ExtractedRelation {
    ExtractedRelation::new(SymbolRef::named(source), relation, SymbolRef::named(target))
}

/// A small service layer: handlers call a service, the service uses a
/// repository interface with two implementations, and the module imports a
/// shared config module.
fn sample_files() -> Vec<(String, Extraction)> {
    vec![
        (
            "src/api/handlers.rs".to_string(),
            Extraction {
                nodes: vec![
                    node("create_user", NodeType::Function),
                    node("delete_user", NodeType::Function),
                ],
                relations: vec![
                    rel("create_user", RelationType::Calls, "UserService"),
                    rel("delete_user", RelationType::Calls, "UserService"),
                ],
            },
        ),
        (
            "src/domain/service.rs".to_string(),
            Extraction {
                nodes: vec![node("UserService", NodeType::Class)],
                relations: vec![
                    rel("UserService", RelationType::Uses, "UserRepository"),
                    rel("UserService", RelationType::Imports, "settings"),
                ],
            },
        ),
        (
            "src/domain/repo.rs".to_string(),
            Extraction {
                nodes: vec![
                    node("UserRepository", NodeType::Interface),
                    node("PgUserRepository", NodeType::Class),
                    node("MemUserRepository", NodeType::Class),
                ],
                relations: vec![
                    rel("PgUserRepository", RelationType::Implements, "UserRepository"),
                    rel("MemUserRepository", RelationType::Implements, "UserRepository"),
                    rel("PgUserRepository", RelationType::Uses, "Pool"),
                ],
            },
        ),
        (
            "src/config.rs".to_string(),
            Extraction {
                nodes: vec![node("settings", NodeType::Module)],
                relations: vec![],
            },
        ),
    ]
}

fn build_snapshot() -> (GraphSnapshot, usize) {
    let mut builder = GraphBuilder::new();
    for (path, extraction) in sample_files() {
        builder.add_file(&path, extraction);
    }
    let built = builder.finish();
    let warnings = built.warnings.len();
    let snapshot = GraphSnapshot::build(
        built.graph,
        &MetricsConfig::default(),
        &PatternRegistry::with_default_rules(),
        1,
    );
    (snapshot, warnings)
}

#[test]
fn test_build_counts_and_dropped_relation() {
    let (snapshot, warnings) = build_snapshot();
    assert_eq!(snapshot.graph().node_count(), 7);
    assert_eq!(snapshot.graph().edge_count(), 6);
    // `Pool` is never defined
    assert_eq!(warnings, 1);
}

#[test]
fn test_find_dependencies_within_depth() {
    let (snapshot, _) = build_snapshot();
    let graph = snapshot.graph();
    let handler = graph.find_node("src/api/handlers.rs", "create_user").unwrap();
    let service = graph.find_node("src/domain/service.rs", "UserService").unwrap();
    let repo = graph.find_node("src/domain/repo.rs", "UserRepository").unwrap();
    let settings = graph.find_node("src/config.rs", "settings").unwrap();

    assert_eq!(graph.find_dependencies(handler, 1), vec![service]);
    let two_hops = graph.find_dependencies(handler, 2);
    assert!(two_hops.contains(&repo));
    assert!(two_hops.contains(&settings));
    assert!(!graph.find_dependencies(handler, 1).contains(&repo));
}

#[test]
fn test_find_dependents() {
    let (snapshot, _) = build_snapshot();
    let graph = snapshot.graph();
    let repo = graph.find_node("src/domain/repo.rs", "UserRepository").unwrap();

    let direct = graph.find_dependents(repo, 1);
    assert_eq!(direct.len(), 3);
    let all = graph.find_dependents(repo, 3);
    assert_eq!(all.len(), 5);
}

#[test]
fn test_hub_ranks_highest() {
    let (snapshot, _) = build_snapshot();
    let graph = snapshot.graph();
    let repo = graph.find_node("src/domain/repo.rs", "UserRepository").unwrap();
    let handler = graph.find_node("src/api/handlers.rs", "create_user").unwrap();

    let metrics = snapshot.metrics();
    assert!(metrics.normalized_pagerank(repo) > metrics.normalized_pagerank(handler));
    assert_eq!(metrics.centrality(repo).unwrap().in_degree, 3);
}

#[test]
fn test_imports_split_clusters() {
    let (snapshot, _) = build_snapshot();
    let graph = snapshot.graph();
    let service = graph.find_node("src/domain/service.rs", "UserService").unwrap();
    let settings = graph.find_node("src/config.rs", "settings").unwrap();
    let clusters = &snapshot.metrics().clusters;

    assert_ne!(
        clusters.cluster_of(service).unwrap().id,
        clusters.cluster_of(settings).unwrap().id
    );
    let main = clusters.cluster_of(service).unwrap();
    assert_eq!(main.members.len(), 6);
    assert_eq!(main.external_edges, 1);
    assert_eq!(clusters.role_of(settings), Some(ClusterRole::Core));
}

#[test]
fn test_repository_implementations_tagged() {
    let (snapshot, _) = build_snapshot();
    let graph = snapshot.graph();
    let pg = graph.find_node("src/domain/repo.rs", "PgUserRepository").unwrap();
    let tags: Vec<&str> = snapshot.patterns(pg).iter().map(|m| m.tag.as_str()).collect();
    assert_eq!(tags, vec!["repository", "strategy"]);
}

#[test]
fn test_rebuild_is_deterministic() {
    let (first, _) = build_snapshot();
    let (second, _) = build_snapshot();

    assert_eq!(first.graph().node_count(), second.graph().node_count());
    assert_eq!(first.graph().edge_count(), second.graph().edge_count());
    for (a, b) in first
        .metrics()
        .centrality
        .iter()
        .zip(&second.metrics().centrality)
    {
        assert!((a.pagerank - b.pagerank).abs() < 1e-12);
        assert!((a.betweenness - b.betweenness).abs() < 1e-12);
        assert!((a.closeness - b.closeness).abs() < 1e-12);
        assert_eq!(a.degree, b.degree);
    }
}

#[test]
fn test_reachability_matches_path_length() {
    let mut graph = CodeGraph::new();
    let ids: Vec<NodeId> = (0..6)
        .map(|i| graph.add_node(ExtractedNode::new(format!("step{i}"), NodeType::Function)))
        .collect();
    for pair in ids.windows(2) {
        graph.add_edge(pair[0], pair[1], RelationType::DependsOn, 1.0);
    }

    for depth in 1..6 {
        let reach = graph.find_dependencies(ids[0], depth);
        assert_eq!(reach.len(), depth);
        assert!(reach.contains(&ids[depth]));
        if depth + 1 < ids.len() {
            assert!(!reach.contains(&ids[depth + 1]));
        }
    }
}
