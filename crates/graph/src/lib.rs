//! # Codescope Graph
//!
//! Structural signals for code retrieval: a directed multigraph of code
//! entities with centrality, clustering and pattern tags.
//!
//! ## Architecture
//!
//! ```text
//! Extraction[] (per file, from pluggable extractors)
//!     │
//!     ├──> Graph Builder
//!     │      ├─ Register nodes, dedup by (name, file)
//!     │      └─ Resolution pass: bind symbolic references to node ids
//!     │
//!     ├──> Metrics (batch)
//!     │      ├─ Degree, pagerank (power iteration)
//!     │      ├─ Betweenness / closeness (BFS shortest paths)
//!     │      └─ Clusters: cohesion, coupling, roles
//!     │
//!     └──> GraphSnapshot (immutable, shared via SnapshotStore)
//!            ├─ find_dependencies / find_dependents
//!            ├─ metadata(node, hops)
//!            └─ pattern tags
//! ```

mod builder;
mod cluster;
mod error;
mod graph;
mod metrics;
mod patterns;
mod snapshot;
mod types;

pub use builder::{
    BuiltGraph, ExtractedRelation, Extraction, GraphBuilder, ResolutionWarning, SymbolRef,
};
pub use cluster::{compute_clusters, Cluster, ClusterConfig, ClusterRole, ClusterTable};
pub use codescope_protocol::NodeId;
pub use error::{GraphError, Result};
pub use metrics::{
    compute_metrics, Centrality, GraphMetrics, GraphStats, MetricsConfig, PageRankConfig,
};
pub use patterns::{
    CompositeRule, MultiImplementorRule, NamingConventionRule, PatternMatch, PatternRegistry,
    PatternRule, RelationShapeRule,
};
pub use snapshot::{
    ClusterMembership, DirectRelations, GraphMetadata, GraphSnapshot, IndirectRelations,
    SnapshotStore,
};
pub use types::{
    document_id, CodeEdge, CodeGraph, CodeNode, EdgeView, ExtractedNode, LineRange, NodeType,
    RelationType, Visibility,
};
