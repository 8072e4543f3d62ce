use codescope_protocol::NodeId;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Kind of code entity a node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Class,
    Function,
    Interface,
    Module,
    Variable,
    Enum,
}

impl NodeType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Function => "function",
            Self::Interface => "interface",
            Self::Module => "module",
            Self::Variable => "variable",
            Self::Enum => "enum",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
    Internal,
}

/// Typed relationship between two nodes.
///
/// An edge `a -> b` reads "a <relation> b": `a calls b`, `a extends b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Extends,
    Implements,
    Imports,
    Calls,
    Uses,
    Contains,
    Aggregates,
    Composes,
    Associates,
    DependsOn,
    Overrides,
    Decorates,
    Observes,
    Throws,
    Catches,
}

impl RelationType {
    pub const ALL: [Self; 15] = [
        Self::Extends,
        Self::Implements,
        Self::Imports,
        Self::Calls,
        Self::Uses,
        Self::Contains,
        Self::Aggregates,
        Self::Composes,
        Self::Associates,
        Self::DependsOn,
        Self::Overrides,
        Self::Decorates,
        Self::Observes,
        Self::Throws,
        Self::Catches,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extends => "extends",
            Self::Implements => "implements",
            Self::Imports => "imports",
            Self::Calls => "calls",
            Self::Uses => "uses",
            Self::Contains => "contains",
            Self::Aggregates => "aggregates",
            Self::Composes => "composes",
            Self::Associates => "associates",
            Self::DependsOn => "depends_on",
            Self::Overrides => "overrides",
            Self::Decorates => "decorates",
            Self::Observes => "observes",
            Self::Throws => "throws",
            Self::Catches => "catches",
        }
    }

    /// Supertype relations (`extends`, `implements`)
    #[must_use]
    pub const fn is_inheritance(self) -> bool {
        matches!(self, Self::Extends | Self::Implements)
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive 1-based line range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Entity as emitted by an extractor, before it gets an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedNode {
    pub name: String,
    pub node_type: NodeType,
    /// Left empty by extractors that only see one file; filled in by the builder
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub lines: LineRange,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_static: bool,
}

impl ExtractedNode {
    pub fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            file_path: String::new(),
            lines: LineRange::default(),
            signature: None,
            visibility: Visibility::default(),
            is_abstract: false,
            is_static: false,
        }
    }

    #[must_use]
    pub fn file(mut self, path: impl Into<String>) -> Self {
        self.file_path = path.into();
        self
    }

    #[must_use]
    pub const fn lines(mut self, start: usize, end: usize) -> Self {
        self.lines = LineRange::new(start, end);
        self
    }

    #[must_use]
    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    #[must_use]
    pub const fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub const fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    #[must_use]
    pub const fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// A node of the code graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeNode {
    pub id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    pub file_path: String,
    pub lines: LineRange,
    pub signature: Option<String>,
    pub visibility: Visibility,
    pub is_abstract: bool,
    pub is_static: bool,
}

impl CodeNode {
    /// Id of the search document that indexes this node
    #[must_use]
    pub fn document_id(&self) -> String {
        document_id(&self.file_path, &self.name)
    }
}

/// Document id shared by the graph and the search index
#[must_use]
pub fn document_id(file_path: &str, name: &str) -> String {
    format!("{file_path}::{name}")
}

/// Edge payload stored in the graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CodeEdge {
    pub relation: RelationType,
    pub weight: f32,
}

/// Edge with its endpoints resolved to node ids
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    pub source: NodeId,
    pub target: NodeId,
    pub relation: RelationType,
    pub weight: f32,
}

/// Directed multigraph of code entities
#[derive(Debug, Clone, Default)]
pub struct CodeGraph {
    pub(crate) graph: DiGraph<CodeNode, CodeEdge>,
    by_key: HashMap<(String, String), NodeId>,
    by_name: HashMap<String, Vec<NodeId>>,
    edge_keys: HashSet<(NodeId, NodeId, RelationType)>,
}

impl CodeGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, or return the id of the node already registered under the
    /// same (name, file) pair.
    pub fn add_node(&mut self, node: ExtractedNode) -> NodeId {
        let key = (node.file_path.clone(), node.name.clone());
        if let Some(&existing) = self.by_key.get(&key) {
            return existing;
        }

        #[allow(clippy::cast_possible_truncation)]
        let id = NodeId(self.graph.node_count() as u32);
        let idx = self.graph.add_node(CodeNode {
            id,
            name: node.name,
            node_type: node.node_type,
            file_path: node.file_path,
            lines: node.lines,
            signature: node.signature,
            visibility: node.visibility,
            is_abstract: node.is_abstract,
            is_static: node.is_static,
        });
        debug_assert_eq!(idx.index(), id.index());

        self.by_name.entry(key.1.clone()).or_default().push(id);
        self.by_key.insert(key, id);
        id
    }

    /// Add a typed edge. Returns `false` when either endpoint is unknown or
    /// the same (source, target, relation) edge already exists.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        relation: RelationType,
        weight: f32,
    ) -> bool {
        if !self.contains(source) || !self.contains(target) {
            log::warn!("Dropping {relation} edge {source} -> {target}: unknown endpoint");
            return false;
        }
        if !self.edge_keys.insert((source, target, relation)) {
            return false;
        }
        self.graph.add_edge(
            Self::index(source),
            Self::index(target),
            CodeEdge { relation, weight },
        );
        true
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.graph.node_count()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&CodeNode> {
        self.graph.node_weight(Self::index(id))
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &CodeNode> {
        self.graph.node_weights()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = EdgeView> + '_ {
        self.graph.raw_edges().iter().map(|e| EdgeView {
            source: self.graph[e.source()].id,
            target: self.graph[e.target()].id,
            relation: e.weight.relation,
            weight: e.weight.weight,
        })
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn find_node(&self, file_path: &str, name: &str) -> Option<NodeId> {
        self.by_key
            .get(&(file_path.to_string(), name.to_string()))
            .copied()
    }

    /// All nodes carrying `name`, in id order
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> &[NodeId] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Resolve a search document id (`path::name`) back to its node
    #[must_use]
    pub fn find_by_document_id(&self, document_id: &str) -> Option<NodeId> {
        let (path, name) = document_id.split_once("::")?;
        self.find_node(path, name)
    }

    pub(crate) fn index(id: NodeId) -> NodeIndex {
        NodeIndex::new(id.index())
    }
}
