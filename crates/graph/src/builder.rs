use crate::types::{CodeGraph, ExtractedNode, RelationType};
use codescope_protocol::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbolic reference to an entity, bound to a node during resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolRef {
    pub name: String,
    /// `None` lets resolution search every file
    #[serde(default)]
    pub file_path: Option<String>,
}

impl SymbolRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_path: None,
        }
    }

    pub fn in_file(name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_path: Some(file_path.into()),
        }
    }
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_path {
            Some(path) => write!(f, "{path}::{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Relation as emitted by an extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelation {
    /// Source symbol; a missing file means the file being extracted
    pub source: SymbolRef,
    pub target: SymbolRef,
    pub relation: RelationType,
    #[serde(default)]
    pub weight: Option<f32>,
}

impl ExtractedRelation {
    pub fn new(source: SymbolRef, relation: RelationType, target: SymbolRef) -> Self {
        Self {
            source,
            target,
            relation,
            weight: None,
        }
    }
}

/// Output of one extractor run over one file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub nodes: Vec<ExtractedNode>,
    pub relations: Vec<ExtractedRelation>,
}

/// A relation that could not be bound to concrete nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionWarning {
    pub file_path: String,
    pub source: SymbolRef,
    pub target: SymbolRef,
    pub relation: RelationType,
    pub reason: String,
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} {} dropped ({})",
            self.file_path, self.source, self.relation, self.target, self.reason
        )
    }
}

/// Graph produced by a build pass plus everything that was dropped on the way
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub graph: CodeGraph,
    pub warnings: Vec<ResolutionWarning>,
    pub files: usize,
}

/// Build a code graph from per-file extractor output.
///
/// Nodes are registered as files arrive; relations are queued and bound in
/// one resolution pass once every file has been added, since a reference
/// may point at a file that has not been seen yet.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: CodeGraph,
    pending: Vec<(String, ExtractedRelation)>,
    files: usize,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the nodes of one file and queue its relations
    pub fn add_file(&mut self, file_path: &str, extraction: Extraction) {
        self.files += 1;
        for mut node in extraction.nodes {
            if node.file_path.is_empty() {
                node.file_path = file_path.to_string();
            }
            self.graph.add_node(node);
        }
        self.pending.extend(
            extraction
                .relations
                .into_iter()
                .map(|rel| (file_path.to_string(), rel)),
        );
    }

    /// Add a node directly; deduplicated by (name, file)
    pub fn add_node(&mut self, node: ExtractedNode) -> NodeId {
        self.graph.add_node(node)
    }

    /// Add an edge between known nodes; unknown endpoints are dropped with a warning
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        relation: RelationType,
        weight: f32,
    ) -> bool {
        self.graph.add_edge(source, target, relation, weight)
    }

    /// Run the resolution pass and hand out the finished graph
    #[must_use]
    pub fn finish(mut self) -> BuiltGraph {
        let pending = std::mem::take(&mut self.pending);
        let mut warnings = Vec::new();
        let mut resolved = 0usize;

        for (file_path, rel) in pending {
            let source = self.resolve(&rel.source, &file_path, true);
            let target = self.resolve(&rel.target, &file_path, false);

            match (source, target) {
                (Ok(source), Ok(target)) => {
                    let weight = rel.weight.unwrap_or(1.0);
                    if self.graph.add_edge(source, target, rel.relation, weight) {
                        resolved += 1;
                    }
                }
                (Err(reason), _) | (_, Err(reason)) => {
                    let warning = ResolutionWarning {
                        file_path,
                        source: rel.source,
                        target: rel.target,
                        relation: rel.relation,
                        reason,
                    };
                    log::warn!("Unresolved relation: {warning}");
                    warnings.push(warning);
                }
            }
        }

        log::info!(
            "Built code graph: {} nodes, {} edges ({} relations resolved, {} dropped)",
            self.graph.node_count(),
            self.graph.edge_count(),
            resolved,
            warnings.len()
        );

        BuiltGraph {
            graph: self.graph,
            warnings,
            files: self.files,
        }
    }

    fn resolve(
        &self,
        reference: &SymbolRef,
        origin_file: &str,
        is_source: bool,
    ) -> std::result::Result<NodeId, String> {
        let explicit_file = reference
            .file_path
            .as_deref()
            .or(is_source.then_some(origin_file));

        if let Some(file) = explicit_file {
            return self
                .graph
                .find_node(file, &reference.name)
                .ok_or_else(|| format!("no node named `{}` in {file}", reference.name));
        }

        let candidates = self.graph.find_by_name(&reference.name);
        match candidates {
            [] => Err(format!("unknown symbol `{}`", reference.name)),
            [only] => Ok(*only),
            many => {
                if let Some(local) = many.iter().copied().find(|id| {
                    self.graph
                        .node(*id)
                        .is_some_and(|n| n.file_path == origin_file)
                }) {
                    return Ok(local);
                }
                log::debug!(
                    "Ambiguous reference `{}` from {origin_file}: {} candidates, using lowest id",
                    reference.name,
                    many.len()
                );
                Ok(many[0])
            }
        }
    }
}
