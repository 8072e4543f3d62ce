//! Rule-based structural pattern detection.
//!
//! Rules live in a [`PatternRegistry`]; new shapes are added by registering
//! another [`PatternRule`], the registry itself knows nothing about them.

use crate::types::{CodeGraph, CodeNode, NodeType, RelationType};
use codescope_protocol::NodeId;
use serde::{Deserialize, Serialize};

/// A pattern tag detected on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub tag: String,
    pub rule: String,
    pub confidence: f64,
}

/// One structural signature
pub trait PatternRule: Send + Sync {
    /// Unique rule name, used in explanations
    fn name(&self) -> &str;

    /// Tag attached to nodes this rule matches
    fn tag(&self) -> &str;

    /// Confidence in 0..=1 when `node` matches, `None` otherwise
    fn detect(&self, graph: &CodeGraph, node: &CodeNode) -> Option<f64>;
}

/// Registry of pattern rules
pub struct PatternRegistry {
    rules: Vec<Box<dyn PatternRule>>,
}

impl PatternRegistry {
    /// Registry without any rule
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Registry with the built-in naming and structural rules
    #[must_use]
    pub fn with_default_rules() -> Self {
        let mut registry = Self::empty();
        for (tag, suffixes) in DEFAULT_NAMING_CONVENTIONS {
            registry.register(NamingConventionRule::new(tag, suffixes));
        }
        registry.register(MultiImplementorRule::default());
        registry.register(RelationShapeRule::incoming(
            "observer",
            RelationType::Observes,
        ));
        registry.register(RelationShapeRule::outgoing(
            "decorator",
            RelationType::Decorates,
        ));
        registry.register(CompositeRule);
        registry
    }

    pub fn register(&mut self, rule: impl PatternRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every tag some rule can produce, sorted and deduplicated
    #[must_use]
    pub fn known_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.rules.iter().map(|r| r.tag().to_string()).collect();
        tags.sort();
        tags.dedup();
        tags
    }

    /// Run every rule against `node`. One match per tag, highest confidence wins.
    #[must_use]
    pub fn detect_patterns(&self, graph: &CodeGraph, node: NodeId) -> Vec<PatternMatch> {
        let Some(code_node) = graph.node(node) else {
            return Vec::new();
        };

        let mut matches: Vec<PatternMatch> = Vec::new();
        for rule in &self.rules {
            let Some(confidence) = rule.detect(graph, code_node) else {
                continue;
            };
            match matches.iter_mut().find(|m| m.tag == rule.tag()) {
                Some(existing) if existing.confidence >= confidence => {}
                Some(existing) => {
                    existing.confidence = confidence;
                    existing.rule = rule.name().to_string();
                }
                None => matches.push(PatternMatch {
                    tag: rule.tag().to_string(),
                    rule: rule.name().to_string(),
                    confidence,
                }),
            }
        }

        matches.sort_by(|a, b| a.tag.cmp(&b.tag));
        matches
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

const DEFAULT_NAMING_CONVENTIONS: &[(&str, &[&str])] = &[
    ("factory", &["Factory"]),
    ("builder", &["Builder"]),
    ("adapter", &["Adapter", "Wrapper"]),
    ("observer", &["Observer", "Listener", "Subscriber"]),
    ("strategy", &["Strategy", "Policy"]),
    ("repository", &["Repository", "Repo", "Store"]),
    ("service", &["Service"]),
    ("controller", &["Controller"]),
    ("handler", &["Handler"]),
    ("visitor", &["Visitor"]),
    ("decorator", &["Decorator"]),
];

/// Name suffix convention (`UserFactory`, `user_factory`).
///
/// Confidence rises when other nodes follow the same convention.
pub struct NamingConventionRule {
    name: String,
    tag: String,
    suffixes: Vec<String>,
}

impl NamingConventionRule {
    #[must_use]
    pub fn new(tag: &str, suffixes: &[&str]) -> Self {
        Self {
            name: format!("naming:{tag}"),
            tag: tag.to_string(),
            suffixes: suffixes.iter().map(|s| s.to_ascii_lowercase()).collect(),
        }
    }

    fn matches_name(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.suffixes
            .iter()
            .any(|suffix| lower.len() > suffix.len() && lower.ends_with(suffix.as_str()))
    }
}

impl PatternRule for NamingConventionRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn detect(&self, graph: &CodeGraph, node: &CodeNode) -> Option<f64> {
        if !self.matches_name(&node.name) {
            return None;
        }
        let peers = graph
            .nodes()
            .filter(|other| other.id != node.id && self.matches_name(&other.name))
            .count();
        Some(if peers > 0 { 0.7 } else { 0.6 })
    }
}

/// One interface (or abstract class) with several implementors
pub struct MultiImplementorRule {
    min_implementors: usize,
}

impl Default for MultiImplementorRule {
    fn default() -> Self {
        Self {
            min_implementors: 2,
        }
    }
}

impl MultiImplementorRule {
    fn is_abstraction(node: &CodeNode) -> bool {
        node.node_type == NodeType::Interface || node.is_abstract
    }

    fn implementors(graph: &CodeGraph, node: NodeId) -> usize {
        graph
            .incoming_sources(node, &[RelationType::Implements, RelationType::Extends])
            .len()
    }
}

impl PatternRule for MultiImplementorRule {
    fn name(&self) -> &str {
        "structure:multi-implementor"
    }

    fn tag(&self) -> &str {
        "strategy"
    }

    fn detect(&self, graph: &CodeGraph, node: &CodeNode) -> Option<f64> {
        if Self::is_abstraction(node) && Self::implementors(graph, node.id) >= self.min_implementors
        {
            return Some(0.8);
        }

        let implements_shared = graph
            .outgoing_targets(node.id, &[RelationType::Implements, RelationType::Extends])
            .into_iter()
            .filter_map(|target| graph.node(target))
            .any(|target| {
                Self::is_abstraction(target)
                    && Self::implementors(graph, target.id) >= self.min_implementors
            });
        implements_shared.then_some(0.6)
    }
}

/// Node with at least one edge of a given relation in a given direction
pub struct RelationShapeRule {
    name: String,
    tag: String,
    relation: RelationType,
    incoming: bool,
}

impl RelationShapeRule {
    #[must_use]
    pub fn incoming(tag: &str, relation: RelationType) -> Self {
        Self {
            name: format!("structure:incoming-{relation}"),
            tag: tag.to_string(),
            relation,
            incoming: true,
        }
    }

    #[must_use]
    pub fn outgoing(tag: &str, relation: RelationType) -> Self {
        Self {
            name: format!("structure:outgoing-{relation}"),
            tag: tag.to_string(),
            relation,
            incoming: false,
        }
    }
}

impl PatternRule for RelationShapeRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn detect(&self, graph: &CodeGraph, node: &CodeNode) -> Option<f64> {
        let found = if self.incoming {
            !graph.incoming_sources(node.id, &[self.relation]).is_empty()
        } else {
            !graph.outgoing_targets(node.id, &[self.relation]).is_empty()
        };
        found.then_some(0.75)
    }
}

/// Implements a type and also holds instances of it
pub struct CompositeRule;

impl PatternRule for CompositeRule {
    fn name(&self) -> &str {
        "structure:composite"
    }

    fn tag(&self) -> &str {
        "composite"
    }

    fn detect(&self, graph: &CodeGraph, node: &CodeNode) -> Option<f64> {
        let supertypes =
            graph.outgoing_targets(node.id, &[RelationType::Implements, RelationType::Extends]);
        let parts =
            graph.outgoing_targets(node.id, &[RelationType::Composes, RelationType::Aggregates]);
        supertypes
            .iter()
            .any(|s| parts.contains(s))
            .then_some(0.8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtractedNode;

    fn add(graph: &mut CodeGraph, name: &str, ty: NodeType) -> NodeId {
        graph.add_node(ExtractedNode::new(name, ty).file("p.ts"))
    }

    #[test]
    fn detects_naming_convention_clusters() {
        let mut graph = CodeGraph::new();
        let user = add(&mut graph, "UserFactory", NodeType::Class);
        let order = add(&mut graph, "OrderFactory", NodeType::Class);
        let plain = add(&mut graph, "Factory", NodeType::Class);

        let registry = PatternRegistry::with_default_rules();
        let found = registry.detect_patterns(&graph, user);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tag, "factory");
        assert!((found[0].confidence - 0.7).abs() < 1e-12);
        assert_eq!(registry.detect_patterns(&graph, order)[0].tag, "factory");
        // the bare suffix is not a convention
        assert!(registry.detect_patterns(&graph, plain).is_empty());
    }

    #[test]
    fn detects_single_interface_with_many_implementors() {
        let mut graph = CodeGraph::new();
        let iface = add(&mut graph, "Compressor", NodeType::Interface);
        let gzip = add(&mut graph, "Gzip", NodeType::Class);
        let zstd = add(&mut graph, "Zstd", NodeType::Class);
        graph.add_edge(gzip, iface, RelationType::Implements, 1.0);
        graph.add_edge(zstd, iface, RelationType::Implements, 1.0);

        let registry = PatternRegistry::with_default_rules();
        let on_iface = registry.detect_patterns(&graph, iface);
        assert_eq!(on_iface[0].tag, "strategy");
        assert!((on_iface[0].confidence - 0.8).abs() < 1e-12);
        let on_impl = registry.detect_patterns(&graph, gzip);
        assert_eq!(on_impl[0].tag, "strategy");
        assert!((on_impl[0].confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn custom_rules_can_be_registered() {
        struct StaticRule;
        impl PatternRule for StaticRule {
            fn name(&self) -> &str {
                "custom:static"
            }
            fn tag(&self) -> &str {
                "singleton"
            }
            fn detect(&self, _graph: &CodeGraph, node: &CodeNode) -> Option<f64> {
                node.is_static.then_some(0.5)
            }
        }

        let mut graph = CodeGraph::new();
        let id = graph.add_node(ExtractedNode::new("INSTANCE", NodeType::Variable).static_());

        let mut registry = PatternRegistry::empty();
        registry.register(StaticRule);
        assert_eq!(registry.known_tags(), vec!["singleton".to_string()]);
        assert_eq!(registry.detect_patterns(&graph, id)[0].rule, "custom:static");
    }

    #[test]
    fn composite_and_relation_shapes() {
        let mut graph = CodeGraph::new();
        let component = add(&mut graph, "Widget", NodeType::Interface);
        let panel = add(&mut graph, "Panel", NodeType::Class);
        let logger = add(&mut graph, "Logged", NodeType::Function);
        graph.add_edge(panel, component, RelationType::Implements, 1.0);
        graph.add_edge(panel, component, RelationType::Aggregates, 1.0);
        graph.add_edge(logger, panel, RelationType::Decorates, 1.0);

        let registry = PatternRegistry::with_default_rules();
        let tags: Vec<String> = registry
            .detect_patterns(&graph, panel)
            .into_iter()
            .map(|m| m.tag)
            .collect();
        assert_eq!(tags, vec!["composite".to_string()]);
        assert_eq!(registry.detect_patterns(&graph, logger)[0].tag, "decorator");
    }
}
