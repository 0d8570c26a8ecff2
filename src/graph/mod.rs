//! Claim linkage graph and fraud ring detection.
//!
//! The graph is rebuilt for every run from the current claim and a bounded
//! window of stored claims that share at least one attribute with it.
//! Node 0 is always the current claim.

pub mod builder;
pub mod community;

use crate::attributes::{AttributeKind, ClaimAttribute};
use serde::Serialize;
use std::collections::BTreeSet;

pub use builder::ClaimGraphBuilder;
pub use community::{assess_ring, detect_communities, Community, RingAssessment, RingLink};

/// A claim and its normalized attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimGraphNode {
    pub claim_id: String,
    pub attributes: BTreeSet<ClaimAttribute>,
}

impl ClaimGraphNode {
    pub fn new(claim_id: impl Into<String>, attributes: BTreeSet<ClaimAttribute>) -> Self {
        Self {
            claim_id: claim_id.into(),
            attributes,
        }
    }

    /// Attribute types whose values this node shares with `other`
    pub fn shared_kinds(&self, other: &ClaimGraphNode) -> BTreeSet<AttributeKind> {
        self.attributes
            .intersection(&other.attributes)
            .map(|a| a.kind)
            .collect()
    }
}

/// Undirected edge between two node indices (`source < target`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimGraphEdge {
    pub source: usize,
    pub target: usize,
    /// Shared attribute types
    pub labels: BTreeSet<AttributeKind>,
}

impl ClaimGraphEdge {
    /// Number of shared attribute types
    pub fn weight(&self) -> usize {
        self.labels.len()
    }

    pub fn touches(&self, node: usize) -> bool {
        self.source == node || self.target == node
    }

    /// The endpoint opposite `node`
    pub fn other(&self, node: usize) -> usize {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }

    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|k| k.label().to_string()).collect()
    }
}

/// Per-run claim graph
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClaimGraph {
    pub nodes: Vec<ClaimGraphNode>,
    /// Sorted by (source, target)
    pub edges: Vec<ClaimGraphEdge>,
}

impl ClaimGraph {
    /// Index of the current claim
    pub const CURRENT: usize = 0;

    /// Build the graph for `current` against stored claims.
    ///
    /// History is ordered by claim id and deduplicated; any stored copy of
    /// the current claim is ignored.
    pub fn build(current: ClaimGraphNode, history: Vec<ClaimGraphNode>) -> Self {
        let mut history = history;
        history.retain(|node| node.claim_id != current.claim_id);
        history.sort_by(|a, b| a.claim_id.cmp(&b.claim_id));
        history.dedup_by(|a, b| a.claim_id == b.claim_id);

        let mut nodes = Vec::with_capacity(history.len() + 1);
        nodes.push(current);
        nodes.extend(history);

        let mut edges = Vec::new();
        for source in 0..nodes.len() {
            for target in (source + 1)..nodes.len() {
                let labels = nodes[source].shared_kinds(&nodes[target]);
                if !labels.is_empty() {
                    edges.push(ClaimGraphEdge {
                        source,
                        target,
                        labels,
                    });
                }
            }
        }

        Self { nodes, edges }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Edges incident to `node`, in edge order
    pub fn edges_of(&self, node: usize) -> impl Iterator<Item = &ClaimGraphEdge> + '_ {
        self.edges.iter().filter(move |e| e.touches(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, attrs: &[(AttributeKind, &str)]) -> ClaimGraphNode {
        ClaimGraphNode::new(
            id,
            attrs
                .iter()
                .map(|(kind, value)| ClaimAttribute::new(*kind, *value))
                .collect(),
        )
    }

    #[test]
    fn test_edges_carry_shared_labels() {
        let current = node(
            "CLM-0",
            &[(AttributeKind::Phone, "5550100"), (AttributeKind::Address, "1 elm st")],
        );
        let history = vec![
            node(
                "CLM-2",
                &[(AttributeKind::Phone, "5550100"), (AttributeKind::Address, "1 elm st")],
            ),
            node("CLM-1", &[(AttributeKind::Phone, "5559999")]),
        ];

        let graph = ClaimGraph::build(current, history);
        assert_eq!(graph.nodes[1].claim_id, "CLM-1");
        assert_eq!(graph.edges.len(), 1);

        let edge = &graph.edges[0];
        assert_eq!((edge.source, edge.target), (0, 2));
        assert_eq!(edge.weight(), 2);
        assert_eq!(edge.label_names(), vec!["shared_phone", "shared_address"]);
    }

    #[test]
    fn test_history_is_deduplicated_and_excludes_current() {
        let phone = [(AttributeKind::Phone, "5550100")];
        let graph = ClaimGraph::build(
            node("CLM-0", &phone),
            vec![node("CLM-1", &phone), node("CLM-0", &phone), node("CLM-1", &phone)],
        );
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edges_of(ClaimGraph::CURRENT).count(), 1);
    }
}
