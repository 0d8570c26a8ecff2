//! Community detection over the claim graph.
//!
//! Communities are the connected components with at least two members,
//! found with a union-find pass over the sorted edge list. Results depend
//! only on the graph, never on hashing or scheduling order.
//!
//! Cohesion is a weighted density: the shared attribute types summed over
//! internal edges, relative to every pair sharing every attribute type. Two
//! claims that only share a claimant name score 1/6, two that share a
//! phone and an address score 1/3.

use super::ClaimGraph;
use crate::attributes::AttributeKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// Densely linked group of claims
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Community {
    /// Position in detection order; the current claim's community comes first
    pub id: usize,
    /// Node indices, ascending
    pub nodes: Vec<usize>,
    /// Member claim ids, in node order
    pub members: Vec<String>,
    /// Edges with both endpoints inside the community
    pub internal_edges: usize,
    /// Shared attribute types summed over internal edges
    pub link_weight: usize,
    /// Link weight over the fully linked maximum (0.0 - 1.0)
    pub cohesion: f64,
}

impl Community {
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: usize) -> bool {
        self.nodes.binary_search(&node).is_ok()
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cursor = node;
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        root
    }

    /// Smaller index becomes the root
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// Detect communities in `graph`
pub fn detect_communities(graph: &ClaimGraph) -> Vec<Community> {
    let mut sets = DisjointSet::new(graph.node_count());
    for edge in &graph.edges {
        sets.union(edge.source, edge.target);
    }

    let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for node in 0..graph.node_count() {
        let root = sets.find(node);
        components.entry(root).or_default().push(node);
    }

    // Roots are the smallest member index, so BTreeMap order is stable
    components
        .into_values()
        .filter(|nodes| nodes.len() >= 2)
        .enumerate()
        .map(|(id, nodes)| {
            let (internal_edges, link_weight) = graph
                .edges
                .iter()
                .filter(|e| nodes.binary_search(&e.source).is_ok() && nodes.binary_search(&e.target).is_ok())
                .fold((0, 0), |(count, weight), e| (count + 1, weight + e.weight()));
            let n = nodes.len() as f64;
            let possible = n * (n - 1.0) / 2.0 * AttributeKind::ALL.len() as f64;
            Community {
                id,
                members: nodes.iter().map(|&i| graph.nodes[i].claim_id.clone()).collect(),
                nodes,
                internal_edges,
                link_weight,
                cohesion: (link_weight as f64 / possible).min(1.0),
            }
        })
        .collect()
}

/// A stored claim directly linked to the current claim
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingLink {
    pub claim_id: String,
    pub labels: Vec<String>,
    pub weight: usize,
}

/// Fraud ring verdict for the current claim
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingAssessment {
    pub fraud_ring_detected: bool,
    /// Community containing the current claim, if any
    pub community: Option<Community>,
    /// Direct links from the current claim, in node order
    pub links: Vec<RingLink>,
    /// Other claim ids in the community and the labels on each community edge
    pub evidence: Vec<String>,
}

/// Decide whether the current claim sits in a fraud ring.
///
/// A ring needs a community of at least two claims whose cohesion is
/// strictly above `cohesion_threshold`.
pub fn assess_ring(
    graph: &ClaimGraph,
    communities: &[Community],
    cohesion_threshold: f64,
) -> RingAssessment {
    let current = ClaimGraph::CURRENT;
    let community = communities.iter().find(|c| c.contains(current)).cloned();

    let links = graph
        .edges_of(current)
        .map(|edge| RingLink {
            claim_id: graph.nodes[edge.other(current)].claim_id.clone(),
            labels: edge.label_names(),
            weight: edge.weight(),
        })
        .collect();

    let mut evidence = Vec::new();
    if let Some(community) = &community {
        let others: Vec<&str> = community
            .nodes
            .iter()
            .filter(|&&n| n != current)
            .map(|&n| graph.nodes[n].claim_id.as_str())
            .collect();
        evidence.push(format!("Linked claims: {}", others.join(", ")));

        for edge in graph
            .edges
            .iter()
            .filter(|e| community.contains(e.source) && community.contains(e.target))
        {
            evidence.push(format!(
                "{} <-> {}: {}",
                graph.nodes[edge.source].claim_id,
                graph.nodes[edge.target].claim_id,
                edge.label_names().join(", ")
            ));
        }
    }

    let fraud_ring_detected = community
        .as_ref()
        .map(|c| c.size() >= 2 && c.cohesion > cohesion_threshold)
        .unwrap_or(false);

    RingAssessment {
        fraud_ring_detected,
        community,
        links,
        evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::ClaimAttribute;
    use crate::graph::ClaimGraphNode;

    /// Each value is carried as a phone and an address, so every edge has weight 2
    fn node(id: &str, values: &[&str]) -> ClaimGraphNode {
        let attributes = values
            .iter()
            .flat_map(|v| {
                [
                    ClaimAttribute::new(AttributeKind::Phone, *v),
                    ClaimAttribute::new(AttributeKind::Address, *v),
                ]
            })
            .collect();
        ClaimGraphNode::new(id, attributes)
    }

    fn named(id: &str) -> ClaimGraphNode {
        ClaimGraphNode::new(
            id,
            [ClaimAttribute::new(AttributeKind::Name, "john smith")].into_iter().collect(),
        )
    }

    fn ring_graph() -> ClaimGraph {
        // CLM-0, CLM-1, CLM-2 share one value; CLM-3 and CLM-4 share another
        ClaimGraph::build(
            node("CLM-0", &["111"]),
            vec![
                node("CLM-4", &["222"]),
                node("CLM-2", &["111"]),
                node("CLM-1", &["111"]),
                node("CLM-3", &["222"]),
                node("CLM-5", &["333"]),
            ],
        )
    }

    #[test]
    fn test_components_become_communities() {
        let graph = ring_graph();
        let communities = detect_communities(&graph);

        assert_eq!(communities.len(), 2);
        assert_eq!(communities[0].members, vec!["CLM-0", "CLM-1", "CLM-2"]);
        assert_eq!(communities[0].internal_edges, 3);
        assert_eq!(communities[0].link_weight, 6);
        // 6 shared types over 3 pairs × 6 types
        assert!((communities[0].cohesion - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(communities[1].members, vec!["CLM-3", "CLM-4"]);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let graph = ring_graph();
        let first = detect_communities(&graph);
        let second = detect_communities(&graph);
        assert_eq!(first, second);

        let rebuilt = ClaimGraph::build(
            node("CLM-0", &["111"]),
            graph.nodes[1..].iter().rev().cloned().collect(),
        );
        assert_eq!(detect_communities(&rebuilt), first);
    }

    #[test]
    fn test_ring_detected_above_threshold() {
        let graph = ring_graph();
        let communities = detect_communities(&graph);
        let assessment = assess_ring(&graph, &communities, 0.3);

        assert!(assessment.fraud_ring_detected);
        assert_eq!(assessment.links.len(), 2);
        assert_eq!(assessment.evidence[0], "Linked claims: CLM-1, CLM-2");
        assert!(assessment
            .evidence
            .contains(&"CLM-1 <-> CLM-2: shared_phone, shared_address".to_string()));

        assert!(!assess_ring(&graph, &communities, 0.4).fraud_ring_detected);
    }

    #[test]
    fn test_sparse_community_is_not_a_ring() {
        // Chain CLM-0 - CLM-1 - CLM-2 - CLM-3: 3 of 6 pairs linked
        let graph = ClaimGraph::build(
            node("CLM-0", &["a1"]),
            vec![
                node("CLM-1", &["a1", "b2"]),
                node("CLM-2", &["b2", "c3"]),
                node("CLM-3", &["c3"]),
            ],
        );
        let communities = detect_communities(&graph);
        assert!((communities[0].cohesion - 6.0 / 36.0).abs() < 1e-12);

        assert!(!assess_ring(&graph, &communities, 0.3).fraud_ring_detected);
        assert!(assess_ring(&graph, &communities, 0.1).fraud_ring_detected);
    }

    #[test]
    fn test_single_weak_link_is_not_a_ring() {
        let graph = ClaimGraph::build(named("CLM-0"), vec![named("CLM-1")]);
        let communities = detect_communities(&graph);
        assert_eq!(communities[0].link_weight, 1);
        assert!((communities[0].cohesion - 1.0 / 6.0).abs() < 1e-12);

        let assessment = assess_ring(&graph, &communities, 0.3);
        assert!(!assessment.fraud_ring_detected);
        assert_eq!(assessment.links.len(), 1);
        assert_eq!(assessment.evidence[0], "Linked claims: CLM-1");
    }

    #[test]
    fn test_pair_sharing_two_attribute_types_is_a_ring() {
        let graph = ClaimGraph::build(node("CLM-0", &["111"]), vec![node("CLM-1", &["111"])]);
        let communities = detect_communities(&graph);
        assert_eq!(communities[0].link_weight, 2);
        assert!(assess_ring(&graph, &communities, 0.3).fraud_ring_detected);
    }

    #[test]
    fn test_no_shared_attributes_means_no_ring() {
        let graph = ClaimGraph::build(node("CLM-0", &["111"]), vec![node("CLM-1", &["999"])]);
        let communities = detect_communities(&graph);
        assert!(communities.is_empty());

        let assessment = assess_ring(&graph, &communities, 0.0);
        assert!(!assessment.fraud_ring_detected);
        assert!(assessment.evidence.is_empty());
        assert!(assessment.links.is_empty());
        assert!(assessment.community.is_none());
    }

    #[test]
    fn test_disconnected_current_claim() {
        let graph = ClaimGraph::build(
            node("CLM-0", &[]),
            vec![node("CLM-1", &["222"]), node("CLM-2", &["222"])],
        );
        let communities = detect_communities(&graph);
        assert_eq!(communities.len(), 1);

        let assessment = assess_ring(&graph, &communities, 0.0);
        assert!(!assessment.fraud_ring_detected);
        assert!(assessment.evidence.is_empty());
    }
}
