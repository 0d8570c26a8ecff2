//! Network analyzer: links the claim to stored claims and looks for rings

use super::{capability_failure, Analyzer, AnalyzerContext};
use crate::graph::{assess_ring, detect_communities, ClaimGraph, RingAssessment};
use crate::types::{AnalyzerKind, AnalyzerResult, Claim, Finding, Severity};
use async_trait::async_trait;
use serde_json::{json, Map};
use tracing::{debug, info};

/// Scores shared-attribute links and fraud ring membership
#[derive(Debug, Default)]
pub struct NetworkAnalyzer;

impl NetworkAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Analyzer for NetworkAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Network
    }

    async fn run(&self, claim: &Claim, context: &AnalyzerContext) -> AnalyzerResult {
        let attributes = context.extractor.extract(claim);
        let graph = match context
            .graph_builder
            .build(
                &claim.claim_id,
                attributes,
                context.capabilities.store.as_ref(),
                &context.retry,
            )
            .await
        {
            Ok(graph) => graph,
            Err(err) => return capability_failure(&err),
        };

        let communities = detect_communities(&graph);
        let assessment = assess_ring(&graph, &communities, context.cohesion_threshold);
        let score = network_score(&graph, &assessment);

        if assessment.fraud_ring_detected {
            info!(
                claim_id = %claim.claim_id,
                community_size = assessment.community.as_ref().map(|c| c.size()).unwrap_or(0),
                "Fraud ring detected"
            );
        }
        debug!(
            claim_id = %claim.claim_id,
            nodes = graph.node_count(),
            edges = graph.edges.len(),
            communities = communities.len(),
            score = score,
            "Network analysis complete"
        );

        let mut findings: Vec<Finding> = assessment
            .links
            .iter()
            .map(|link| {
                let severity = if link.weight >= 2 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Finding::new(
                    "shared_attributes",
                    format!("Shares {} with claim {}", link.labels.join(", "), link.claim_id),
                    severity,
                )
                .with_evidence(vec![link.claim_id.clone()])
            })
            .collect();

        if let (true, Some(community)) = (assessment.fraud_ring_detected, &assessment.community) {
            findings.insert(
                0,
                Finding::new(
                    "fraud_ring",
                    format!(
                        "Claim belongs to a {}-claim community with cohesion {:.2}",
                        community.size(),
                        community.cohesion
                    ),
                    Severity::Critical,
                )
                .with_evidence(assessment.evidence.clone()),
            );
        }

        let mut metadata = Map::new();
        metadata.insert("summary".to_string(), json!(summarize(score, &assessment)));
        metadata.insert(
            "fraud_ring_detected".to_string(),
            json!(assessment.fraud_ring_detected),
        );
        metadata.insert("community".to_string(), json!(assessment.community));
        metadata.insert("direct_links".to_string(), json!(assessment.links));
        metadata.insert("evidence".to_string(), json!(assessment.evidence));
        metadata.insert("graph_nodes".to_string(), json!(graph.node_count()));
        metadata.insert("graph_edges".to_string(), json!(graph.edges.len()));

        AnalyzerResult::success(score, findings, metadata)
    }
}

/// Link count, community size and strong links, capped at 100
pub fn network_score(graph: &ClaimGraph, assessment: &RingAssessment) -> f64 {
    let links = assessment.links.len();
    if links == 0 {
        return 0.0;
    }

    let mut score = (links * 10).min(50);
    match assessment.community.as_ref().map(|c| c.size()) {
        Some(size) if size > 3 => score += 20,
        Some(size) if size > 2 => score += 10,
        _ => {}
    }
    let strong = graph
        .edges_of(ClaimGraph::CURRENT)
        .filter(|e| e.weight() >= 2)
        .count();
    score += strong * 5;

    (score as f64).min(100.0)
}

fn summarize(score: f64, assessment: &RingAssessment) -> String {
    let links = assessment.links.len();
    if assessment.fraud_ring_detected {
        let size = assessment.community.as_ref().map(|c| c.size()).unwrap_or(0);
        format!(
            "Fraud ring detected: {} linked claims in a community of {}",
            links, size
        )
    } else if score > 50.0 {
        format!("HIGH RISK: significant network connections found ({} links)", links)
    } else if links > 0 {
        format!("MODERATE: {} link(s) to prior claims", links)
    } else {
        "No connections to prior claims".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Capabilities, ClaimStore, ClaimSummary, InMemoryClaimStore};
    use crate::attributes::{AttributeKind, ClaimAttribute};
    use crate::test_support::offline_capabilities;
    use crate::types::Vertical;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn claim() -> Claim {
        Claim::new("CLM-0", Vertical::Auto)
            .with_field("claimant.phone", "555-010-0199")
            .with_field("claimant.address", "12 Elm St")
    }

    async fn store(entries: Vec<(&str, Vec<ClaimAttribute>)>) -> Arc<InMemoryClaimStore> {
        let store = Arc::new(InMemoryClaimStore::new());
        for (id, attributes) in entries {
            store
                .insert(ClaimSummary {
                    claim_id: id.to_string(),
                    attributes: attributes.into_iter().collect::<BTreeSet<_>>(),
                    received_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        store
    }

    fn context(store: Arc<InMemoryClaimStore>) -> AnalyzerContext {
        AnalyzerContext::with_capabilities(Capabilities {
            store,
            ..offline_capabilities()
        })
    }

    #[tokio::test]
    async fn test_isolated_claim_scores_zero() {
        let ctx = context(store(Vec::new()).await);
        let result = NetworkAnalyzer::new().run(&claim(), &ctx).await;

        let AnalyzerResult::Success { score, findings, metadata } = result else {
            panic!("expected success");
        };
        assert_eq!(score, 0.0);
        assert!(findings.is_empty());
        assert_eq!(metadata["fraud_ring_detected"], json!(false));
    }

    #[tokio::test]
    async fn test_ring_membership_is_scored() {
        let phone = ClaimAttribute::new(AttributeKind::Phone, "5550100199");
        let address = ClaimAttribute::new(AttributeKind::Address, "12 elm st");
        let provider = ClaimAttribute::new(AttributeKind::Provider, "metro orthopedics");
        let ctx = context(
            store(vec![
                ("CLM-1", vec![phone.clone(), address.clone(), provider.clone()]),
                ("CLM-2", vec![phone.clone(), address.clone()]),
                ("CLM-3", vec![phone.clone(), provider.clone()]),
            ])
            .await,
        );
        let claim = claim().with_field("medical.providers", vec!["Metro Orthopedics"]);

        let result = NetworkAnalyzer::new().run(&claim, &ctx).await;
        let AnalyzerResult::Success { score, findings, metadata } = result else {
            panic!("expected success");
        };

        // 3 links → 30, community of 4 → +20, three multi-type links → +15
        assert_eq!(score, 65.0);
        // 12 shared types over 6 pairs × 6 types
        assert_eq!(metadata["fraud_ring_detected"], json!(true));
        assert_eq!(metadata["community"]["link_weight"], json!(12));
        assert_eq!(findings[0].category, "fraud_ring");
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings.len(), 4);
    }

    #[tokio::test]
    async fn test_loosely_linked_community_is_not_a_ring() {
        let phone = ClaimAttribute::new(AttributeKind::Phone, "5550100199");
        let address = ClaimAttribute::new(AttributeKind::Address, "12 elm st");
        let ctx = context(
            store(vec![
                ("CLM-1", vec![phone.clone(), address.clone()]),
                ("CLM-2", vec![phone.clone()]),
                ("CLM-3", vec![address.clone()]),
            ])
            .await,
        );

        let result = NetworkAnalyzer::new().run(&claim(), &ctx).await;
        let AnalyzerResult::Success { score, findings, metadata } = result else {
            panic!("expected success");
        };

        // 3 links → 30, community of 4 → +20, one two-type link → +5
        assert_eq!(score, 55.0);
        assert_eq!(metadata["fraud_ring_detected"], json!(false));
        assert!(findings.iter().all(|f| f.category == "shared_attributes"));
        assert_eq!(findings.len(), 3);
    }

    #[tokio::test]
    async fn test_shared_common_name_is_only_a_link() {
        let ctx = context(
            store(vec![(
                "CLM-1",
                vec![ClaimAttribute::new(AttributeKind::Name, "john smith")],
            )])
            .await,
        );
        let claim = Claim::new("CLM-2", Vertical::Auto).with_field("claimant.name", "John Smith");

        let result = NetworkAnalyzer::new().run(&claim, &ctx).await;
        let AnalyzerResult::Success { score, findings, metadata } = result else {
            panic!("expected success");
        };

        assert_eq!(score, 10.0);
        assert_eq!(metadata["fraud_ring_detected"], json!(false));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, "shared_attributes");
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn test_store_failure_fails_the_analyzer() {
        struct BrokenStore;

        #[async_trait]
        impl ClaimStore for BrokenStore {
            async fn query_by_attribute(
                &self,
                _attribute: &ClaimAttribute,
            ) -> Result<Vec<String>, crate::error::CapabilityError> {
                Err(crate::error::CapabilityError::Malformed("corrupt index".into()))
            }

            async fn get(&self, _id: &str) -> Result<Option<ClaimSummary>, crate::error::CapabilityError> {
                Ok(None)
            }

            async fn insert(&self, _summary: ClaimSummary) -> Result<(), crate::error::CapabilityError> {
                Ok(())
            }
        }

        let ctx = AnalyzerContext::with_capabilities(Capabilities {
            store: Arc::new(BrokenStore),
            ..offline_capabilities()
        });
        let result = NetworkAnalyzer::new().run(&claim(), &ctx).await;
        assert!(!result.is_success());
    }
}
