//! Candidate lookup against the historical claim store

use super::{ClaimGraph, ClaimGraphNode};
use crate::attributes::ClaimAttribute;
use crate::capabilities::{ClaimStore, RetryPolicy};
use crate::config::NetworkConfig;
use crate::error::CapabilityError;
use std::collections::BTreeSet;
use tracing::debug;

/// Assembles the claim graph from attribute index lookups
#[derive(Debug, Clone)]
pub struct ClaimGraphBuilder {
    /// Maximum stored claims in one graph
    pub history_window: usize,
    /// Maximum stored claims taken from one attribute lookup
    pub max_matches_per_attribute: usize,
}

impl Default for ClaimGraphBuilder {
    fn default() -> Self {
        Self::from_config(&NetworkConfig::default())
    }
}

impl ClaimGraphBuilder {
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            history_window: config.history_window,
            max_matches_per_attribute: config.max_matches_per_attribute,
        }
    }

    /// Stored claims sharing at least one attribute with the current claim.
    ///
    /// Each lookup contributes its most recent matches; the union is then
    /// cut to the history window, newest first.
    pub async fn neighbourhood(
        &self,
        claim_id: &str,
        attributes: &BTreeSet<ClaimAttribute>,
        store: &dyn ClaimStore,
        retry: &RetryPolicy,
    ) -> Result<Vec<ClaimGraphNode>, CapabilityError> {
        let mut candidates = BTreeSet::new();
        for attribute in attributes {
            let ids = retry
                .run("query_by_attribute", move || store.query_by_attribute(attribute))
                .await?;
            candidates.extend(
                ids.into_iter()
                    .filter(|id| id != claim_id)
                    .take(self.max_matches_per_attribute),
            );
        }

        let mut summaries = Vec::with_capacity(candidates.len());
        for id in &candidates {
            let id = id.as_str();
            if let Some(summary) = retry.run("get_claim", move || store.get(id)).await? {
                summaries.push(summary);
            }
        }
        summaries.sort_by(|a, b| {
            b.received_at
                .cmp(&a.received_at)
                .then_with(|| a.claim_id.cmp(&b.claim_id))
        });
        summaries.truncate(self.history_window);

        debug!(
            claim_id = %claim_id,
            candidates = candidates.len(),
            loaded = summaries.len(),
            "Claim neighbourhood loaded"
        );
        Ok(summaries
            .into_iter()
            .map(|summary| ClaimGraphNode::new(summary.claim_id, summary.attributes))
            .collect())
    }

    /// Look up the neighbourhood and build the graph
    pub async fn build(
        &self,
        claim_id: &str,
        attributes: BTreeSet<ClaimAttribute>,
        store: &dyn ClaimStore,
        retry: &RetryPolicy,
    ) -> Result<ClaimGraph, CapabilityError> {
        let history = self.neighbourhood(claim_id, &attributes, store, retry).await?;
        Ok(ClaimGraph::build(
            ClaimGraphNode::new(claim_id, attributes),
            history,
        ))
    }
}
