//! In-process pattern index and claim store

use super::{ClaimStore, ClaimSummary, ScoredPattern, VectorIndex};
use crate::attributes::ClaimAttribute;
use crate::error::CapabilityError;
use crate::retrieval::{cosine_similarity, FraudPattern};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

fn poisoned(what: &str) -> CapabilityError {
    CapabilityError::Unavailable(format!("{} lock poisoned", what))
}

/// Brute-force cosine search over an in-memory corpus
#[derive(Default)]
pub struct InMemoryPatternIndex {
    patterns: RwLock<Vec<Arc<FraudPattern>>>,
}

impl InMemoryPatternIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryPatternIndex {
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPattern>, CapabilityError> {
        let patterns = self.patterns.read().map_err(|_| poisoned("pattern index"))?;

        let mut scored: Vec<ScoredPattern> = patterns
            .iter()
            .map(|pattern| ScoredPattern {
                similarity: cosine_similarity(vector, &pattern.embedding),
                pattern: Arc::clone(pattern),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.pattern.id.cmp(&b.pattern.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn insert(&self, pattern: FraudPattern) -> Result<(), CapabilityError> {
        let mut patterns = self.patterns.write().map_err(|_| poisoned("pattern index"))?;
        patterns.retain(|p| p.id != pattern.id);
        patterns.push(Arc::new(pattern));
        Ok(())
    }

    async fn len(&self) -> Result<usize, CapabilityError> {
        Ok(self.patterns.read().map_err(|_| poisoned("pattern index"))?.len())
    }
}

/// Orders claims newest first, then by id
type Arrival = (Reverse<DateTime<Utc>>, String);

#[derive(Default)]
struct StoreState {
    summaries: BTreeMap<String, ClaimSummary>,
    by_arrival: BTreeSet<Arrival>,
    by_attribute: HashMap<ClaimAttribute, BTreeSet<Arrival>>,
}

impl StoreState {
    fn remove(&mut self, claim_id: &str) {
        let Some(previous) = self.summaries.remove(claim_id) else {
            return;
        };
        let key = (Reverse(previous.received_at), previous.claim_id);
        self.by_arrival.remove(&key);
        for attribute in &previous.attributes {
            if let Some(keys) = self.by_attribute.get_mut(attribute) {
                keys.remove(&key);
                if keys.is_empty() {
                    self.by_attribute.remove(attribute);
                }
            }
        }
    }
}

/// Historical claims indexed by attribute value.
///
/// Holds at most `capacity` claims; the oldest arrivals are evicted first.
pub struct InMemoryClaimStore {
    state: RwLock<StoreState>,
    capacity: usize,
}

impl InMemoryClaimStore {
    /// Claims retained by [`InMemoryClaimStore::new`]
    pub const DEFAULT_CAPACITY: usize = 100_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryClaimStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClaimStore for InMemoryClaimStore {
    async fn query_by_attribute(
        &self,
        attribute: &ClaimAttribute,
    ) -> Result<Vec<String>, CapabilityError> {
        let state = self.state.read().map_err(|_| poisoned("claim store"))?;
        Ok(state
            .by_attribute
            .get(attribute)
            .map(|keys| keys.iter().map(|(_, id)| id.clone()).collect())
            .unwrap_or_default())
    }

    async fn get(&self, claim_id: &str) -> Result<Option<ClaimSummary>, CapabilityError> {
        let state = self.state.read().map_err(|_| poisoned("claim store"))?;
        Ok(state.summaries.get(claim_id).cloned())
    }

    async fn insert(&self, summary: ClaimSummary) -> Result<(), CapabilityError> {
        let mut state = self.state.write().map_err(|_| poisoned("claim store"))?;

        state.remove(&summary.claim_id);
        let key = (Reverse(summary.received_at), summary.claim_id.clone());
        for attribute in &summary.attributes {
            state
                .by_attribute
                .entry(attribute.clone())
                .or_default()
                .insert(key.clone());
        }
        state.by_arrival.insert(key);
        state.summaries.insert(summary.claim_id.clone(), summary);

        while state.summaries.len() > self.capacity {
            let Some((_, oldest)) = state.by_arrival.last().cloned() else {
                break;
            };
            state.remove(&oldest);
        }
        Ok(())
    }
}
