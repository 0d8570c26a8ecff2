//! Embedding search followed by reranking

use super::{sort_matches, PatternMatch};
use crate::attributes::truncate_chars;
use crate::capabilities::{Capabilities, RetryPolicy};
use crate::config::RetrievalConfig;
use crate::error::CapabilityError;
use std::collections::BTreeSet;
use tracing::debug;

const MAX_MATCHING_ELEMENTS: usize = 5;
const MAX_ELEMENT_CHARS: usize = 160;
const MIN_SHARED_WORDS: usize = 2;

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "being", "claim", "claimant", "claims", "from",
    "have", "into", "more", "only", "other", "over", "same", "such", "than", "that", "their",
    "them", "then", "there", "these", "they", "this", "under", "were", "what", "when", "which",
    "while", "with", "would",
];

/// Two-stage pattern retriever
#[derive(Debug, Clone)]
pub struct PatternRetriever {
    /// Candidates pulled from the vector index
    pub top_k: usize,
    /// Matches returned after reranking
    pub top_n: usize,
    /// Candidates below this similarity never reach the reranker
    pub min_similarity: f64,
}

impl Default for PatternRetriever {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

impl PatternRetriever {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            top_n: config.top_n,
            min_similarity: config.min_similarity,
        }
    }

    /// Retrieve the best matching patterns for `query`.
    ///
    /// An empty corpus, or one where nothing clears `min_similarity`,
    /// yields an empty list without calling the reranker.
    pub async fn retrieve(
        &self,
        query: &str,
        capabilities: &Capabilities,
        retry: &RetryPolicy,
    ) -> Result<Vec<PatternMatch>, CapabilityError> {
        let embedder = capabilities.embedder.as_ref();
        let index = capabilities.index.as_ref();
        let reranker = capabilities.reranker.as_ref();

        let vector = retry.run("embed", move || embedder.embed(query)).await?;
        let vector = vector.as_slice();
        let top_k = self.top_k;
        let candidates = retry
            .run("search", move || index.search(vector, top_k))
            .await?;

        let candidates: Vec<_> = candidates
            .into_iter()
            .filter(|c| c.similarity >= self.min_similarity)
            .collect();
        if candidates.is_empty() {
            debug!("No pattern candidates above similarity floor");
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.pattern.text.clone()).collect();
        let passages = texts.as_slice();
        let scores = retry
            .run("rerank", move || reranker.rerank(query, passages))
            .await?;
        if scores.len() != candidates.len() {
            return Err(CapabilityError::Malformed(format!(
                "reranker returned {} scores for {} candidates",
                scores.len(),
                candidates.len()
            )));
        }

        let mut matches: Vec<PatternMatch> = candidates
            .into_iter()
            .zip(scores)
            .map(|(candidate, score)| {
                let pattern = candidate.pattern;
                let rerank_score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
                let matching_elements = matching_elements(query, &pattern.text);
                let rationale = format!(
                    "Matches {} pattern '{}' (similarity {:.2}, relevance {:.2}, {} overlapping element(s))",
                    pattern.category,
                    pattern.id,
                    candidate.similarity,
                    rerank_score,
                    matching_elements.len()
                );
                PatternMatch {
                    pattern_id: pattern.id.clone(),
                    category: pattern.category.clone(),
                    severity: pattern.severity,
                    similarity: candidate.similarity,
                    rerank_score,
                    rationale,
                    matching_elements,
                }
            })
            .collect();

        sort_matches(&mut matches);
        matches.truncate(self.top_n);
        Ok(matches)
    }
}

fn content_words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Clauses of the claim text that share at least two content words with the pattern
pub fn matching_elements(query: &str, pattern_text: &str) -> Vec<String> {
    let pattern_words = content_words(pattern_text);
    let mut seen = BTreeSet::new();
    let mut elements = Vec::new();

    let normalized = query.replace(". ", "\n");
    for clause in normalized.split(['\n', ';', '!', '?']) {
        let clause = clause.trim().trim_end_matches('.');
        if clause.is_empty() {
            continue;
        }
        let shared = content_words(clause).intersection(&pattern_words).count();
        if shared >= MIN_SHARED_WORDS && seen.insert(clause.to_lowercase()) {
            elements.push(truncate_chars(clause, MAX_ELEMENT_CHARS).to_string());
            if elements.len() == MAX_MATCHING_ELEMENTS {
                break;
            }
        }
    }
    elements
}
