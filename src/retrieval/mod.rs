//! Two-stage fraud pattern retrieval.
//!
//! Stage one pulls the nearest patterns from the vector index; stage two
//! reranks the survivors against the claim text and keeps the best few.

pub mod corpus;
pub mod retriever;

use crate::types::Severity;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub use corpus::{load_corpus, load_seeds, PatternSeed};
pub use retriever::PatternRetriever;

/// A known fraud scheme description with its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct FraudPattern {
    pub id: String,
    pub text: String,
    pub category: String,
    pub severity: Severity,
    pub embedding: Vec<f32>,
}

/// A pattern selected for a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern_id: String,
    pub category: String,
    pub severity: Severity,
    /// Vector similarity (0.0 - 1.0)
    pub similarity: f64,
    /// Rerank relevance (0.0 - 1.0)
    pub rerank_score: f64,
    pub rationale: String,
    /// Claim phrases that overlap with the pattern description
    pub matching_elements: Vec<String>,
}

/// Cosine similarity clamped to [0, 1]; mismatched or zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_nan() {
        0.0
    } else {
        similarity.clamp(0.0, 1.0)
    }
}

/// Rerank score desc, then similarity desc, then pattern id asc
pub fn compare_matches(a: &PatternMatch, b: &PatternMatch) -> Ordering {
    b.rerank_score
        .total_cmp(&a.rerank_score)
        .then_with(|| b.similarity.total_cmp(&a.similarity))
        .then_with(|| a.pattern_id.cmp(&b.pattern_id))
}

pub fn sort_matches(matches: &mut [PatternMatch]) {
    matches.sort_by(compare_matches);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern_match(id: &str, similarity: f64, rerank_score: f64) -> PatternMatch {
        PatternMatch {
            pattern_id: id.to_string(),
            category: "staged_accident".to_string(),
            severity: Severity::High,
            similarity,
            rerank_score,
            rationale: String::new(),
            matching_elements: Vec::new(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_match_ordering_breaks_ties() {
        let mut matches = vec![
            pattern_match("p3", 0.5, 0.9),
            pattern_match("p2", 0.7, 0.9),
            pattern_match("p1", 0.7, 0.9),
            pattern_match("p0", 0.99, 0.4),
        ];
        sort_matches(&mut matches);

        let ids: Vec<&str> = matches.iter().map(|m| m.pattern_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3", "p0"]);
    }

    #[test]
    fn test_ordering_is_independent_of_input_order() {
        let a = pattern_match("a", 0.6, 0.8);
        let b = pattern_match("b", 0.6, 0.8);
        let mut forward = vec![a.clone(), b.clone()];
        let mut reverse = vec![b, a];
        sort_matches(&mut forward);
        sort_matches(&mut reverse);
        assert_eq!(forward, reverse);
    }
}
