//! Fraud pattern analyzer

use super::{capability_failure, Analyzer, AnalyzerContext};
use crate::retrieval::PatternMatch;
use crate::types::{AnalyzerKind, AnalyzerResult, Claim, Finding};
use async_trait::async_trait;
use serde_json::{json, Map};
use tracing::debug;

/// Scale applied to the weighted rerank sum
const PATTERN_SCORE_SCALE: f64 = 20.0;
/// Bonus per matching element
const ELEMENT_BONUS: f64 = 0.1;

/// Compares the claim against the known fraud pattern corpus
#[derive(Debug, Default)]
pub struct PatternAnalyzer;

impl PatternAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Analyzer for PatternAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Pattern
    }

    async fn run(&self, claim: &Claim, context: &AnalyzerContext) -> AnalyzerResult {
        let query = context.extractor.search_query(claim);

        let matches = match context
            .retriever
            .retrieve(&query, &context.capabilities, &context.retry)
            .await
        {
            Ok(matches) => matches,
            Err(err) => return capability_failure(&err),
        };

        let score = pattern_score(&matches);
        debug!(
            claim_id = %claim.claim_id,
            matches = matches.len(),
            score = score,
            "Pattern analysis complete"
        );

        let findings = matches
            .iter()
            .map(|m| {
                Finding::new(m.category.clone(), m.rationale.clone(), m.severity)
                    .with_confidence(m.rerank_score)
                    .with_evidence(m.matching_elements.clone())
            })
            .collect();

        let summary = match matches.first() {
            None => "No known fraud patterns matched".to_string(),
            Some(best) => format!(
                "{} fraud pattern(s) matched; strongest: {} ({:.0}% relevance)",
                matches.len(),
                best.category,
                best.rerank_score * 100.0
            ),
        };

        let mut metadata = Map::new();
        metadata.insert("summary".to_string(), json!(summary));
        metadata.insert("matches".to_string(), json!(matches));

        AnalyzerResult::success(score, findings, metadata)
    }
}

/// Σ rerank × severity multiplier × element bonus, scaled and capped at 100
pub fn pattern_score(matches: &[PatternMatch]) -> f64 {
    matches
        .iter()
        .map(|m| {
            let elements = 1.0 + ELEMENT_BONUS * m.matching_elements.len() as f64;
            m.rerank_score * m.severity.pattern_multiplier() * elements * PATTERN_SCORE_SCALE
        })
        .sum::<f64>()
        .min(100.0)
}
