//! Scoring engine: turns the analyzer result set into a `ScoreResult`

use super::WeightedAggregator;
use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::types::{
    AnalyzerKind, AnalyzerRecord, AnalyzerResult, Finding, MissingFactor, RiskFactor, RiskLevel,
    RiskLevelThresholds, ScoreResult,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Findings quoted as evidence per risk factor
const EVIDENCE_PER_FACTOR: usize = 3;

/// Deterministic weighted-ensemble scoring
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    aggregator: WeightedAggregator,
    thresholds: RiskLevelThresholds,
    /// Declared analyzers; confidence is measured against this set
    analyzers: Vec<AnalyzerKind>,
}

impl ScoringEngine {
    pub fn new(
        aggregator: WeightedAggregator,
        thresholds: RiskLevelThresholds,
        analyzers: Vec<AnalyzerKind>,
    ) -> Self {
        Self {
            aggregator,
            thresholds,
            analyzers,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let analyzers = config.orchestrator.analyzers.clone();
        let aggregator = WeightedAggregator::new(
            config.scoring.weights.clone(),
            &analyzers,
            config.scoring.neutral_score,
        )?;
        Ok(Self::new(aggregator, config.scoring.risk_levels, analyzers))
    }

    pub fn analyzers(&self) -> &[AnalyzerKind] {
        &self.analyzers
    }

    /// Fuse one run's analyzer records.
    ///
    /// Records for undeclared analyzers are ignored; declared analyzers
    /// without a record count as failed.
    pub fn score(&self, records: &[AnalyzerRecord]) -> ScoreResult {
        let mut by_kind: BTreeMap<AnalyzerKind, &AnalyzerResult> = BTreeMap::new();
        for record in records {
            if self.analyzers.contains(&record.analyzer) {
                by_kind.insert(record.analyzer, &record.result);
            } else {
                warn!(analyzer = %record.analyzer, "Ignoring result from undeclared analyzer");
            }
        }

        let mut scores = BTreeMap::new();
        let mut missing_factors = Vec::new();
        for kind in &self.analyzers {
            match by_kind.get(kind) {
                Some(AnalyzerResult::Success { score, .. }) => {
                    scores.insert(*kind, *score);
                }
                Some(AnalyzerResult::Timeout) => missing_factors.push(MissingFactor::timeout(*kind)),
                Some(AnalyzerResult::Failure { kind: failure, message }) => {
                    missing_factors.push(MissingFactor::failure(*kind, *failure, message))
                }
                None => missing_factors.push(MissingFactor::failure(
                    *kind,
                    crate::types::FailureKind::Internal,
                    "analyzer produced no result",
                )),
            }
        }

        let effective = self.aggregator.effective_weights(scores.keys().copied());
        let mut risk_factors: Vec<RiskFactor> = scores
            .iter()
            .map(|(kind, raw_score)| {
                let weight = effective.get(kind).copied().unwrap_or(0.0);
                let result = by_kind.get(kind).copied();
                RiskFactor {
                    analyzer: *kind,
                    name: kind.factor_name().to_string(),
                    raw_score: *raw_score,
                    weight,
                    configured_weight: self.aggregator.weight(*kind),
                    contribution: raw_score * weight,
                    description: result
                        .and_then(AnalyzerResult::summary)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{} score {:.0}/100", kind.factor_name(), raw_score)),
                    evidence: result.map(top_evidence).unwrap_or_default(),
                }
            })
            .collect();
        risk_factors.sort_by(|a, b| {
            b.contribution
                .total_cmp(&a.contribution)
                .then_with(|| a.analyzer.cmp(&b.analyzer))
        });

        let fraud_score = self.aggregator.aggregate(&scores);
        let risk_level = RiskLevel::from_score(fraud_score, &self.thresholds);
        let confidence = if self.analyzers.is_empty() {
            0.0
        } else {
            scores.len() as f64 / self.analyzers.len() as f64
        };

        debug!(
            fraud_score = fraud_score,
            risk_level = risk_level.as_str(),
            confidence = confidence,
            missing = missing_factors.len(),
            "Claim scored"
        );

        ScoreResult {
            fraud_score,
            risk_level,
            risk_factors,
            missing_factors,
            confidence,
            recommendation: risk_level.recommendation(),
        }
    }
}

/// Descriptions of the most severe findings, in analyzer order within a severity
fn top_evidence(result: &AnalyzerResult) -> Vec<String> {
    let AnalyzerResult::Success { findings, .. } = result else {
        return Vec::new();
    };
    let mut ranked: Vec<&Finding> = findings.iter().collect();
    ranked.sort_by(|a, b| b.severity.cmp(&a.severity));
    ranked
        .into_iter()
        .take(EVIDENCE_PER_FACTOR)
        .map(|f| f.description.clone())
        .collect()
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(
            WeightedAggregator::default(),
            RiskLevelThresholds::default(),
            AnalyzerKind::ALL.to_vec(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureKind, Recommendation, Severity};
    use serde_json::{json, Map};
    use std::time::Duration;

    fn success(kind: AnalyzerKind, score: f64) -> AnalyzerRecord {
        let mut metadata = Map::new();
        metadata.insert("summary".to_string(), json!(format!("{} summary", kind)));
        AnalyzerRecord::new(
            kind,
            AnalyzerResult::success(
                score,
                vec![
                    Finding::new("x", "minor", Severity::Low),
                    Finding::new("x", "major", Severity::High),
                ],
                metadata,
            ),
            Duration::from_millis(5),
        )
    }

    fn all_succeed() -> Vec<AnalyzerRecord> {
        vec![
            success(AnalyzerKind::Inconsistency, 80.0),
            success(AnalyzerKind::Pattern, 70.0),
            success(AnalyzerKind::Network, 40.0),
            success(AnalyzerKind::ImageAuthenticity, 20.0),
        ]
    }

    #[test]
    fn test_all_analyzers_succeed() {
        let result = ScoringEngine::default().score(&all_succeed());

        assert!((result.fraud_score - 57.0).abs() < 1e-9);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert_eq!(result.recommendation, Recommendation::Review);
        assert_eq!(
            result.recommendation_text(),
            "review — additional documentation required"
        );
        assert_eq!(result.confidence, 1.0);
        assert!(result.missing_factors.is_empty());

        let names: Vec<&str> = result.risk_factors.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Inconsistencies", "Fraud Pattern Match", "Network/Ring Risk", "Image Authenticity"]
        );
        let total: f64 = result.risk_factors.iter().map(|f| f.contribution).sum();
        assert!((total - result.fraud_score).abs() < 1e-9);
        assert_eq!(result.risk_factors[0].evidence, vec!["major", "minor"]);
        assert_eq!(result.risk_factors[0].description, "inconsistency summary");
    }

    #[test]
    fn test_network_timeout_redistributes_weights() {
        let mut records = all_succeed();
        records[2] = AnalyzerRecord::new(
            AnalyzerKind::Network,
            AnalyzerResult::Timeout,
            Duration::from_secs(30),
        );

        let result = ScoringEngine::default().score(&records);

        assert_eq!(result.confidence, 0.75);
        let weight = |kind: AnalyzerKind| {
            result
                .risk_factors
                .iter()
                .find(|f| f.analyzer == kind)
                .map(|f| f.weight)
                .unwrap()
        };
        assert!((weight(AnalyzerKind::Inconsistency) - 0.3 / 0.8).abs() < 1e-9);
        assert!((weight(AnalyzerKind::Pattern) - 0.3 / 0.8).abs() < 1e-9);
        assert!((weight(AnalyzerKind::ImageAuthenticity) - 0.2 / 0.8).abs() < 1e-9);

        // (80*0.3 + 70*0.3 + 20*0.2) / 0.8
        assert!((result.fraud_score - 61.25).abs() < 1e-9);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(result.missing_factors.len(), 1);
        assert_eq!(result.missing_factors[0].status, "timeout");
    }

    #[test]
    fn test_timeout_lowers_confidence_without_zero_filling() {
        let full = ScoringEngine::default().score(&all_succeed());
        let mut records = all_succeed();
        records[3] = AnalyzerRecord::new(
            AnalyzerKind::ImageAuthenticity,
            AnalyzerResult::Timeout,
            Duration::from_secs(30),
        );
        let partial = ScoringEngine::default().score(&records);

        assert!(partial.confidence < full.confidence);
        // Zero-filling would give 53; redistribution gives 53 / 0.8
        assert!((partial.fraud_score - 66.25).abs() < 1e-9);
    }

    #[test]
    fn test_all_failures_give_neutral_score() {
        let records: Vec<AnalyzerRecord> = AnalyzerKind::ALL
            .iter()
            .map(|kind| {
                AnalyzerRecord::new(
                    *kind,
                    AnalyzerResult::failure(FailureKind::Transient, "rate limited"),
                    Duration::from_millis(1),
                )
            })
            .collect();

        let result = ScoringEngine::default().score(&records);
        assert_eq!(result.fraud_score, 50.0);
        assert_eq!(result.confidence, 0.0);
        assert!(result.risk_factors.is_empty());
        assert_eq!(result.missing_factors.len(), 4);
        assert_eq!(result.missing_factors[0].status, "transient");
    }

    #[test]
    fn test_missing_record_counts_as_failure() {
        let records = all_succeed()[..3].to_vec();
        let result = ScoringEngine::default().score(&records);

        assert_eq!(result.confidence, 0.75);
        assert_eq!(result.missing_factors[0].analyzer, AnalyzerKind::ImageAuthenticity);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let engine = ScoringEngine::default();
        let mut reversed = all_succeed();
        reversed.reverse();
        assert_eq!(engine.score(&all_succeed()), engine.score(&reversed));
    }
}
