//! Weighted fusion of analyzer scores with proportional redistribution

use crate::config::validate_weights;
use crate::error::ConfigError;
use crate::types::AnalyzerKind;
use std::collections::BTreeMap;

/// Fuses per-analyzer scores into a single 0 - 100 score.
///
/// Weights of analyzers that produced no score are redistributed over the
/// remaining ones in proportion to their configured weights.
#[derive(Debug, Clone)]
pub struct WeightedAggregator {
    /// Configured weights, summing to 1 over the declared analyzers
    weights: BTreeMap<AnalyzerKind, f64>,
    /// Score returned when nothing can be fused
    neutral_score: f64,
}

impl WeightedAggregator {
    /// Create an aggregator after checking the weights against the analyzer set
    pub fn new(
        weights: BTreeMap<AnalyzerKind, f64>,
        analyzers: &[AnalyzerKind],
        neutral_score: f64,
    ) -> Result<Self, ConfigError> {
        validate_weights(&weights, analyzers)?;
        Ok(Self {
            weights,
            neutral_score,
        })
    }

    /// Configured weight of an analyzer (0 when not declared)
    pub fn weight(&self, kind: AnalyzerKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn weights(&self) -> &BTreeMap<AnalyzerKind, f64> {
        &self.weights
    }

    pub fn neutral_score(&self) -> f64 {
        self.neutral_score
    }

    /// Effective weights for the analyzers that succeeded.
    ///
    /// Configured weights are all positive, so this is empty only when
    /// nothing succeeded or the succeeded analyzers were never declared.
    pub fn effective_weights<I>(&self, succeeded: I) -> BTreeMap<AnalyzerKind, f64>
    where
        I: IntoIterator<Item = AnalyzerKind>,
    {
        let present: BTreeMap<AnalyzerKind, f64> = succeeded
            .into_iter()
            .map(|kind| (kind, self.weight(kind)))
            .collect();
        let total: f64 = present.values().sum();
        if total <= 0.0 {
            return BTreeMap::new();
        }
        present
            .into_iter()
            .map(|(kind, weight)| (kind, weight / total))
            .collect()
    }

    /// Weighted sum over the scores present
    pub fn aggregate(&self, scores: &BTreeMap<AnalyzerKind, f64>) -> f64 {
        let effective = self.effective_weights(scores.keys().copied());
        if effective.is_empty() {
            return self.neutral_score;
        }

        effective
            .iter()
            .map(|(kind, weight)| scores.get(kind).copied().unwrap_or(0.0) * weight)
            .sum::<f64>()
            .clamp(0.0, 100.0)
    }
}

impl Default for WeightedAggregator {
    fn default() -> Self {
        Self {
            weights: AnalyzerKind::ALL
                .iter()
                .map(|kind| (*kind, kind.default_weight()))
                .collect(),
            neutral_score: 50.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(entries: &[(AnalyzerKind, f64)]) -> BTreeMap<AnalyzerKind, f64> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_weighted_aggregation() {
        let aggregator = WeightedAggregator::default();
        let aggregated = aggregator.aggregate(&scores(&[
            (AnalyzerKind::Inconsistency, 80.0),
            (AnalyzerKind::Pattern, 70.0),
            (AnalyzerKind::Network, 40.0),
            (AnalyzerKind::ImageAuthenticity, 20.0),
        ]));

        // 80*0.3 + 70*0.3 + 40*0.2 + 20*0.2
        assert!((aggregated - 57.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_weight_is_redistributed() {
        let aggregator = WeightedAggregator::default();
        let effective = aggregator.effective_weights([
            AnalyzerKind::Inconsistency,
            AnalyzerKind::Pattern,
            AnalyzerKind::ImageAuthenticity,
        ]);

        assert!((effective[&AnalyzerKind::Inconsistency] - 0.3 / 0.8).abs() < 1e-12);
        assert!((effective[&AnalyzerKind::ImageAuthenticity] - 0.2 / 0.8).abs() < 1e-12);
        assert!((effective.values().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_score_keeps_its_value() {
        let aggregator = WeightedAggregator::default();
        let aggregated = aggregator.aggregate(&scores(&[(AnalyzerKind::Network, 64.0)]));
        assert!((aggregated - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_scores_are_neutral() {
        let aggregator = WeightedAggregator::default();
        assert_eq!(aggregator.aggregate(&BTreeMap::new()), 50.0);
    }

    #[test]
    fn test_invalid_weights_are_rejected() {
        let weights = scores(&[(AnalyzerKind::Inconsistency, 0.5), (AnalyzerKind::Pattern, 0.4)]);
        let result = WeightedAggregator::new(
            weights,
            &[AnalyzerKind::Inconsistency, AnalyzerKind::Pattern],
            50.0,
        );
        assert!(matches!(result, Err(ConfigError::WeightSum(_))));

        let zero = scores(&[(AnalyzerKind::Inconsistency, 1.0), (AnalyzerKind::Network, 0.0)]);
        let result = WeightedAggregator::new(
            zero,
            &[AnalyzerKind::Inconsistency, AnalyzerKind::Network],
            50.0,
        );
        assert!(matches!(result, Err(ConfigError::InvalidWeight { .. })));
    }
}
