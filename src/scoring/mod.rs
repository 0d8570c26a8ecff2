//! Weighted-ensemble scoring of analyzer results

pub mod aggregator;
pub mod engine;

pub use aggregator::WeightedAggregator;
pub use engine::ScoringEngine;
