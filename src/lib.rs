//! Claim Fraud Engine Library
//!
//! Scores insurance claims for fraud risk by running independent analyzers
//! (inconsistencies, known fraud patterns, claim networks, image
//! authenticity) concurrently and fusing their results into one
//! explainable weighted-ensemble score.

pub mod analyzers;
pub mod attributes;
pub mod capabilities;
pub mod config;
pub mod consumer;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod orchestrator;
pub mod producer;
pub mod retrieval;
pub mod scoring;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use attributes::AttributeExtractor;
pub use config::AppConfig;
pub use consumer::ClaimConsumer;
pub use error::{CapabilityError, ConfigError, RunError};
pub use orchestrator::{CancelHandle, CancelSignal, Orchestrator, RunOutcome};
pub use producer::ReportProducer;
pub use scoring::ScoringEngine;
pub use types::{AnalyzerResult, Claim, ClaimReport, ScoreResult};
