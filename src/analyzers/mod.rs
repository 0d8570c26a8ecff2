//! Analyzer tasks.
//!
//! Each analyzer inspects one claim through its injected capabilities and
//! reports a score or a typed failure. Capability errors are converted into
//! `AnalyzerResult::Failure` here and never escape to the orchestrator.

pub mod image;
pub mod inconsistency;
pub mod network;
pub mod pattern;

use crate::attributes::AttributeExtractor;
use crate::capabilities::{Capabilities, RetryPolicy};
use crate::config::AppConfig;
use crate::error::CapabilityError;
use crate::graph::ClaimGraphBuilder;
use crate::retrieval::PatternRetriever;
use crate::types::{AnalyzerKind, AnalyzerResult, Claim};
use async_trait::async_trait;
use std::sync::Arc;

pub use image::ImageAuthenticityAnalyzer;
pub use inconsistency::InconsistencyAnalyzer;
pub use network::NetworkAnalyzer;
pub use pattern::PatternAnalyzer;

/// One independent analysis over a claim
#[async_trait]
pub trait Analyzer: Send + Sync {
    fn kind(&self) -> AnalyzerKind;

    /// Risk factor name
    fn name(&self) -> &'static str {
        self.kind().factor_name()
    }

    fn default_weight(&self) -> f64 {
        self.kind().default_weight()
    }

    /// Analyze the claim. Must not fail outside the returned result.
    async fn run(&self, claim: &Claim, context: &AnalyzerContext) -> AnalyzerResult;
}

/// Everything an analyzer may use during a run
#[derive(Clone)]
pub struct AnalyzerContext {
    pub capabilities: Capabilities,
    pub retry: RetryPolicy,
    pub extractor: Arc<AttributeExtractor>,
    pub retriever: PatternRetriever,
    pub graph_builder: ClaimGraphBuilder,
    /// Cohesion a community must exceed to count as a fraud ring
    pub cohesion_threshold: f64,
}

impl AnalyzerContext {
    pub fn new(capabilities: Capabilities, config: &AppConfig) -> Self {
        Self {
            capabilities,
            retry: config.capabilities.retry_policy(),
            extractor: Arc::new(AttributeExtractor::new()),
            retriever: PatternRetriever::from_config(&config.retrieval),
            graph_builder: ClaimGraphBuilder::from_config(&config.network),
            cohesion_threshold: config.network.cohesion_threshold,
        }
    }

    /// Default settings around the given capabilities
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self::new(capabilities, &AppConfig::default())
    }
}

/// Instantiate the analyzer for a configured kind
pub fn analyzer_for(kind: AnalyzerKind) -> Arc<dyn Analyzer> {
    match kind {
        AnalyzerKind::Inconsistency => Arc::new(InconsistencyAnalyzer::new()),
        AnalyzerKind::Pattern => Arc::new(PatternAnalyzer::new()),
        AnalyzerKind::Network => Arc::new(NetworkAnalyzer::new()),
        AnalyzerKind::ImageAuthenticity => Arc::new(ImageAuthenticityAnalyzer::new()),
    }
}

/// Instantiate analyzers in configuration order
pub fn build_analyzers(kinds: &[AnalyzerKind]) -> Vec<Arc<dyn Analyzer>> {
    kinds.iter().map(|kind| analyzer_for(*kind)).collect()
}

pub(crate) fn capability_failure(err: &CapabilityError) -> AnalyzerResult {
    AnalyzerResult::failure(err.failure_kind(), err.to_string())
}
