//! Report published for every analyzed claim

use crate::types::result::{AnalyzerKind, AnalyzerRecord, AnalyzerResult};
use crate::types::score::ScoreResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score plus raw analyzer output, for narrative generation and dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimReport {
    /// Unique report identifier
    pub report_id: String,

    /// Analyzed claim
    pub claim_id: String,

    /// Fused assessment
    pub score: ScoreResult,

    /// Whether the network analyzer placed the claim in a fraud ring
    pub fraud_ring_detected: bool,

    /// One record per configured analyzer
    pub analyzers: Vec<AnalyzerRecord>,

    /// End-to-end processing time
    pub processing_time_ms: u64,

    /// Report generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl ClaimReport {
    /// Create a new report
    pub fn new(claim_id: String, score: ScoreResult, analyzers: Vec<AnalyzerRecord>) -> Self {
        let fraud_ring_detected = ring_flag(&analyzers);
        Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            claim_id,
            score,
            fraud_ring_detected,
            analyzers,
            processing_time_ms: 0,
            timestamp: Utc::now(),
        }
    }

    /// Attach the end-to-end processing time
    pub fn with_processing_time(mut self, processing_time_ms: u64) -> Self {
        self.processing_time_ms = processing_time_ms;
        self
    }
}

fn ring_flag(records: &[AnalyzerRecord]) -> bool {
    records
        .iter()
        .filter(|r| r.analyzer == AnalyzerKind::Network)
        .any(|r| match &r.result {
            AnalyzerResult::Success { metadata, .. } => metadata
                .get("fraud_ring_detected")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            _ => false,
        })
}
