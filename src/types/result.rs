//! Analyzer identities and per-analyzer results

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// The closed set of analyzers the orchestrator can run.
///
/// The variant order is the canonical factor order used to break ties in
/// the score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    Inconsistency,
    Pattern,
    Network,
    ImageAuthenticity,
}

impl AnalyzerKind {
    pub const ALL: [AnalyzerKind; 4] = [
        AnalyzerKind::Inconsistency,
        AnalyzerKind::Pattern,
        AnalyzerKind::Network,
        AnalyzerKind::ImageAuthenticity,
    ];

    /// Configuration key (matches the serde representation)
    pub fn key(&self) -> &'static str {
        match self {
            AnalyzerKind::Inconsistency => "inconsistency",
            AnalyzerKind::Pattern => "pattern",
            AnalyzerKind::Network => "network",
            AnalyzerKind::ImageAuthenticity => "image_authenticity",
        }
    }

    /// Inverse of [`AnalyzerKind::key`]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// Risk factor name shown in the score breakdown
    pub fn factor_name(&self) -> &'static str {
        match self {
            AnalyzerKind::Inconsistency => "Inconsistencies",
            AnalyzerKind::Pattern => "Fraud Pattern Match",
            AnalyzerKind::Network => "Network/Ring Risk",
            AnalyzerKind::ImageAuthenticity => "Image Authenticity",
        }
    }

    /// Default ensemble weight
    pub fn default_weight(&self) -> f64 {
        match self {
            AnalyzerKind::Inconsistency => 0.3,
            AnalyzerKind::Pattern => 0.3,
            AnalyzerKind::Network => 0.2,
            AnalyzerKind::ImageAuthenticity => 0.2,
        }
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Severity attached to findings and fraud patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse the first severity word found in free text
    pub fn from_text(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("critical") {
            Some(Severity::Critical)
        } else if lower.contains("high") {
            Some(Severity::High)
        } else if lower.contains("medium") || lower.contains("moderate") {
            Some(Severity::Medium)
        } else if lower.contains("low") {
            Some(Severity::Low)
        } else {
            None
        }
    }

    /// Points contributed by an inconsistency of this severity
    pub fn inconsistency_points(&self) -> f64 {
        match self {
            Severity::Critical => 30.0,
            Severity::High => 20.0,
            Severity::Medium => 10.0,
            Severity::Low => 5.0,
        }
    }

    /// Multiplier applied to a matched fraud pattern of this severity
    pub fn pattern_multiplier(&self) -> f64 {
        match self {
            Severity::Critical => 2.0,
            Severity::High => 1.5,
            Severity::Medium => 1.0,
            Severity::Low => 0.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// One piece of evidence produced by an analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Finding category (timeline, logical, numerical, pattern category, ...)
    pub category: String,
    /// Human-readable description
    pub description: String,
    pub severity: Severity,
    /// Analyzer confidence in this finding (0.0 - 1.0)
    pub confidence: f64,
    /// Supporting excerpts or identifiers
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Finding {
    pub fn new(category: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            category: category.into(),
            description: description.into(),
            severity,
            confidence: 1.0,
            evidence: Vec::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }
}

/// Why an analyzer could not produce a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network error or rate limit that survived the retry budget
    Transient,
    /// Capability returned output that could not be parsed
    Malformed,
    /// Capability rejected the request or is not deployed
    Unavailable,
    /// The claim carries nothing this analyzer can inspect
    NotApplicable,
    /// The analyzer task itself crashed
    Internal,
}

/// Outcome of one analyzer task for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzerResult {
    Success {
        /// Risk score (0 - 100)
        score: f64,
        /// Ordered findings, most relevant first
        findings: Vec<Finding>,
        /// Analyzer-specific details for downstream renderers
        metadata: Map<String, Value>,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
    Timeout,
}

impl AnalyzerResult {
    /// Successful result; the score is clamped into 0 - 100
    pub fn success(score: f64, findings: Vec<Finding>, metadata: Map<String, Value>) -> Self {
        let score = if score.is_finite() { score.clamp(0.0, 100.0) } else { 0.0 };
        AnalyzerResult::Success {
            score,
            findings,
            metadata,
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        AnalyzerResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalyzerResult::Success { .. })
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            AnalyzerResult::Success { score, .. } => Some(*score),
            _ => None,
        }
    }

    /// Short status label used in logs and metrics
    pub fn status(&self) -> &'static str {
        match self {
            AnalyzerResult::Success { .. } => "success",
            AnalyzerResult::Failure { .. } => "failure",
            AnalyzerResult::Timeout => "timeout",
        }
    }

    /// `summary` string from the metadata, if the analyzer provided one
    pub fn summary(&self) -> Option<&str> {
        match self {
            AnalyzerResult::Success { metadata, .. } => {
                metadata.get("summary").and_then(Value::as_str)
            }
            _ => None,
        }
    }
}

/// Result of one analyzer tagged with its identity and wall time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerRecord {
    pub analyzer: AnalyzerKind,
    pub result: AnalyzerResult,
    pub elapsed_ms: u64,
}

impl AnalyzerRecord {
    pub fn new(analyzer: AnalyzerKind, result: AnalyzerResult, elapsed: Duration) -> Self {
        Self {
            analyzer,
            result,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}
