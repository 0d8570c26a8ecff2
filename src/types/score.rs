//! Fused fraud score and its itemized breakdown

use crate::types::result::{AnalyzerKind, FailureKind};
use serde::{Deserialize, Serialize};

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Determine risk level from a 0 - 100 score and thresholds
    pub fn from_score(score: f64, thresholds: &RiskLevelThresholds) -> Self {
        if score >= thresholds.critical {
            RiskLevel::Critical
        } else if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Recommended handling for this level
    pub fn recommendation(&self) -> Recommendation {
        match self {
            RiskLevel::Low => Recommendation::Monitor,
            RiskLevel::Medium => Recommendation::Review,
            RiskLevel::High => Recommendation::Investigate,
            RiskLevel::Critical => Recommendation::Escalate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Lower bounds (inclusive) of each risk level on the 0 - 100 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 30.0,
            high: 60.0,
            critical: 80.0,
        }
    }
}

/// Handling recommendation derived from the risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Monitor,
    Review,
    Investigate,
    Escalate,
}

impl Recommendation {
    /// Tag shown to adjusters
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Monitor => "monitor",
            Recommendation::Review => "review — additional documentation required",
            Recommendation::Investigate => "investigate — assign to fraud analyst",
            Recommendation::Escalate => "deny/escalate — refer to investigations unit",
        }
    }
}

/// One analyzer's contribution to the fused score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub analyzer: AnalyzerKind,
    pub name: String,
    /// Analyzer score (0 - 100)
    pub raw_score: f64,
    /// Effective weight after redistribution; sums to 1 across the factors
    pub weight: f64,
    /// Weight as configured, before redistribution
    pub configured_weight: f64,
    /// raw_score × weight
    pub contribution: f64,
    pub description: String,
    pub evidence: Vec<String>,
}

/// An analyzer that did not contribute to the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingFactor {
    pub analyzer: AnalyzerKind,
    pub name: String,
    /// `timeout` or the failure kind
    pub status: String,
    pub reason: String,
}

impl MissingFactor {
    pub fn timeout(analyzer: AnalyzerKind) -> Self {
        Self {
            analyzer,
            name: analyzer.factor_name().to_string(),
            status: "timeout".to_string(),
            reason: "analyzer exceeded its deadline".to_string(),
        }
    }

    pub fn failure(analyzer: AnalyzerKind, kind: FailureKind, message: &str) -> Self {
        let status = serde_json::to_value(kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "failure".to_string());
        Self {
            analyzer,
            name: analyzer.factor_name().to_string(),
            status,
            reason: message.to_string(),
        }
    }
}

/// Final assessment for one claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Fused fraud score (0 - 100)
    pub fraud_score: f64,
    pub risk_level: RiskLevel,
    /// Contributing factors, largest contribution first
    pub risk_factors: Vec<RiskFactor>,
    /// Analyzers that failed or timed out
    pub missing_factors: Vec<MissingFactor>,
    /// Fraction of configured analyzers that succeeded (0.0 - 1.0)
    pub confidence: f64,
    pub recommendation: Recommendation,
}

impl ScoreResult {
    pub fn recommendation_text(&self) -> &'static str {
        self.recommendation.as_str()
    }
}
