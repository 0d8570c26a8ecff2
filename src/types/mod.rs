//! Type definitions shared across the engine

pub mod claim;
pub mod report;
pub mod result;
pub mod score;

pub use claim::{Claim, Vertical};
pub use report::ClaimReport;
pub use result::{AnalyzerKind, AnalyzerRecord, AnalyzerResult, FailureKind, Finding, Severity};
pub use score::{MissingFactor, Recommendation, RiskFactor, RiskLevel, RiskLevelThresholds, ScoreResult};
