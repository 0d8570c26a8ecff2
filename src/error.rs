//! Error types for capabilities, configuration and runs

use crate::types::FailureKind;
use thiserror::Error;

/// Failure of an external capability call (completion, embedding, search,
/// rerank, claim store, image inspection)
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    /// Network error, rate limit or server-side error; safe to retry
    #[error("transient capability error: {0}")]
    Transient(String),

    /// Response could not be parsed
    #[error("malformed capability response: {0}")]
    Malformed(String),

    /// Request rejected or capability not deployed
    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

impl CapabilityError {
    /// Whether the calling analyzer may retry the call
    pub fn is_retryable(&self) -> bool {
        matches!(self, CapabilityError::Transient(_))
    }

    /// Failure kind recorded in the analyzer result
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            CapabilityError::Transient(_) => FailureKind::Transient,
            CapabilityError::Malformed(_) => FailureKind::Malformed,
            CapabilityError::Unavailable(_) => FailureKind::Unavailable,
        }
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CapabilityError::Malformed(err.to_string())
        } else if err.is_builder() {
            CapabilityError::Unavailable(err.to_string())
        } else {
            CapabilityError::Transient(err.to_string())
        }
    }
}

/// Invalid or missing configuration; fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("no analyzers configured")]
    NoAnalyzers,

    #[error("analyzer '{0}' is configured twice")]
    DuplicateAnalyzer(String),

    #[error("missing weight for analyzer '{0}'")]
    MissingWeight(String),

    #[error("weight for analyzer '{analyzer}' must be within (0, 1], got {weight}")]
    InvalidWeight { analyzer: String, weight: f64 },

    #[error("weight configured for analyzer '{0}' which is not enabled")]
    UnusedWeight(String),

    #[error("analyzer weights must sum to 1, got {0}")]
    WeightSum(f64),

    #[error("invalid risk thresholds: {0}")]
    Thresholds(String),

    #[error("invalid retrieval settings: {0}")]
    Retrieval(String),

    #[error("invalid network settings: {0}")]
    Network(String),

    #[error("invalid orchestrator settings: {0}")]
    Orchestrator(String),

    #[error("invalid capability settings: {0}")]
    Capabilities(String),
}

/// Run-level failure; analyzer failures never surface here
#[derive(Debug, Error)]
pub enum RunError {
    #[error("analysis of claim '{0}' was cancelled")]
    Cancelled(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_retry() {
        assert!(CapabilityError::Transient("429".into()).is_retryable());
        assert!(!CapabilityError::Malformed("bad json".into()).is_retryable());
        assert!(!CapabilityError::Unavailable("404".into()).is_retryable());
    }

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            CapabilityError::Malformed("x".into()).failure_kind(),
            FailureKind::Malformed
        );
        assert_eq!(
            CapabilityError::Transient("x".into()).failure_kind(),
            FailureKind::Transient
        );
    }
}
