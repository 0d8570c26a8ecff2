//! External capability contracts the analyzers depend on.
//!
//! Every collaborator (text completion, embedding, vector search, rerank,
//! historical claim store, image inspection) sits behind an async trait so
//! the orchestrator can be wired with HTTP clients in production and with
//! in-memory fakes in tests.

pub mod http;
pub mod memory;

use crate::attributes::ClaimAttribute;
use crate::error::CapabilityError;
use crate::retrieval::FraudPattern;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use http::NimClient;
pub use memory::{InMemoryClaimStore, InMemoryPatternIndex};

/// Generation parameters passed alongside a prompt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionContext {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionContext {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 1500,
        }
    }
}

/// Black-box text completion (LLM inference)
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        context: &CompletionContext,
    ) -> Result<String, CapabilityError>;
}

/// Text embedding with a fixed dimensionality
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed query text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError>;

    /// Embed corpus text; asymmetric models override this
    async fn embed_passage(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        self.embed(text).await
    }
}

/// A pattern returned by vector search with its similarity (0.0 - 1.0)
#[derive(Debug, Clone)]
pub struct ScoredPattern {
    pub pattern: Arc<FraudPattern>,
    pub similarity: f64,
}

/// Nearest-neighbour search over the fraud pattern corpus
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `k` patterns, most similar first
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPattern>, CapabilityError>;

    /// Append a pattern (offline corpus growth, never on the request path)
    async fn insert(&self, pattern: FraudPattern) -> Result<(), CapabilityError>;

    /// Number of stored patterns
    async fn len(&self) -> Result<usize, CapabilityError>;
}

/// Second-stage relevance scoring
#[async_trait]
pub trait Reranker: Send + Sync {
    /// One score per candidate, in candidate order
    async fn rerank(&self, query: &str, candidates: &[String]) -> Result<Vec<f64>, CapabilityError>;
}

/// What the historical store keeps about a past claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSummary {
    pub claim_id: String,
    pub attributes: BTreeSet<ClaimAttribute>,
    pub received_at: DateTime<Utc>,
}

/// Historical claim storage with an attribute index
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Identifiers of stored claims carrying this attribute value, most
    /// recently received first (ties by claim id)
    async fn query_by_attribute(
        &self,
        attribute: &ClaimAttribute,
    ) -> Result<Vec<String>, CapabilityError>;

    async fn get(&self, claim_id: &str) -> Result<Option<ClaimSummary>, CapabilityError>;

    /// Append a claim after it has been analyzed
    async fn insert(&self, summary: ClaimSummary) -> Result<(), CapabilityError>;
}

/// Authenticity verdict for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVerdict {
    /// Manipulation likelihood (0 - 100)
    pub manipulation_score: f64,
    /// Detected manipulation traces (`ai_generated`, `cloned_region`, ...)
    pub detections: Vec<String>,
}

/// Image authenticity scoring
#[async_trait]
pub trait ImageInspector: Send + Sync {
    async fn inspect(&self, image_ref: &str) -> Result<ImageVerdict, CapabilityError>;
}

/// The collaborators handed to analyzers
#[derive(Clone)]
pub struct Capabilities {
    pub completion: Arc<dyn TextCompletion>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub reranker: Arc<dyn Reranker>,
    pub store: Arc<dyn ClaimStore>,
    pub images: Arc<dyn ImageInspector>,
}

/// Bounded retry for transient capability errors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub attempts: u32,
    /// Delay before the first retry; doubled for each further retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Run `call` until it succeeds, fails permanently, or the budget is spent
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, CapabilityError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CapabilityError>>,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.backoff;
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!(
                        operation = %operation,
                        attempt = attempt,
                        error = %err,
                        "Transient capability error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
