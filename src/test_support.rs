//! Capability fakes shared by unit tests

use crate::capabilities::{
    Capabilities, ClaimStore, CompletionContext, Embedder, ImageInspector, ImageVerdict,
    InMemoryClaimStore, InMemoryPatternIndex, Reranker, TextCompletion,
};
use crate::error::CapabilityError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fails every call with `Unavailable`
pub struct Offline;

fn offline() -> CapabilityError {
    CapabilityError::Unavailable("offline".to_string())
}

#[async_trait]
impl TextCompletion for Offline {
    async fn complete(&self, _prompt: &str, _context: &CompletionContext) -> Result<String, CapabilityError> {
        Err(offline())
    }
}

#[async_trait]
impl Embedder for Offline {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CapabilityError> {
        Err(offline())
    }
}

#[async_trait]
impl Reranker for Offline {
    async fn rerank(&self, _query: &str, _candidates: &[String]) -> Result<Vec<f64>, CapabilityError> {
        Err(offline())
    }
}

#[async_trait]
impl ImageInspector for Offline {
    async fn inspect(&self, _image_ref: &str) -> Result<ImageVerdict, CapabilityError> {
        Err(offline())
    }
}

/// Answers with the first response whose keyword occurs in the prompt
pub struct ScriptedCompletion {
    responses: Vec<(&'static str, Result<String, CapabilityError>)>,
    pub calls: AtomicU32,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<(&'static str, Result<String, CapabilityError>)>) -> Self {
        Self {
            responses,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(&self, prompt: &str, _context: &CompletionContext) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .iter()
            .find(|(keyword, _)| prompt.contains(keyword))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// Same vector for every text
pub struct ConstantEmbedder(pub Vec<f32>);

#[async_trait]
impl Embedder for ConstantEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CapabilityError> {
        Ok(self.0.clone())
    }
}

/// Same relevance for every candidate
pub struct ConstantReranker(pub f64);

#[async_trait]
impl Reranker for ConstantReranker {
    async fn rerank(&self, _query: &str, candidates: &[String]) -> Result<Vec<f64>, CapabilityError> {
        Ok(vec![self.0; candidates.len()])
    }
}

/// Verdicts keyed by image reference; unknown images are unavailable
#[derive(Default)]
pub struct StaticImages(pub HashMap<String, ImageVerdict>);

#[async_trait]
impl ImageInspector for StaticImages {
    async fn inspect(&self, image_ref: &str) -> Result<ImageVerdict, CapabilityError> {
        self.0.get(image_ref).cloned().ok_or_else(offline)
    }
}

/// Never answers within any reasonable deadline
pub struct Stalled;

#[async_trait]
impl TextCompletion for Stalled {
    async fn complete(&self, _prompt: &str, _context: &CompletionContext) -> Result<String, CapabilityError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(offline())
    }
}

/// All external capabilities offline, with empty in-memory stores
pub fn offline_capabilities() -> Capabilities {
    let store: Arc<dyn ClaimStore> = Arc::new(InMemoryClaimStore::new());
    Capabilities {
        completion: Arc::new(Offline),
        embedder: Arc::new(Offline),
        index: Arc::new(InMemoryPatternIndex::new()),
        reranker: Arc::new(Offline),
        store,
        images: Arc::new(Offline),
    }
}
