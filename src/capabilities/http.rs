//! HTTP client for hosted inference endpoints.
//!
//! Speaks the OpenAI-compatible chat and embedding APIs plus a
//! passage-ranking endpoint, and uses a vision chat model for image
//! authenticity checks.

use super::{CompletionContext, Embedder, ImageInspector, ImageVerdict, Reranker, TextCompletion};
use crate::config::CapabilitiesConfig;
use crate::error::{CapabilityError, ConfigError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Client for chat completion, embedding, rerank and vision endpoints
#[derive(Clone)]
pub struct NimClient {
    client: Client,
    api_key: String,
    base_url: String,
    rerank_url: String,
    completion_model: String,
    embedding_model: String,
    rerank_model: String,
    vision_model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct RerankText<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: RerankText<'a>,
    passages: Vec<RerankText<'a>>,
}

#[derive(Deserialize)]
struct RerankResponse {
    rankings: Vec<Ranking>,
}

#[derive(Deserialize)]
struct Ranking {
    index: usize,
    logit: f64,
}

impl NimClient {
    /// Build a client; the API key is read from the configured environment variable
    pub fn new(config: &CapabilitiesConfig) -> Result<Self, ConfigError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ConfigError::Capabilities(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Capabilities(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rerank_url: config.rerank_url.clone(),
            completion_model: config.completion_model.clone(),
            embedding_model: config.embedding_model.clone(),
            rerank_model: config.rerank_model.clone(),
            vision_model: config.vision_model.clone(),
        })
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, CapabilityError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(CapabilityError::Transient(format!("{} returned {}", url, status)));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Unavailable(format!(
                "{} returned {}: {}",
                url, status, detail
            )));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| CapabilityError::Malformed(e.to_string()))
    }

    async fn chat(
        &self,
        model: &str,
        content: serde_json::Value,
        context: &CompletionContext,
    ) -> Result<String, CapabilityError> {
        let body = json!({
            "model": model,
            "messages": [{"role": "user", "content": content}],
            "temperature": context.temperature,
            "max_tokens": context.max_tokens,
        });

        let response: ChatResponse = self
            .post_json(&format!("{}/chat/completions", self.base_url), &body)
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CapabilityError::Malformed("completion has no content".to_string()))
    }

    async fn embed_with(&self, text: &str, input_type: &str) -> Result<Vec<f32>, CapabilityError> {
        let body = json!({
            "model": self.embedding_model,
            "input": [text],
            "input_type": input_type,
            "encoding_format": "float",
            "truncate": "END",
        });

        let response: EmbeddingResponse = self
            .post_json(&format!("{}/embeddings", self.base_url), &body)
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CapabilityError::Malformed("empty embedding response".to_string()))
    }
}

#[async_trait]
impl TextCompletion for NimClient {
    async fn complete(
        &self,
        prompt: &str,
        context: &CompletionContext,
    ) -> Result<String, CapabilityError> {
        self.chat(&self.completion_model, json!(prompt), context).await
    }
}

#[async_trait]
impl Embedder for NimClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        self.embed_with(text, "query").await
    }

    async fn embed_passage(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        self.embed_with(text, "passage").await
    }
}

#[async_trait]
impl Reranker for NimClient {
    async fn rerank(&self, query: &str, candidates: &[String]) -> Result<Vec<f64>, CapabilityError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let body = RerankRequest {
            model: &self.rerank_model,
            query: RerankText { text: query },
            passages: candidates.iter().map(|c| RerankText { text: c }).collect(),
        };
        let response: RerankResponse = self.post_json(&self.rerank_url, &body).await?;
        debug!(candidates = candidates.len(), "Rerank response received");

        rankings_to_scores(response.rankings, candidates.len())
    }
}

#[async_trait]
impl ImageInspector for NimClient {
    async fn inspect(&self, image_ref: &str) -> Result<ImageVerdict, CapabilityError> {
        let content = json!([
            {"type": "text", "text": VISION_PROMPT},
            {"type": "image_url", "image_url": {"url": image_ref}},
        ]);
        let context = CompletionContext {
            temperature: 0.1,
            max_tokens: 300,
        };
        let text = self.chat(&self.vision_model, content, &context).await?;
        parse_image_verdict(&text)
    }
}

const VISION_PROMPT: &str = "You are a forensic image analyst for insurance claims. \
Assess whether this image shows signs of manipulation (editing, cloned regions, \
AI generation, inconsistent lighting or metadata). Reply with exactly two lines:\n\
SCORE: <0-100 manipulation likelihood>\n\
DETECTIONS: <comma-separated trace names, or none>";

/// Map ranking logits back to candidate order
fn rankings_to_scores(rankings: Vec<Ranking>, expected: usize) -> Result<Vec<f64>, CapabilityError> {
    let mut scores = vec![None; expected];
    for ranking in rankings {
        let slot = scores.get_mut(ranking.index).ok_or_else(|| {
            CapabilityError::Malformed(format!("ranking index {} out of range", ranking.index))
        })?;
        *slot = Some(sigmoid(ranking.logit));
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            s.ok_or_else(|| CapabilityError::Malformed(format!("no ranking for candidate {}", i)))
        })
        .collect()
}

fn sigmoid(logit: f64) -> f64 {
    1.0 / (1.0 + (-logit).exp())
}

fn parse_image_verdict(text: &str) -> Result<ImageVerdict, CapabilityError> {
    let mut score = None;
    let mut detections = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = strip_prefix_ignore_case(line, "SCORE:") {
            let number: String = rest
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            score = number.parse::<f64>().ok();
        } else if let Some(rest) = strip_prefix_ignore_case(line, "DETECTIONS:") {
            detections = rest
                .split(',')
                .map(|d| d.trim().to_lowercase().replace(' ', "_"))
                .filter(|d| !d.is_empty() && d != "none")
                .collect();
        }
    }

    let manipulation_score = score
        .ok_or_else(|| CapabilityError::Malformed(format!("no SCORE line in: {}", text)))?;
    Ok(ImageVerdict {
        manipulation_score: manipulation_score.clamp(0.0, 100.0),
        detections,
    })
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}
