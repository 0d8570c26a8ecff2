//! Fraud pattern corpus loader

use super::FraudPattern;
use crate::capabilities::{Embedder, RetryPolicy, VectorIndex};
use crate::types::Severity;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// A corpus record before embedding
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatternSeed {
    pub id: String,
    pub text: String,
    pub category: String,
    #[serde(default)]
    pub severity: Severity,
}

/// Read pattern seeds from a JSON array file
pub fn load_seeds<P: AsRef<Path>>(path: P) -> Result<Vec<PatternSeed>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .context(format!("Failed to read pattern corpus from {:?}", path))?;
    let seeds: Vec<PatternSeed> = serde_json::from_str(&raw)
        .context(format!("Failed to parse pattern corpus {:?}", path))?;
    Ok(seeds)
}

/// Embed every seed and append it to the index.
///
/// Runs at startup, before any claim is analyzed. Returns the number of
/// patterns inserted.
pub async fn load_corpus(
    seeds: Vec<PatternSeed>,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    retry: &RetryPolicy,
) -> Result<usize> {
    let total = seeds.len();
    for seed in seeds {
        let text = seed.text.as_str();
        let embedding = retry
            .run("embed_passage", move || embedder.embed_passage(text))
            .await
            .context(format!("Failed to embed pattern {}", seed.id))?;

        index
            .insert(FraudPattern {
                id: seed.id,
                text: seed.text,
                category: seed.category,
                severity: seed.severity,
                embedding,
            })
            .await?;
    }

    info!(patterns = total, "Fraud pattern corpus loaded");
    Ok(total)
}
