//! Configuration management for the claim fraud engine

use crate::capabilities::RetryPolicy;
use crate::error::ConfigError;
use crate::types::{AnalyzerKind, RiskLevelThresholds};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "CLAIM_ENGINE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming claims
    pub claim_subject: String,
    /// Subject for outgoing claim reports
    pub report_subject: String,
}

/// Inference, embedding, rerank and vision endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapabilitiesConfig {
    /// OpenAI-compatible API base URL (chat completions, embeddings)
    pub base_url: String,
    /// Reranking endpoint
    pub rerank_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub completion_model: String,
    pub embedding_model: String,
    pub rerank_model: String,
    pub vision_model: String,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
    /// Attempts per capability call, including the first
    pub retry_attempts: u32,
    /// Initial retry backoff in milliseconds
    pub retry_backoff_ms: u64,
}

impl CapabilitiesConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://integrate.api.nvidia.com/v1".to_string(),
            rerank_url: "https://ai.api.nvidia.com/v1/retrieval/nvidia/reranking".to_string(),
            api_key_env: "NVIDIA_API_KEY".to_string(),
            completion_model: "meta/llama-3.3-70b-instruct".to_string(),
            embedding_model: "nvidia/nv-embedqa-e5-v5".to_string(),
            rerank_model: "nvidia/nv-rerankqa-mistral-4b-v3".to_string(),
            vision_model: "meta/llama-3.2-11b-vision-instruct".to_string(),
            timeout_secs: 60,
            retry_attempts: 3,
            retry_backoff_ms: 250,
        }
    }
}

/// Which analyzers run and how long each may take
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Enabled analyzers, in report order
    pub analyzers: Vec<AnalyzerKind>,
    /// Per-analyzer timeout in milliseconds
    pub task_timeout_ms: u64,
}

impl OrchestratorConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            analyzers: AnalyzerKind::ALL.to_vec(),
            task_timeout_ms: 30_000,
        }
    }
}

/// Two-stage pattern retrieval settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates fetched by vector similarity
    pub top_k: usize,
    /// Matches kept after reranking
    pub top_n: usize,
    /// Candidates below this similarity are dropped before reranking
    pub min_similarity: f64,
    /// JSON file with the fraud pattern corpus
    pub corpus_path: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            top_n: 5,
            min_similarity: 0.2,
            corpus_path: "config/patterns.json".to_string(),
        }
    }
}

/// Fraud ring detection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// A community must exceed this cohesion to count as a ring
    pub cohesion_threshold: f64,
    /// Maximum stored claims pulled into one graph
    pub history_window: usize,
    /// Maximum stored claims taken per attribute lookup
    pub max_matches_per_attribute: usize,
    /// Claims kept in the in-process history store before the oldest are evicted
    pub store_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cohesion_threshold: 0.3,
            history_window: 200,
            max_matches_per_attribute: 50,
            store_capacity: 100_000,
        }
    }
}

/// Ensemble scoring configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Per-analyzer weights; must cover exactly the enabled analyzers and sum to 1
    #[serde(deserialize_with = "deserialize_weights")]
    pub weights: BTreeMap<AnalyzerKind, f64>,
    /// Risk level classification thresholds
    pub risk_levels: RiskLevelThresholds,
    /// Score reported when no analyzer succeeded
    pub neutral_score: f64,
}

fn deserialize_weights<'de, D>(deserializer: D) -> Result<BTreeMap<AnalyzerKind, f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, f64>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, weight)| {
            AnalyzerKind::from_key(&key)
                .map(|kind| (kind, weight))
                .ok_or_else(|| serde::de::Error::custom(format!("unknown analyzer '{}'", key)))
        })
        .collect()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: AnalyzerKind::ALL
                .iter()
                .map(|kind| (*kind, kind.default_weight()))
                .collect(),
            risk_levels: RiskLevelThresholds::default(),
            neutral_score: 50.0,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Claims analyzed concurrently
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `$CLAIM_ENGINE_CONFIG` or `config/config.toml`
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load and validate configuration from a specific path.
    ///
    /// `CLAIM_ENGINE__SECTION__KEY` environment variables override file values.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("CLAIM_ENGINE").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make scoring ambiguous
    pub fn validate(&self) -> Result<(), ConfigError> {
        let analyzers = &self.orchestrator.analyzers;
        if analyzers.is_empty() {
            return Err(ConfigError::NoAnalyzers);
        }
        let mut seen = BTreeSet::new();
        for kind in analyzers {
            if !seen.insert(*kind) {
                return Err(ConfigError::DuplicateAnalyzer(kind.key().to_string()));
            }
        }
        if self.orchestrator.task_timeout_ms == 0 {
            return Err(ConfigError::Orchestrator(
                "task_timeout_ms must be positive".to_string(),
            ));
        }

        validate_weights(&self.scoring.weights, analyzers)?;
        validate_thresholds(&self.scoring.risk_levels)?;
        if !(0.0..=100.0).contains(&self.scoring.neutral_score) {
            return Err(ConfigError::Thresholds(format!(
                "neutral_score must be within [0, 100], got {}",
                self.scoring.neutral_score
            )));
        }

        let retrieval = &self.retrieval;
        if retrieval.top_n == 0 || retrieval.top_k == 0 {
            return Err(ConfigError::Retrieval(
                "top_k and top_n must be positive".to_string(),
            ));
        }
        if retrieval.top_n >= retrieval.top_k {
            return Err(ConfigError::Retrieval(format!(
                "top_n ({}) must be smaller than top_k ({})",
                retrieval.top_n, retrieval.top_k
            )));
        }
        if !(0.0..=1.0).contains(&retrieval.min_similarity) {
            return Err(ConfigError::Retrieval(format!(
                "min_similarity must be within [0, 1], got {}",
                retrieval.min_similarity
            )));
        }

        if !(0.0..=1.0).contains(&self.network.cohesion_threshold) {
            return Err(ConfigError::Network(format!(
                "cohesion_threshold must be within [0, 1], got {}",
                self.network.cohesion_threshold
            )));
        }
        if self.network.history_window == 0
            || self.network.max_matches_per_attribute == 0
            || self.network.store_capacity == 0
        {
            return Err(ConfigError::Network(
                "history_window, max_matches_per_attribute and store_capacity must be positive"
                    .to_string(),
            ));
        }

        if self.capabilities.retry_attempts == 0 {
            return Err(ConfigError::Capabilities(
                "retry_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Weights must cover exactly the enabled analyzers, lie in [0, 1] and sum to 1
pub fn validate_weights(
    weights: &BTreeMap<AnalyzerKind, f64>,
    analyzers: &[AnalyzerKind],
) -> Result<(), ConfigError> {
    for kind in analyzers {
        let weight = weights
            .get(kind)
            .copied()
            .ok_or_else(|| ConfigError::MissingWeight(kind.key().to_string()))?;
        // A zero weight would let an analyzer succeed without contributing
        if !(weight > 0.0 && weight <= 1.0) {
            return Err(ConfigError::InvalidWeight {
                analyzer: kind.key().to_string(),
                weight,
            });
        }
    }
    if let Some(kind) = weights.keys().find(|k| !analyzers.contains(k)) {
        return Err(ConfigError::UnusedWeight(kind.key().to_string()));
    }

    let total: f64 = weights.values().sum();
    if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ConfigError::WeightSum(total));
    }
    Ok(())
}

fn validate_thresholds(thresholds: &RiskLevelThresholds) -> Result<(), ConfigError> {
    let RiskLevelThresholds {
        medium,
        high,
        critical,
    } = *thresholds;
    if !(0.0 < medium && medium < high && high < critical && critical <= 100.0) {
        return Err(ConfigError::Thresholds(format!(
            "expected 0 < medium < high < critical <= 100, got {} / {} / {}",
            medium, high, critical
        )));
    }
    Ok(())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                claim_subject: "claims.submitted".to_string(),
                report_subject: "claims.scored".to_string(),
            },
            capabilities: CapabilitiesConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            retrieval: RetrievalConfig::default(),
            network: NetworkConfig::default(),
            scoring: ScoringConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestrator.analyzers.len(), 4);
        assert_eq!(config.orchestrator.task_timeout(), Duration::from_secs(30));
        assert_eq!(config.scoring.weights.get(&AnalyzerKind::Pattern), Some(&0.3));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = AppConfig::default();
        config.scoring.weights.insert(AnalyzerKind::Network, 0.4);
        assert!(matches!(config.validate(), Err(ConfigError::WeightSum(_))));
    }

    #[test]
    fn test_missing_weight_is_rejected() {
        let mut config = AppConfig::default();
        config.scoring.weights.remove(&AnalyzerKind::ImageAuthenticity);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingWeight(name)) if name == "image_authenticity"
        ));
    }

    #[test]
    fn test_weight_for_disabled_analyzer_is_rejected() {
        let mut config = AppConfig::default();
        config.orchestrator.analyzers = vec![
            AnalyzerKind::Inconsistency,
            AnalyzerKind::Pattern,
            AnalyzerKind::Network,
        ];
        assert!(matches!(config.validate(), Err(ConfigError::UnusedWeight(_))));
    }

    #[test]
    fn test_zero_weight_is_rejected() {
        let mut config = AppConfig::default();
        config.scoring.weights.insert(AnalyzerKind::Network, 0.0);
        config.scoring.weights.insert(AnalyzerKind::ImageAuthenticity, 0.4);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWeight { analyzer, weight }) if analyzer == "network" && weight == 0.0
        ));
    }

    #[test]
    fn test_store_capacity_must_be_positive() {
        let mut config = AppConfig::default();
        config.network.store_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Network(_))));
    }

    #[test]
    fn test_thresholds_must_ascend() {
        let mut config = AppConfig::default();
        config.scoring.risk_levels.high = 20.0;
        assert!(matches!(config.validate(), Err(ConfigError::Thresholds(_))));
    }

    #[test]
    fn test_top_n_must_be_below_top_k() {
        let mut config = AppConfig::default();
        config.retrieval.top_n = 10;
        assert!(matches!(config.validate(), Err(ConfigError::Retrieval(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "claim-engine-config-{}.toml",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(
            &path,
            r#"
[nats]
url = "nats://nats:4222"
claim_subject = "claims.in"
report_subject = "claims.out"

[orchestrator]
analyzers = ["inconsistency", "pattern", "network"]
task_timeout_ms = 5000

[scoring.weights]
inconsistency = 0.4
pattern = 0.4
network = 0.2
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.nats.claim_subject, "claims.in");
        assert_eq!(config.orchestrator.analyzers.len(), 3);
        assert_eq!(config.scoring.weights.get(&AnalyzerKind::Network), Some(&0.2));
        assert_eq!(config.retrieval.top_k, 10);
    }
}
