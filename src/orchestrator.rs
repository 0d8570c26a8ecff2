//! Claim analysis orchestrator.
//!
//! Fans the configured analyzers out over one claim, each on its own task
//! with an independent timeout, waits until every task is terminal and
//! hands the collected results to the scoring engine.

use crate::analyzers::{build_analyzers, Analyzer, AnalyzerContext};
use crate::capabilities::Capabilities;
use crate::config::AppConfig;
use crate::error::{ConfigError, RunError};
use crate::scoring::ScoringEngine;
use crate::types::{AnalyzerKind, AnalyzerRecord, AnalyzerResult, Claim, ClaimReport, FailureKind, ScoreResult};
use futures::FutureExt;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Caller side of a run cancellation
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Signal every run holding a signal from this handle
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            receiver: Some(self.sender.subscribe()),
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Run side of a cancellation
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self { receiver: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver.as_ref().map(|r| *r.borrow()).unwrap_or(false)
    }

    /// Resolves once cancellation is requested; pending forever otherwise
    pub async fn cancelled(&mut self) {
        if let Some(receiver) = self.receiver.as_mut() {
            loop {
                if *receiver.borrow_and_update() {
                    return;
                }
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        }
        std::future::pending::<()>().await
    }
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub claim_id: String,
    /// One record per configured analyzer, in configuration order
    pub records: Vec<AnalyzerRecord>,
    pub score: ScoreResult,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn into_report(self) -> ClaimReport {
        ClaimReport::new(self.claim_id, self.score, self.records)
            .with_processing_time(self.elapsed.as_millis() as u64)
    }
}

/// Runs analyzers concurrently and scores the result set
pub struct Orchestrator {
    analyzers: Vec<Arc<dyn Analyzer>>,
    context: Arc<AnalyzerContext>,
    scoring: ScoringEngine,
    task_timeout: Duration,
}

impl Orchestrator {
    /// Assemble an orchestrator; the analyzer set must match the scoring configuration
    pub fn new(
        analyzers: Vec<Arc<dyn Analyzer>>,
        context: AnalyzerContext,
        scoring: ScoringEngine,
        task_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if analyzers.is_empty() {
            return Err(ConfigError::NoAnalyzers);
        }
        if task_timeout.is_zero() {
            return Err(ConfigError::Orchestrator(
                "task timeout must be positive".to_string(),
            ));
        }

        let mut kinds = BTreeSet::new();
        for analyzer in &analyzers {
            if !kinds.insert(analyzer.kind()) {
                return Err(ConfigError::DuplicateAnalyzer(analyzer.kind().key().to_string()));
            }
        }
        let scored: BTreeSet<AnalyzerKind> = scoring.analyzers().iter().copied().collect();
        if kinds != scored {
            return Err(ConfigError::Orchestrator(
                "analyzer set does not match the scoring configuration".to_string(),
            ));
        }

        Ok(Self {
            analyzers,
            context: Arc::new(context),
            scoring,
            task_timeout,
        })
    }

    /// Build from validated configuration and injected capabilities
    pub fn from_config(config: &AppConfig, capabilities: Capabilities) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::new(
            build_analyzers(&config.orchestrator.analyzers),
            AnalyzerContext::new(capabilities, config),
            ScoringEngine::from_config(config)?,
            config.orchestrator.task_timeout(),
        )
    }

    pub fn context(&self) -> &AnalyzerContext {
        &self.context
    }

    pub fn analyzer_kinds(&self) -> Vec<AnalyzerKind> {
        self.analyzers.iter().map(|a| a.kind()).collect()
    }

    /// Analyze a claim to completion
    pub async fn analyze(&self, claim: Claim) -> Result<RunOutcome, RunError> {
        self.analyze_with_cancel(claim, CancelSignal::never()).await
    }

    /// Analyze a claim unless `signal` fires first.
    ///
    /// On cancellation all in-flight analyzers are aborted and results
    /// already collected for the run are dropped.
    pub async fn analyze_with_cancel(
        &self,
        claim: Claim,
        mut signal: CancelSignal,
    ) -> Result<RunOutcome, RunError> {
        let claim_id = claim.claim_id.clone();
        if signal.is_cancelled() {
            return Err(RunError::Cancelled(claim_id));
        }

        let started = Instant::now();
        let claim = Arc::new(claim);
        let mut tasks = JoinSet::new();

        for (index, analyzer) in self.analyzers.iter().enumerate() {
            let analyzer = Arc::clone(analyzer);
            let claim = Arc::clone(&claim);
            let context = Arc::clone(&self.context);
            let timeout = self.task_timeout;

            tasks.spawn(async move {
                let kind = analyzer.kind();
                let task_started = Instant::now();
                let run = AssertUnwindSafe(analyzer.run(&claim, &context)).catch_unwind();

                let result = match tokio::time::timeout(timeout, run).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => {
                        AnalyzerResult::failure(FailureKind::Internal, "analyzer task panicked")
                    }
                    Err(_) => AnalyzerResult::Timeout,
                };
                (index, AnalyzerRecord::new(kind, result, task_started.elapsed()))
            });
        }
        debug!(claim_id = %claim_id, analyzers = self.analyzers.len(), "Analyzers dispatched");

        let mut slots: Vec<Option<AnalyzerRecord>> = vec![None; self.analyzers.len()];
        loop {
            tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    tasks.abort_all();
                    warn!(claim_id = %claim_id, "Claim analysis cancelled");
                    return Err(RunError::Cancelled(claim_id));
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((index, record))) => {
                        info!(
                            claim_id = %claim_id,
                            analyzer = %record.analyzer,
                            status = record.result.status(),
                            score = ?record.result.score(),
                            elapsed_ms = record.elapsed_ms,
                            "Analyzer finished"
                        );
                        if let Some(slot) = slots.get_mut(index) {
                            *slot = Some(record);
                        }
                    }
                    Some(Err(err)) => {
                        error!(claim_id = %claim_id, error = %err, "Analyzer task failed to join");
                    }
                },
            }
        }

        let records: Vec<AnalyzerRecord> = slots
            .into_iter()
            .zip(&self.analyzers)
            .map(|(slot, analyzer)| {
                slot.unwrap_or_else(|| {
                    AnalyzerRecord::new(
                        analyzer.kind(),
                        AnalyzerResult::failure(FailureKind::Internal, "analyzer task was lost"),
                        Duration::ZERO,
                    )
                })
            })
            .collect();

        let score = self.scoring.score(&records);
        let elapsed = started.elapsed();
        info!(
            claim_id = %claim_id,
            fraud_score = score.fraud_score,
            risk_level = score.risk_level.as_str(),
            confidence = score.confidence,
            elapsed_ms = elapsed.as_millis() as u64,
            "Claim analysis complete"
        );

        Ok(RunOutcome {
            claim_id,
            records,
            score,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::{InconsistencyAnalyzer, NetworkAnalyzer};
    use crate::test_support::{offline_capabilities, ConstantEmbedder, ScriptedCompletion, Stalled};
    use crate::types::{RiskLevel, Vertical};
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;

    fn claim() -> Claim {
        Claim::new("CLM-1", Vertical::Auto)
            .with_field("claimant.phone", "555-010-0199")
            .with_field("incident.description", "Rear-ended at a stop light")
            .with_field("claim.amount", 30_000.0)
            .with_field("policy.coverage_amount", 12_000.0)
    }

    fn orchestrator(capabilities: Capabilities, config: &AppConfig) -> Orchestrator {
        Orchestrator::from_config(config, capabilities).unwrap()
    }

    fn working_capabilities(completion: Arc<ScriptedCompletion>) -> Capabilities {
        Capabilities {
            completion,
            embedder: Arc::new(ConstantEmbedder(vec![1.0, 0.0])),
            ..offline_capabilities()
        }
    }

    #[tokio::test]
    async fn test_full_run_returns_one_record_per_analyzer() {
        let config = AppConfig::default();
        let completion = Arc::new(ScriptedCompletion::new(vec![(
            "timeline",
            Ok("1. Claim filed before the incident\nSeverity: critical".to_string()),
        )]));
        let outcome = orchestrator(working_capabilities(completion.clone()), &config)
            .analyze(claim())
            .await
            .unwrap();

        // One timeline pass and one logical pass, each called once
        assert_eq!(completion.calls.load(Ordering::SeqCst), 2);

        let kinds: Vec<AnalyzerKind> = outcome.records.iter().map(|r| r.analyzer).collect();
        assert_eq!(kinds, AnalyzerKind::ALL.to_vec());

        // No images attached, so image authenticity is not applicable
        assert!(matches!(
            outcome.records[3].result,
            AnalyzerResult::Failure { kind: FailureKind::NotApplicable, .. }
        ));
        assert_eq!(outcome.score.confidence, 0.75);
        assert_eq!(outcome.score.missing_factors.len(), 1);

        // inconsistency: critical 30 × 0.75 + numerical high 20 × 0.9 = 40.5
        // pattern and network: 0 (empty corpus, empty store)
        let expected = 40.5 * 0.3 / 0.8;
        assert!((outcome.score.fraud_score - expected).abs() < 1e-9);
        assert_eq!(outcome.score.risk_level, RiskLevel::Low);

        let report = outcome.into_report();
        assert_eq!(report.claim_id, "CLM-1");
        assert!(!report.fraud_ring_detected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_analyzer_times_out_without_blocking_others() {
        let mut config = AppConfig::default();
        config.orchestrator.task_timeout_ms = 1_000;
        let capabilities = Capabilities {
            completion: Arc::new(Stalled),
            embedder: Arc::new(ConstantEmbedder(vec![1.0, 0.0])),
            ..offline_capabilities()
        };

        let outcome = orchestrator(capabilities, &config)
            .analyze(claim())
            .await
            .unwrap();

        assert_eq!(outcome.records[0].result, AnalyzerResult::Timeout);
        assert!(outcome.records[1].result.is_success());
        assert!(outcome.records[2].result.is_success());
        assert_eq!(outcome.score.confidence, 0.5);
        assert_eq!(outcome.score.missing_factors[0].status, "timeout");
    }

    #[tokio::test]
    async fn test_all_analyzers_failing_still_scores() {
        let config = AppConfig::default();
        let orchestrator = Orchestrator::new(
            vec![
                Arc::new(InconsistencyAnalyzer::new()),
                Arc::new(PanickingAnalyzer),
            ],
            AnalyzerContext::with_capabilities(offline_capabilities()),
            ScoringEngine::new(
                crate::scoring::WeightedAggregator::new(
                    [(AnalyzerKind::Inconsistency, 0.6), (AnalyzerKind::Network, 0.4)]
                        .into_iter()
                        .collect(),
                    &[AnalyzerKind::Inconsistency, AnalyzerKind::Network],
                    config.scoring.neutral_score,
                )
                .unwrap(),
                config.scoring.risk_levels,
                vec![AnalyzerKind::Inconsistency, AnalyzerKind::Network],
            ),
            Duration::from_secs(5),
        )
        .unwrap();

        let outcome = orchestrator.analyze(claim()).await.unwrap();
        assert_eq!(outcome.score.fraud_score, 50.0);
        assert_eq!(outcome.score.confidence, 0.0);
        assert!(matches!(
            outcome.records[1].result,
            AnalyzerResult::Failure { kind: FailureKind::Internal, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_discards_the_run() {
        let capabilities = Capabilities {
            completion: Arc::new(Stalled),
            ..offline_capabilities()
        };
        let orchestrator = orchestrator(capabilities, &AppConfig::default());
        let handle = CancelHandle::new();

        let (result, _) = tokio::join!(
            orchestrator.analyze_with_cancel(claim(), handle.signal()),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                handle.cancel();
            }
        );

        assert!(matches!(result, Err(RunError::Cancelled(id)) if id == "CLM-1"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let orchestrator = orchestrator(offline_capabilities(), &AppConfig::default());
        let handle = CancelHandle::new();
        handle.cancel();

        let result = orchestrator.analyze_with_cancel(claim(), handle.signal()).await;
        assert!(matches!(result, Err(RunError::Cancelled(_))));
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_mismatched_scoring_configuration_is_rejected() {
        let result = Orchestrator::new(
            vec![Arc::new(NetworkAnalyzer::new())],
            AnalyzerContext::with_capabilities(offline_capabilities()),
            ScoringEngine::default(),
            Duration::from_secs(30),
        );
        assert!(matches!(result, Err(ConfigError::Orchestrator(_))));
    }

    struct PanickingAnalyzer;

    #[async_trait]
    impl Analyzer for PanickingAnalyzer {
        fn kind(&self) -> AnalyzerKind {
            AnalyzerKind::Network
        }

        async fn run(&self, _claim: &Claim, _context: &AnalyzerContext) -> AnalyzerResult {
            panic!("graph store exploded")
        }
    }
}
