//! Run metrics for the claim analysis pipeline.

use crate::orchestrator::RunOutcome;
use crate::types::{AnalyzerKind, AnalyzerResult, RiskLevel};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;

/// Outcome counts for one analyzer
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub success: u64,
    pub failure: u64,
    pub timeout: u64,
}

/// Metrics collector for analysis runs
pub struct RunMetrics {
    /// Claims scored
    pub claims_processed: AtomicU64,
    /// Runs cancelled before completion
    pub claims_cancelled: AtomicU64,
    /// Claims placed in a fraud ring
    pub rings_detected: AtomicU64,
    outcomes: RwLock<BTreeMap<AnalyzerKind, OutcomeCounts>>,
    /// Analyzer wall times (ms)
    analyzer_times: RwLock<BTreeMap<AnalyzerKind, Vec<u64>>>,
    /// End-to-end run times (ms)
    processing_times: RwLock<Vec<u64>>,
    by_level: RwLock<BTreeMap<RiskLevel, u64>>,
    /// Fraud score histogram in buckets of 10
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

fn push_sample(samples: &mut Vec<u64>, value: u64) {
    samples.push(value);
    if samples.len() > MAX_SAMPLES {
        samples.drain(0..MAX_SAMPLES / 2);
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            claims_processed: AtomicU64::new(0),
            claims_cancelled: AtomicU64::new(0),
            rings_detected: AtomicU64::new(0),
            outcomes: RwLock::new(BTreeMap::new()),
            analyzer_times: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            by_level: RwLock::new(BTreeMap::new()),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a completed run
    pub fn record_run(&self, outcome: &RunOutcome, fraud_ring_detected: bool) {
        self.claims_processed.fetch_add(1, Ordering::Relaxed);
        if fraud_ring_detected {
            self.rings_detected.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            push_sample(&mut times, outcome.elapsed.as_millis() as u64);
        }

        for record in &outcome.records {
            self.record_analyzer(
                record.analyzer,
                &record.result,
                Duration::from_millis(record.elapsed_ms),
            );
        }

        if let Ok(mut by_level) = self.by_level.write() {
            *by_level.entry(outcome.score.risk_level).or_insert(0) += 1;
        }

        let bucket = ((outcome.score.fraud_score / 10.0) as usize).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn record_cancelled(&self) {
        self.claims_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one analyzer outcome and its wall time
    pub fn record_analyzer(&self, analyzer: AnalyzerKind, result: &AnalyzerResult, elapsed: Duration) {
        if let Ok(mut outcomes) = self.outcomes.write() {
            let counts = outcomes.entry(analyzer).or_default();
            match result {
                AnalyzerResult::Success { .. } => counts.success += 1,
                AnalyzerResult::Failure { .. } => counts.failure += 1,
                AnalyzerResult::Timeout => counts.timeout += 1,
            }
        }
        if let Ok(mut times) = self.analyzer_times.write() {
            push_sample(times.entry(analyzer).or_default(), elapsed.as_millis() as u64);
        }
    }

    pub fn analyzer_outcomes(&self) -> BTreeMap<AnalyzerKind, OutcomeCounts> {
        self.outcomes
            .read()
            .map(|outcomes| outcomes.clone())
            .unwrap_or_default()
    }

    /// End-to-end latency statistics
    pub fn get_processing_stats(&self) -> LatencyStats {
        match self.processing_times.read() {
            Ok(times) => LatencyStats::from_samples(&times),
            Err(_) => LatencyStats::default(),
        }
    }

    /// Per-analyzer latency statistics
    pub fn get_analyzer_stats(&self) -> BTreeMap<AnalyzerKind, LatencyStats> {
        let Ok(times) = self.analyzer_times.read() else {
            return BTreeMap::new();
        };
        times
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(kind, samples)| (*kind, LatencyStats::from_samples(samples)))
            .collect()
    }

    /// Claims per second since startup
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.claims_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    pub fn get_claims_by_level(&self) -> BTreeMap<RiskLevel, u64> {
        self.by_level.read().map(|l| l.clone()).unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let processed = self.claims_processed.load(Ordering::Relaxed);
        let cancelled = self.claims_cancelled.load(Ordering::Relaxed);
        let rings = self.rings_detected.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            processed = processed,
            cancelled = cancelled,
            rings_detected = rings,
            throughput = self.get_throughput(),
            "Claim engine metrics"
        );
        info!(
            mean_ms = processing.mean_ms,
            p50_ms = processing.p50_ms,
            p95_ms = processing.p95_ms,
            p99_ms = processing.p99_ms,
            max_ms = processing.max_ms,
            "Run latency"
        );

        for (level, count) in self.get_claims_by_level() {
            let pct = if processed > 0 {
                count as f64 / processed as f64 * 100.0
            } else {
                0.0
            };
            info!(risk_level = level.as_str(), count = count, pct = pct, "Claims by risk level");
        }

        let distribution = self.get_score_distribution();
        let total: u64 = distribution.iter().sum();
        for (i, count) in distribution.iter().enumerate() {
            let pct = if total > 0 { *count as f64 / total as f64 * 100.0 } else { 0.0 };
            info!(
                "  score {:>3}-{:<3}: {:>6} ({:>5.1}%) {}",
                i * 10,
                (i + 1) * 10,
                count,
                pct,
                "█".repeat(((pct / 5.0) as usize).min(20))
            );
        }

        let stats = self.get_analyzer_stats();
        for (kind, counts) in self.analyzer_outcomes() {
            let latency = stats.get(&kind).cloned().unwrap_or_default();
            info!(
                analyzer = %kind,
                success = counts.success,
                failure = counts.failure,
                timeout = counts.timeout,
                mean_ms = latency.mean_ms,
                p99_ms = latency.p99_ms,
                "Analyzer stats"
            );
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics in milliseconds
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_ms: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub max_ms: u64,
}

impl LatencyStats {
    fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];
        Self {
            count: count as u64,
            mean_ms: sorted.iter().sum::<u64>() / count as u64,
            p50_ms: at(0.5),
            p95_ms: at(0.95),
            p99_ms: at(0.99),
            max_ms: sorted[count - 1],
        }
    }
}

/// Logs a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<RunMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<RunMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting loop
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalyzerRecord, Recommendation, ScoreResult};

    fn outcome(score: f64, level: RiskLevel) -> RunOutcome {
        RunOutcome {
            claim_id: "CLM-1".to_string(),
            records: vec![
                AnalyzerRecord::new(
                    AnalyzerKind::Pattern,
                    AnalyzerResult::success(score, Vec::new(), Default::default()),
                    Duration::from_millis(40),
                ),
                AnalyzerRecord::new(AnalyzerKind::Network, AnalyzerResult::Timeout, Duration::from_millis(30_000)),
            ],
            score: ScoreResult {
                fraud_score: score,
                risk_level: level,
                risk_factors: Vec::new(),
                missing_factors: Vec::new(),
                confidence: 0.5,
                recommendation: Recommendation::Monitor,
            },
            elapsed: Duration::from_millis(120),
        }
    }

    #[test]
    fn test_run_recording() {
        let metrics = RunMetrics::new();
        metrics.record_run(&outcome(12.0, RiskLevel::Low), false);
        metrics.record_run(&outcome(100.0, RiskLevel::Critical), true);
        metrics.record_cancelled();

        assert_eq!(metrics.claims_processed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.rings_detected.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.claims_cancelled.load(Ordering::Relaxed), 1);

        let distribution = metrics.get_score_distribution();
        assert_eq!(distribution[1], 1);
        assert_eq!(distribution[9], 1);

        let outcomes = metrics.analyzer_outcomes();
        assert_eq!(outcomes[&AnalyzerKind::Pattern].success, 2);
        assert_eq!(outcomes[&AnalyzerKind::Network].timeout, 2);
        assert_eq!(metrics.get_claims_by_level()[&RiskLevel::Critical], 1);
    }

    #[test]
    fn test_latency_stats() {
        let stats = LatencyStats::from_samples(&[5, 1, 3, 2, 4]);
        assert_eq!(stats.count, 5);
        assert_eq!(stats.mean_ms, 3);
        assert_eq!(stats.p50_ms, 3);
        assert_eq!(stats.max_ms, 5);
        assert_eq!(LatencyStats::from_samples(&[]), LatencyStats::default());
    }
}
