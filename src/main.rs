//! Claim Fraud Engine - Main Entry Point
//!
//! Consumes claims from NATS, runs the analyzer ensemble on each and
//! publishes a scored claim report. Claims are analyzed in parallel up to
//! the configured worker count.

use anyhow::{Context, Result};
use claim_fraud_engine::{
    capabilities::{
        Capabilities, ClaimStore, ClaimSummary, InMemoryClaimStore, InMemoryPatternIndex,
        NimClient,
    },
    config::{AppConfig, LoggingConfig},
    consumer::{decode_claim, ClaimConsumer},
    metrics::{MetricsReporter, RunMetrics},
    orchestrator::{CancelHandle, Orchestrator},
    producer::ReportProducer,
    retrieval::{load_corpus, load_seeds},
    RunError,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("claim_fraud_engine={}", logging.level)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so the level and format apply
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(&config.logging)?;

    info!("Starting Claim Fraud Engine");
    info!(
        analyzers = ?config.orchestrator.analyzers,
        task_timeout_ms = config.orchestrator.task_timeout_ms,
        "Configuration loaded"
    );
    info!(
        "Risk levels: medium>={:.0}, high>={:.0}, critical>={:.0}",
        config.scoring.risk_levels.medium,
        config.scoring.risk_levels.high,
        config.scoring.risk_levels.critical
    );

    let metrics = Arc::new(RunMetrics::new());

    // Capability clients
    let nim = Arc::new(NimClient::new(&config.capabilities)?);
    let index = Arc::new(InMemoryPatternIndex::new());
    let store = Arc::new(InMemoryClaimStore::with_capacity(config.network.store_capacity));
    let retry = config.capabilities.retry_policy();

    let seeds = load_seeds(&config.retrieval.corpus_path)?;
    let loaded = load_corpus(seeds, nim.as_ref(), index.as_ref(), &retry).await?;
    info!(patterns = loaded, path = %config.retrieval.corpus_path, "Pattern index ready");

    let capabilities = Capabilities {
        completion: nim.clone(),
        embedder: nim.clone(),
        index,
        reranker: nim.clone(),
        store: store.clone(),
        images: nim,
    };
    let orchestrator = Arc::new(Orchestrator::from_config(&config, capabilities)?);
    let extractor = orchestrator.context().extractor.clone();

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = ClaimConsumer::new(client.clone(), &config.nats.claim_subject);
    let producer = Arc::new(ReportProducer::new(client.clone(), &config.nats.report_subject));

    let num_workers = config.pipeline.workers.max(1);
    info!(
        workers = num_workers,
        claims = %consumer.subject(),
        reports = %producer.subject(),
        "Starting claim processing loop"
    );

    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Ctrl-C cancels every in-flight run
    let shutdown = CancelHandle::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                shutdown.cancel();
            }
        });
    }

    // Start metrics reporter (logs a summary every 30 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    let mut subscription = consumer.subscribe().await?;
    let mut stop = shutdown.signal();

    loop {
        let message = tokio::select! {
            _ = stop.cancelled() => break,
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
        };

        // Acquire permit (limits concurrent runs)
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let orchestrator = orchestrator.clone();
        let extractor = extractor.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let store = store.clone();
        let processed_count = processed_count.clone();
        let signal = shutdown.signal();

        tokio::spawn(async move {
            let claim = match decode_claim(&message.payload) {
                Ok(claim) => claim,
                Err(e) => {
                    warn!(error = %e, "Failed to deserialize claim");
                    return;
                }
            };
            let claim_id = claim.claim_id.clone();
            let summary = ClaimSummary {
                claim_id: claim.claim_id.clone(),
                attributes: extractor.extract(&claim),
                received_at: claim.received_at,
            };

            match orchestrator.analyze_with_cancel(claim, signal).await {
                Ok(outcome) => {
                    let report = outcome.clone().into_report();
                    metrics.record_run(&outcome, report.fraud_ring_detected);

                    if let Err(e) = producer.publish(&report).await {
                        error!(claim_id = %claim_id, error = %e, "Failed to publish claim report");
                    } else {
                        info!(
                            claim_id = %claim_id,
                            fraud_score = report.score.fraud_score,
                            risk_level = report.score.risk_level.as_str(),
                            confidence = report.score.confidence,
                            fraud_ring = report.fraud_ring_detected,
                            processing_time_ms = report.processing_time_ms,
                            "Claim report published"
                        );
                    }

                    // The claim joins the history only after its own analysis
                    if let Err(e) = store.insert(summary).await {
                        error!(claim_id = %claim_id, error = %e, "Failed to store claim summary");
                    }

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 100 == 0 {
                        let stats = metrics.get_processing_stats();
                        info!(
                            processed = count,
                            throughput = metrics.get_throughput(),
                            avg_latency_ms = stats.mean_ms,
                            "Processing milestone"
                        );
                    }
                }
                Err(RunError::Cancelled(_)) => {
                    metrics.record_cancelled();
                    debug!(claim_id = %claim_id, "Run cancelled");
                }
                Err(e) => {
                    error!(claim_id = %claim_id, error = %e, "Claim analysis failed");
                }
            }

            drop(permit);
        });
    }

    info!("Claim engine shutting down...");
    metrics.print_summary();

    Ok(())
}
