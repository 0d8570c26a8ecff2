//! Image authenticity analyzer

use super::{capability_failure, Analyzer, AnalyzerContext};
use crate::capabilities::ImageVerdict;
use crate::error::CapabilityError;
use crate::types::{AnalyzerKind, AnalyzerResult, Claim, FailureKind, Finding, Severity};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Map};
use tracing::{debug, warn};

/// Images scoring below this without detections produce no finding
const FINDING_FLOOR: f64 = 40.0;

/// Averages per-image manipulation scores
#[derive(Debug, Default)]
pub struct ImageAuthenticityAnalyzer;

impl ImageAuthenticityAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

fn severity_for(score: f64) -> Severity {
    if score >= 80.0 {
        Severity::Critical
    } else if score >= 60.0 {
        Severity::High
    } else if score >= 40.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[async_trait]
impl Analyzer for ImageAuthenticityAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::ImageAuthenticity
    }

    async fn run(&self, claim: &Claim, context: &AnalyzerContext) -> AnalyzerResult {
        if claim.images.is_empty() {
            return AnalyzerResult::failure(
                FailureKind::NotApplicable,
                "claim has no attached images",
            );
        }

        let inspector = context.capabilities.images.as_ref();
        let retry = &context.retry;
        let outcomes: Vec<(&String, Result<ImageVerdict, CapabilityError>)> =
            join_all(claim.images.iter().map(|image| async move {
                let image_ref = image.as_str();
                let outcome = retry
                    .run("inspect_image", move || inspector.inspect(image_ref))
                    .await;
                (image, outcome)
            }))
            .await;

        let mut verdicts = Vec::new();
        let mut failed = Vec::new();
        let mut last_error = None;
        for (image, outcome) in outcomes {
            match outcome {
                Ok(verdict) => verdicts.push((image, verdict)),
                Err(err) => {
                    warn!(
                        claim_id = %claim.claim_id,
                        image = %image,
                        error = %err,
                        "Image inspection failed"
                    );
                    failed.push(image.clone());
                    last_error = Some(err);
                }
            }
        }

        if verdicts.is_empty() {
            return match last_error {
                Some(err) => capability_failure(&err),
                None => AnalyzerResult::failure(FailureKind::Internal, "no image verdicts"),
            };
        }

        let score = verdicts
            .iter()
            .map(|(_, v)| v.manipulation_score)
            .sum::<f64>()
            / verdicts.len() as f64;

        let mut findings: Vec<Finding> = verdicts
            .iter()
            .filter(|(_, v)| v.manipulation_score >= FINDING_FLOOR || !v.detections.is_empty())
            .map(|(image, v)| {
                let mut evidence = vec![image.to_string()];
                evidence.extend(v.detections.iter().cloned());
                Finding::new(
                    "image_manipulation",
                    format!(
                        "Image {} shows manipulation likelihood {:.0}/100",
                        image, v.manipulation_score
                    ),
                    severity_for(v.manipulation_score),
                )
                .with_evidence(evidence)
            })
            .collect();
        findings.sort_by(|a, b| b.severity.cmp(&a.severity));

        debug!(
            claim_id = %claim.claim_id,
            images = verdicts.len(),
            failed = failed.len(),
            score = score,
            "Image analysis complete"
        );

        let summary = if findings.is_empty() {
            format!("{} image(s) inspected, no manipulation detected", verdicts.len())
        } else {
            format!(
                "{} of {} image(s) show signs of manipulation",
                findings.len(),
                verdicts.len()
            )
        };
        let per_image: Map<String, serde_json::Value> = verdicts
            .iter()
            .map(|(image, v)| (image.to_string(), json!(v)))
            .collect();

        let mut metadata = Map::new();
        metadata.insert("summary".to_string(), json!(summary));
        metadata.insert("images".to_string(), serde_json::Value::Object(per_image));
        metadata.insert("failed_images".to_string(), json!(failed));

        AnalyzerResult::success(score, findings, metadata)
    }
}
