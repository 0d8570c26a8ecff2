//! NATS producer for claim reports

use crate::types::ClaimReport;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Producer for publishing claim reports to NATS
#[derive(Clone)]
pub struct ReportProducer {
    client: Client,
    subject: String,
}

impl ReportProducer {
    /// Create a new report producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a claim report
    pub async fn publish(&self, report: &ClaimReport) -> Result<()> {
        let payload = serde_json::to_vec(report)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            report_id = %report.report_id,
            claim_id = %report.claim_id,
            fraud_score = report.score.fraud_score,
            "Published claim report"
        );

        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
