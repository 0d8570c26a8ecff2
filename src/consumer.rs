//! NATS consumer for submitted claims

use crate::types::Claim;
use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for receiving claims from NATS
pub struct ClaimConsumer {
    client: Client,
    subject: String,
}

impl ClaimConsumer {
    /// Create a new claim consumer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the claim subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to claim subject");
        Ok(subscriber)
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Decode a claim message payload
pub fn decode_claim(payload: &[u8]) -> Result<Claim> {
    serde_json::from_slice(payload).context("Failed to decode claim payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_claim() {
        let claim = decode_claim(
            br#"{"claim_id": "CLM-7", "vertical": "medical", "images": ["a.jpg"],
                 "fields": {"claimant": {"name": "Jane Doe"}}}"#,
        )
        .unwrap();
        assert_eq!(claim.claim_id, "CLM-7");
        assert_eq!(claim.text("claimant.name"), Some("Jane Doe"));
        assert_eq!(claim.images.len(), 1);
    }

    #[test]
    fn test_decode_rejects_missing_id() {
        assert!(decode_claim(br#"{"vertical": "auto"}"#).is_err());
    }
}
