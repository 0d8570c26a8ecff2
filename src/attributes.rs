//! Attribute extraction for claim linking and pattern search.
//!
//! Turns the free-form extracted fields of a claim into normalized
//! attributes (phone, address, party name, policy, vehicle, provider) that
//! the claim graph links on, and into the query text used for pattern
//! retrieval.

use crate::types::Claim;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Maximum characters of raw text folded into the retrieval query
const QUERY_RAW_TEXT_CHARS: usize = 1500;

/// Type of a linkable attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Phone,
    Address,
    Name,
    Policy,
    Vehicle,
    Provider,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 6] = [
        AttributeKind::Phone,
        AttributeKind::Address,
        AttributeKind::Name,
        AttributeKind::Policy,
        AttributeKind::Vehicle,
        AttributeKind::Provider,
    ];

    /// Edge label used when two claims share this attribute
    pub fn label(&self) -> &'static str {
        match self {
            AttributeKind::Phone => "shared_phone",
            AttributeKind::Address => "shared_address",
            AttributeKind::Name => "shared_name",
            AttributeKind::Policy => "shared_policy",
            AttributeKind::Vehicle => "shared_vehicle",
            AttributeKind::Provider => "shared_provider",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A normalized attribute value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClaimAttribute {
    pub kind: AttributeKind,
    pub value: String,
}

impl ClaimAttribute {
    pub fn new(kind: AttributeKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Extracts linkable attributes and search text from claims
pub struct AttributeExtractor;

impl AttributeExtractor {
    /// Create a new attribute extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract the normalized attribute set of a claim.
    ///
    /// Values that normalize to nothing (blank names, phone numbers with too
    /// few digits) are dropped so they can never link unrelated claims.
    pub fn extract(&self, claim: &Claim) -> BTreeSet<ClaimAttribute> {
        let mut attributes = BTreeSet::new();

        let mut push = |kind: AttributeKind, value: Option<String>| {
            if let Some(value) = value {
                attributes.insert(ClaimAttribute::new(kind, value));
            }
        };

        push(
            AttributeKind::Phone,
            claim.text("claimant.phone").and_then(normalize_phone),
        );
        push(
            AttributeKind::Address,
            claim.text("claimant.address").and_then(normalize_text),
        );
        push(
            AttributeKind::Name,
            claim.text("claimant.name").and_then(normalize_text),
        );
        push(
            AttributeKind::Policy,
            claim.text("policy.number").and_then(normalize_identifier),
        );
        push(
            AttributeKind::Vehicle,
            claim.text("vehicle.vin").and_then(normalize_identifier),
        );
        for provider in claim.list("medical.providers") {
            push(AttributeKind::Provider, normalize_text(provider));
        }

        attributes
    }

    /// Build the semantic search query for pattern retrieval.
    ///
    /// Never returns an empty string.
    pub fn search_query(&self, claim: &Claim) -> String {
        let mut parts = Vec::new();

        if let Some(description) = claim.text("incident.description") {
            parts.push(format!("Incident: {}", description));
        }
        if let Some(claim_type) = claim.text("claim.type") {
            parts.push(format!("Claim type: {}", claim_type));
        }
        if let Some(amount) = claim.amount("claim.amount") {
            parts.push(format!("Claim amount: ${:.2}", amount));
        }
        let injuries = claim.list("medical.injuries");
        if !injuries.is_empty() {
            parts.push(format!("Injuries: {}", injuries.join(", ")));
        }
        let raw = claim.raw_text.trim();
        if !raw.is_empty() {
            parts.push(format!("Details: {}", truncate_chars(raw, QUERY_RAW_TEXT_CHARS)));
        }

        let query = parts.join(" ");
        if query.trim().is_empty() {
            "insurance claim document".to_string()
        } else {
            query
        }
    }
}

impl Default for AttributeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Digits only, keeping the last ten (drops country codes)
fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 7 {
        return None;
    }
    let start = digits.len().saturating_sub(10);
    Some(digits[start..].to_string())
}

/// Lowercase, punctuation stripped, whitespace collapsed
fn normalize_text(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Uppercase alphanumerics only
fn normalize_identifier(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Truncate on a character boundary
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
