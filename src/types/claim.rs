//! Normalized insurance claim record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Line of business the claim was filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vertical {
    #[default]
    Auto,
    Medical,
    Property,
    #[serde(other)]
    Other,
}

/// An insurance claim as produced by document extraction.
///
/// Extracted fields are kept as a nested JSON object (`claimant.phone`,
/// `claim.amount`, `incident.description`, ...) because the extraction
/// schema differs between verticals. A claim is never mutated once it has
/// been handed to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    /// Unique claim identifier
    #[serde(alias = "id")]
    pub claim_id: String,

    /// Line of business
    #[serde(default)]
    pub vertical: Vertical,

    /// Extracted fields (amounts, dates, parties, narrative)
    #[serde(default)]
    pub fields: Map<String, Value>,

    /// Attached image references (paths or URLs)
    #[serde(default)]
    pub images: BTreeSet<String>,

    /// Raw document text, when extraction kept it
    #[serde(default)]
    pub raw_text: String,

    /// Time the claim entered the pipeline
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl Claim {
    /// Create an empty claim with the given identifier
    pub fn new(claim_id: impl Into<String>, vertical: Vertical) -> Self {
        Self {
            claim_id: claim_id.into(),
            vertical,
            fields: Map::new(),
            images: BTreeSet::new(),
            raw_text: String::new(),
            received_at: Utc::now(),
        }
    }

    /// Set a field by dotted path, creating intermediate objects as needed
    pub fn with_field(mut self, path: &str, value: impl Into<Value>) -> Self {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(leaf) = segments.pop() else {
            return self;
        };

        let mut cursor = &mut self.fields;
        for segment in segments {
            let entry = cursor
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(map) = entry else {
                return self;
            };
            cursor = map;
        }
        cursor.insert(leaf.to_string(), value.into());
        self
    }

    /// Attach an image reference
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.images.insert(image_ref.into());
        self
    }

    /// Set the raw document text
    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self {
        self.raw_text = raw_text.into();
        self
    }

    /// Look up a field by dotted path (`claimant.phone`)
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Non-empty text field
    pub fn text(&self, path: &str) -> Option<&str> {
        self.field(path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Numeric field; numbers written as strings (`"$12,500.00"`) are accepted
    pub fn amount(&self, path: &str) -> Option<f64> {
        match self.field(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let cleaned: String = s
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                    .collect();
                cleaned.parse().ok()
            }
            _ => None,
        }
    }

    /// List field; a single string is treated as a one-element list
    pub fn list(&self, path: &str) -> Vec<&str> {
        match self.field(path) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim()],
            _ => Vec::new(),
        }
    }
}
