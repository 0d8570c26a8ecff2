//! Inconsistency analyzer.
//!
//! Two completion passes (timeline, logical contradictions) run side by
//! side, followed by local numerical checks on amounts. Each finding adds
//! its severity points scaled by confidence.

use super::{capability_failure, Analyzer, AnalyzerContext};
use crate::attributes::truncate_chars;
use crate::capabilities::CompletionContext;
use crate::error::CapabilityError;
use crate::types::{AnalyzerKind, AnalyzerResult, Claim, Finding, Severity};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

const PROMPT_TEXT_CHARS: usize = 4000;

/// Confidence of a finding opened by a numbered line
const NUMBERED_CONFIDENCE: f64 = 0.75;
/// Confidence of a finding opened by a `Description:` line
const DESCRIBED_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Timeline,
    Logical,
}

impl Pass {
    fn category(&self) -> &'static str {
        match self {
            Pass::Timeline => "timeline",
            Pass::Logical => "logical",
        }
    }
}

/// Detects timeline, logical and numerical inconsistencies
#[derive(Debug, Default)]
pub struct InconsistencyAnalyzer;

impl InconsistencyAnalyzer {
    pub fn new() -> Self {
        Self
    }

    async fn run_pass(
        &self,
        pass: Pass,
        claim: &Claim,
        context: &AnalyzerContext,
    ) -> Result<Vec<Finding>, CapabilityError> {
        let prompt = match pass {
            Pass::Timeline => timeline_prompt(claim),
            Pass::Logical => logical_prompt(claim),
        };
        let prompt = prompt.as_str();
        let completion = context.capabilities.completion.as_ref();
        let settings = CompletionContext::default();
        let settings = &settings;

        let response = context
            .retry
            .run("complete", move || completion.complete(prompt, settings))
            .await?;
        Ok(parse_findings(&response, pass.category()))
    }
}

#[async_trait]
impl Analyzer for InconsistencyAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Inconsistency
    }

    async fn run(&self, claim: &Claim, context: &AnalyzerContext) -> AnalyzerResult {
        let (timeline, logical) = futures::join!(
            self.run_pass(Pass::Timeline, claim, context),
            self.run_pass(Pass::Logical, claim, context),
        );

        let mut findings = Vec::new();
        let mut last_error = None;
        let mut failed_passes = Vec::new();
        for (pass, outcome) in [(Pass::Timeline, timeline), (Pass::Logical, logical)] {
            match outcome {
                Ok(found) => findings.extend(found),
                Err(err) => {
                    warn!(
                        claim_id = %claim.claim_id,
                        pass = pass.category(),
                        error = %err,
                        "Inconsistency pass failed"
                    );
                    failed_passes.push(pass.category());
                    last_error = Some(err);
                }
            }
        }

        if failed_passes.len() == 2 {
            if let Some(err) = last_error {
                return capability_failure(&err);
            }
        }

        findings.extend(numerical_findings(claim));
        let score = inconsistency_score(&findings);
        debug!(
            claim_id = %claim.claim_id,
            findings = findings.len(),
            score = score,
            "Inconsistency analysis complete"
        );

        let mut metadata = Map::new();
        metadata.insert("summary".to_string(), json!(summarize(&findings)));
        metadata.insert("inconsistency_count".to_string(), json!(findings.len()));
        metadata.insert("failed_passes".to_string(), json!(failed_passes));

        AnalyzerResult::success(score, findings, metadata)
    }
}

fn field_or_unknown<'a>(claim: &'a Claim, path: &str) -> &'a str {
    claim.text(path).unwrap_or("Unknown")
}

fn timeline_prompt(claim: &Claim) -> String {
    format!(
        "Analyze this insurance claim for timeline inconsistencies.\n\n\
         CLAIM DATA:\n\
         - Incident Date: {}\n\
         - Incident Time: {}\n\
         - Claim Filed: {}\n\
         - Incident Location: {}\n\n\
         CLAIM TEXT:\n{}\n\n\
         Look for events in impossible order, claims filed before the incident, \
         suspicious time gaps, location/time conflicts and treatment dates before injury dates.\n\n\
         List each inconsistency as a numbered item followed by:\n\
         - Description: what is inconsistent\n\
         - Severity: low/medium/high/critical\n\
         - Evidence: the text or data showing it\n\n\
         If there are none, reply \"No timeline inconsistencies detected.\"",
        field_or_unknown(claim, "incident.date"),
        field_or_unknown(claim, "incident.time"),
        field_or_unknown(claim, "claim.date"),
        field_or_unknown(claim, "incident.location"),
        truncate_chars(&claim.raw_text, PROMPT_TEXT_CHARS),
    )
}

fn logical_prompt(claim: &Claim) -> String {
    let fields = Value::Object(claim.fields.clone());
    format!(
        "Analyze this insurance claim for logical contradictions.\n\n\
         CLAIM DATA:\n{}\n\n\
         CLAIM TEXT:\n{}\n\n\
         Look for contradictory statements, impossible scenarios, conflicting witness \
         statements, damage inconsistent with the accident type and injuries inconsistent \
         with the incident description.\n\n\
         List each contradiction as a numbered item followed by:\n\
         - Description: what contradicts what\n\
         - Severity: low/medium/high/critical\n\
         - Evidence: the contradicting statements\n\n\
         If there are none, reply \"No logical contradictions detected.\"",
        fields,
        truncate_chars(&claim.raw_text, PROMPT_TEXT_CHARS),
    )
}

/// Strip list markers and emphasis from a response line
fn clean_line(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['-', '*', '•'])
        .trim()
        .trim_matches('*')
        .trim()
}

/// `1. text` or `2) text` → `text`
fn numbered_item(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 || digits > 2 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .map(|text| clean_line(text))
}

/// `Key: value` with a case-insensitive key
fn keyed<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (head, value) = line.split_once(':')?;
    head.trim()
        .trim_matches('*')
        .eq_ignore_ascii_case(key)
        .then(|| value.trim())
}

/// "No timeline inconsistencies found", "No logical contradictions detected"
fn reports_nothing(text: &str) -> bool {
    let lower = text.to_lowercase();
    (lower.starts_with("no ") || lower.starts_with("none"))
        && (lower.contains("inconsistenc") || lower.contains("contradiction"))
}

/// Parse numbered findings with `Description:`, `Severity:` and `Evidence:` lines
pub fn parse_findings(response: &str, category: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut current: Option<Finding> = None;

    let mut flush = |current: &mut Option<Finding>| {
        if let Some(finding) = current.take() {
            if !finding.description.is_empty() {
                findings.push(finding);
            }
        }
    };

    for raw in response.lines() {
        let line = clean_line(raw);
        if line.is_empty() {
            continue;
        }

        if let Some(text) = numbered_item(line) {
            flush(&mut current);
            let text = keyed(text, "description").unwrap_or(text);
            if reports_nothing(text) {
                continue;
            }
            current = Some(
                Finding::new(category, text, Severity::Medium).with_confidence(NUMBERED_CONFIDENCE),
            );
        } else if let Some(text) = keyed(line, "description") {
            if reports_nothing(text) {
                current = None;
                continue;
            }
            match current.as_mut() {
                Some(finding) => finding.description = text.to_string(),
                None => {
                    current = Some(
                        Finding::new(category, text, Severity::Medium)
                            .with_confidence(DESCRIBED_CONFIDENCE),
                    )
                }
            }
        } else if let Some(text) = keyed(line, "severity") {
            if let (Some(finding), Some(severity)) = (current.as_mut(), Severity::from_text(text)) {
                finding.severity = severity;
            }
        } else if let Some(text) = keyed(line, "evidence") {
            if let Some(finding) = current.as_mut() {
                if !text.is_empty() {
                    finding.evidence.push(text.to_string());
                }
            }
        }
    }
    flush(&mut current);

    findings
}

/// Amount checks that need no completion call
pub fn numerical_findings(claim: &Claim) -> Vec<Finding> {
    let mut findings = Vec::new();
    let claim_amount = claim.amount("claim.amount").unwrap_or(0.0);
    let coverage = claim.amount("policy.coverage_amount").unwrap_or(0.0);
    let medical_costs = claim.amount("medical.costs").unwrap_or(0.0);

    if claim_amount > 0.0 && coverage > 0.0 && claim_amount > coverage * 1.5 {
        let severity = if claim_amount > coverage * 2.0 {
            Severity::High
        } else {
            Severity::Medium
        };
        findings.push(
            Finding::new(
                "numerical",
                format!(
                    "Claim amount (${:.2}) significantly exceeds policy coverage (${:.2})",
                    claim_amount, coverage
                ),
                severity,
            )
            .with_confidence(0.9)
            .with_evidence(vec![
                format!("Claim: ${:.2}", claim_amount),
                format!("Coverage: ${:.2}", coverage),
            ]),
        );
    }

    if medical_costs > 0.0 && claim_amount > 0.0 && medical_costs > claim_amount {
        findings.push(
            Finding::new(
                "numerical",
                format!(
                    "Medical costs (${:.2}) exceed total claim amount (${:.2})",
                    medical_costs, claim_amount
                ),
                Severity::Medium,
            )
            .with_confidence(0.85)
            .with_evidence(vec![
                format!("Medical: ${:.2}", medical_costs),
                format!("Total claim: ${:.2}", claim_amount),
            ]),
        );
    }

    findings
}

pub fn inconsistency_score(findings: &[Finding]) -> f64 {
    findings
        .iter()
        .map(|f| f.severity.inconsistency_points() * f.confidence)
        .sum::<f64>()
        .min(100.0)
}

fn summarize(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "No significant inconsistencies detected in the claim.".to_string();
    }
    let count = |severity: Severity| findings.iter().filter(|f| f.severity == severity).count();
    let (critical, high) = (count(Severity::Critical), count(Severity::High));

    let mut parts = Vec::new();
    if critical > 0 {
        parts.push(format!("{} critical inconsistencies found", critical));
    }
    if high > 0 {
        parts.push(format!("{} high-severity issues detected", high));
    }
    if parts.is_empty() {
        parts.push(format!("{} minor inconsistencies noted", findings.len()));
    }
    parts.join("; ")
}
