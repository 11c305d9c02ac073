//! Compliance evaluation: attribution, PII, risk band, and approval gates.
//!
//! Every check runs on every artifact; each violation is routed to notes or
//! errors by its own policy flag. Evaluation never short-circuits.
use super::attribution::has_attribution;
use super::frontmatter;
use super::GovernedArtifact;
use crate::error::ComplianceViolation;
use crate::policy::{CompliancePolicy, RiskPolicy};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";
const PHONE_PATTERN: &str = r"\b(?:\+?\d{1,3}[-.\s]?)?(?:\(?\d{3}\)?[-.\s]?)?\d{3}[-.\s]?\d{4}\b";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Attribution,
    Pii,
    RiskBand,
    Approvals,
}

impl Check {
    pub fn as_str(&self) -> &'static str {
        match self {
            Check::Attribution => "attribution",
            Check::Pii => "pii",
            Check::RiskBand => "risk_band",
            Check::Approvals => "approvals",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a violation goes: a logged note or a run-aborting error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Routing {
    Note,
    Error,
}

impl Routing {
    fn hard(hard_fail: bool) -> Self {
        if hard_fail {
            Routing::Error
        } else {
            Routing::Note
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub artifact: String,
    pub check: Check,
    pub routing: Routing,
    pub message: String,
}

/// All findings of one evaluation, in artifact then check order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    pub artifacts: Vec<String>,
    pub findings: Vec<Finding>,
}

impl ComplianceReport {
    pub fn notes(&self) -> Vec<String> {
        self.messages(Routing::Note)
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages(Routing::Error)
    }

    pub fn findings_for<'a>(&'a self, artifact: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings
            .iter()
            .filter(move |finding| finding.artifact == artifact)
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Fail with every error-routed violation, or yield the notes.
    pub fn into_result(self) -> Result<Vec<String>, ComplianceViolation> {
        let errors = self.errors();
        if errors.is_empty() {
            Ok(self.notes())
        } else {
            Err(ComplianceViolation { violations: errors })
        }
    }

    fn messages(&self, routing: Routing) -> Vec<String> {
        self.findings
            .iter()
            .filter(|finding| finding.routing == routing)
            .map(|finding| finding.message.clone())
            .collect()
    }
}

struct Detector {
    kind: String,
    pattern: Regex,
}

fn detectors(policy: &CompliancePolicy) -> Vec<Detector> {
    let mut out = Vec::new();
    for name in policy.pii_detectors() {
        let source = match name.as_str() {
            "email" => EMAIL_PATTERN,
            "phone" => PHONE_PATTERN,
            custom => custom,
        };
        match Regex::new(source) {
            Ok(pattern) => out.push(Detector {
                kind: name.clone(),
                pattern,
            }),
            Err(err) => tracing::warn!(detector = %name, error = %err, "skipping invalid PII detector"),
        }
    }
    out
}

/// Evaluate every artifact against the compliance and risk policies.
pub fn evaluate(
    artifacts: &[GovernedArtifact<'_>],
    compliance: &CompliancePolicy,
    risk: &RiskPolicy,
) -> ComplianceReport {
    let detectors = detectors(compliance);
    let elevated_tags = risk.elevated_tags();
    let mut report = ComplianceReport::default();

    for artifact in artifacts {
        let name = artifact.name.as_str();
        report.artifacts.push(name.to_string());
        let mut record = |check: Check, hard_fail: bool, message: String| {
            tracing::debug!(artifact = name, check = %check, %message, "compliance finding");
            report.findings.push(Finding {
                artifact: name.to_string(),
                check,
                routing: Routing::hard(hard_fail),
                message,
            });
        };

        if compliance.sources_required
            && !artifact.text.trim().is_empty()
            && !has_attribution(artifact.text)
        {
            record(
                Check::Attribution,
                compliance.hard_fail_missing_source,
                format!("{name} missing Source line"),
            );
        }

        if let Some(detector) = detectors
            .iter()
            .find(|detector| detector.pattern.is_match(artifact.text))
        {
            record(
                Check::Pii,
                compliance.hard_fail_pii,
                format!("PII detected ({}) in {name}", detector.kind),
            );
        }

        let metadata = frontmatter::metadata(artifact.text);
        let hits: BTreeSet<&str> = metadata
            .tags
            .iter()
            .map(String::as_str)
            .filter(|tag| elevated_tags.contains(tag))
            .collect();
        if !hits.is_empty() && metadata.risk_band.as_deref() != Some(risk.elevated_band.as_str()) {
            record(
                Check::RiskBand,
                compliance.hard_fail_missing_gates,
                format!(
                    "{name} expected risk_band {} (tags=[{}])",
                    risk.elevated_band,
                    hits.into_iter().collect::<Vec<_>>().join(", ")
                ),
            );
        }

        let granted: BTreeSet<&str> = metadata.granted().collect();
        let missing: Vec<String> = compliance
            .required_approvers(name)
            .into_iter()
            .filter(|approver| !granted.contains(approver.as_str()))
            .collect();
        if !missing.is_empty() {
            record(
                Check::Approvals,
                compliance.hard_fail_missing_gates,
                format!("{name} missing approvals [{}]", missing.join(", ")),
            );
        }
    }
    report
}
