//! Governance policy documents.
//!
//! Policies are optional YAML (or JSON) files at fixed locations, parsed into
//! typed structs with explicit defaults. They are reloaded on every governance
//! stage run so edits apply without a restart.
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

mod load;

pub use load::{load_policy, PolicyDocument, PolicyMode};

use crate::paths::{COMPLIANCE_POLICY, RISK_POLICY, STYLE_POLICY};

/// Attribution inserted when an artifact has none and policy names no other.
pub const DEFAULT_SOURCE: &str = "intake/tech-docs/openapi.yaml";
/// Risk band that tagged artifacts must declare when no policy overrides it.
pub const DEFAULT_ELEVATED_BAND: &str = "L2";

/// House-style rules; every rule is off unless configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StylePolicy {
    #[serde(alias = "activeVoice")]
    pub active_voice: bool,
    pub tense: Option<String>,
    pub forbidden: Vec<String>,
    /// Maximum words per sentence; zero disables the rule.
    #[serde(alias = "sentenceMax")]
    pub sentence_max: usize,
}

impl StylePolicy {
    pub fn present_tense(&self) -> bool {
        self.tense
            .as_deref()
            .is_some_and(|tense| tense.trim().eq_ignore_ascii_case("present"))
    }
}

impl PolicyDocument for StylePolicy {
    const FILE_NAME: &'static str = STYLE_POLICY;
    const KEYS: &'static [&'static str] = &[
        "active_voice",
        "activeVoice",
        "tense",
        "forbidden",
        "sentence_max",
        "sentenceMax",
    ];
}

/// Attribution, PII, and approval gates with hard/soft routing flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompliancePolicy {
    pub sources_required: bool,
    #[serde(alias = "hard_fail_on_missing_source")]
    pub hard_fail_missing_source: bool,
    pub hard_fail_missing_gates: bool,
    pub hard_fail_pii: bool,
    /// Detector names (`email`, `phone`) or custom regexes, in priority order.
    #[serde(alias = "pii_detectors")]
    pub pii_redact: Option<Vec<String>>,
    /// Category -> approvers that must all sign off.
    pub approvals_required: BTreeMap<String, Vec<String>>,
    /// Category -> artifact name patterns (trailing `*` matches any suffix).
    pub approval_categories: BTreeMap<String, Vec<String>>,
    pub default_source: String,
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        let mut approval_categories = BTreeMap::new();
        approval_categories.insert(
            "api_and_release_notes".to_string(),
            vec!["api-reference".to_string(), "release-notes".to_string()],
        );
        approval_categories.insert("kb_major_changes".to_string(), vec!["kb:*".to_string()]);
        Self {
            sources_required: true,
            hard_fail_missing_source: false,
            hard_fail_missing_gates: false,
            hard_fail_pii: false,
            pii_redact: None,
            approvals_required: BTreeMap::new(),
            approval_categories,
            default_source: DEFAULT_SOURCE.to_string(),
        }
    }
}

impl CompliancePolicy {
    /// Detectors in priority order; built-ins when the policy names none.
    pub fn pii_detectors(&self) -> Vec<String> {
        self.pii_redact
            .clone()
            .unwrap_or_else(|| vec!["email".to_string(), "phone".to_string()])
    }

    /// Approvers required for `artifact`, across every matching category.
    pub fn required_approvers(&self, artifact: &str) -> BTreeSet<String> {
        let mut required = BTreeSet::new();
        for (category, approvers) in &self.approvals_required {
            let Some(patterns) = self.approval_categories.get(category) else {
                continue;
            };
            if patterns.iter().any(|pattern| pattern_matches(pattern, artifact)) {
                required.extend(approvers.iter().cloned());
            }
        }
        required
    }
}

impl PolicyDocument for CompliancePolicy {
    const FILE_NAME: &'static str = COMPLIANCE_POLICY;
    const KEYS: &'static [&'static str] = &[
        "sources_required",
        "hard_fail_missing_source",
        "hard_fail_on_missing_source",
        "hard_fail_missing_gates",
        "hard_fail_pii",
        "pii_redact",
        "pii_detectors",
        "approvals_required",
        "approval_categories",
        "default_source",
    ];
}

/// Risk bands keyed by band name, each listing the tags that require it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub risk_band: BTreeMap<String, Vec<String>>,
    pub elevated_band: String,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            risk_band: BTreeMap::new(),
            elevated_band: DEFAULT_ELEVATED_BAND.to_string(),
        }
    }
}

impl RiskPolicy {
    /// Tags whose presence requires the elevated band.
    pub fn elevated_tags(&self) -> BTreeSet<&str> {
        self.risk_band
            .get(&self.elevated_band)
            .map(|tags| tags.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

impl PolicyDocument for RiskPolicy {
    const FILE_NAME: &'static str = RISK_POLICY;
    const KEYS: &'static [&'static str] = &["risk_band", "elevated_band"];
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}
