//! In-app guidance: tooltips and a first-run walkthrough.
use super::intake::Sources;
use super::writer_support::slugify;
use super::StageContext;
use crate::record::{keys, WorkRecord};
use crate::stage::Stage;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

const PLACEMENTS: [&str; 4] = ["right", "bottom", "top", "left"];
const TRIGGERS: [&str; 4] = ["onHover", "onFocus", "onClick", "onLoad"];
const DEFAULT_TIPS: [(&str, &str); 4] = [
    ("backup", "Use Run Now for an immediate backup"),
    ("restore", "Provide the full target path"),
    ("policy", "Save the policy after validation"),
    ("dashboard", "Check metrics for success"),
];

static HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]\s+([A-Za-z0-9][\w -]*?)\s*:\s*(\S.*?)\s*$").expect("regex for hint lines")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tooltip {
    pub id: String,
    pub feature: String,
    pub text: String,
    pub placement: &'static str,
    pub role_visibility: &'static str,
    pub when: &'static str,
    pub variant: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Walkthrough {
    pub flow_id: &'static str,
    pub source: &'static str,
    pub steps: Vec<WalkthroughStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalkthroughStep {
    pub id: String,
    pub text: &'static str,
    pub success_criteria: &'static str,
    pub when: &'static str,
}

/// `- feature: text` pairs from the hints document.
pub fn parse_hints(hints: &str) -> Vec<(String, String)> {
    hints
        .lines()
        .filter_map(|line| HINT.captures(line))
        .map(|caps| (caps[1].trim().to_string(), caps[2].to_string()))
        .collect()
}

pub fn tooltips(hints: Option<&str>) -> Vec<Tooltip> {
    let mut pairs = hints.map(parse_hints).unwrap_or_default();
    if pairs.is_empty() {
        pairs = DEFAULT_TIPS
            .iter()
            .map(|(feature, text)| (feature.to_string(), text.to_string()))
            .collect();
    }
    pairs
        .into_iter()
        .enumerate()
        .map(|(index, (feature, text))| Tooltip {
            id: format!("tip-{}", slugify(&feature)),
            feature: feature.to_lowercase(),
            text,
            placement: PLACEMENTS[index % PLACEMENTS.len()],
            role_visibility: "admin",
            when: TRIGGERS[index % TRIGGERS.len()],
            variant: "info",
        })
        .collect()
}

pub fn walkthrough() -> Walkthrough {
    let steps = [
        ("Configure backup policy", "Policy saved", "after-login"),
        ("Start first backup", "Job scheduled", "policy-complete"),
        ("Run a test restore", "Files present at target path", "backup-complete"),
    ];
    Walkthrough {
        flow_id: "restore-setup",
        source: "intake/inapp/hints.md",
        steps: steps
            .iter()
            .enumerate()
            .map(|(index, &(text, success_criteria, when))| WalkthroughStep {
                id: format!("step{}", index + 1),
                text,
                success_criteria,
                when,
            })
            .collect(),
    }
}

pub struct WriterInappStage;

impl WriterInappStage {
    pub fn new(_ctx: &StageContext) -> Self {
        Self
    }
}

impl Stage for WriterInappStage {
    fn name(&self) -> &'static str {
        super::WRITER_INAPP
    }

    fn writes(&self) -> &'static [&'static str] {
        &[keys::TOOLTIPS_JSON, keys::WALKTHROUGH_YAML]
    }

    fn run(&self, record: &WorkRecord) -> Result<WorkRecord> {
        let sources = Sources::from_record(record)?;
        let tips = tooltips(sources.hints.as_deref());
        let tooltips_json = serde_json::to_string_pretty(&tips).context("serialize tooltips")?;
        let walkthrough_yaml =
            serde_yaml::to_string(&walkthrough()).context("serialize walkthrough")?;
        tracing::info!(tooltips = tips.len(), "in-app guidance created");
        Ok(WorkRecord::new()
            .with(keys::TOOLTIPS_JSON, format!("{tooltips_json}\n"))
            .with(keys::WALKTHROUGH_YAML, walkthrough_yaml))
    }
}
