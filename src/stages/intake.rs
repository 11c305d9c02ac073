//! Intake: gather the brief, API description, support feedback, and hints.
use super::StageContext;
use crate::paths::ProjectPaths;
use crate::record::{keys, WorkRecord};
use crate::stage::{Stage, StageKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::Path;

const TARGETS: [&str; 5] = ["api-reference", "user-guide", "release-notes", "kb", "in-app"];
const RISKS: [&str; 2] = ["api-reference", "release-notes"];

/// One support feedback row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRow {
    pub query: String,
    pub ticket_tag: String,
    pub frequency: u32,
}

/// Raw intake material, stored under the `sources` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sources {
    pub brief: String,
    pub openapi: Option<serde_json::Value>,
    pub feedback: Vec<FeedbackRow>,
    pub hints: Option<String>,
}

impl Sources {
    /// Read intake sources from `record`; absent means nothing was gathered.
    pub fn from_record(record: &WorkRecord) -> Result<Self> {
        Ok(record.data_as(keys::SOURCES)?.unwrap_or_default())
    }
}

pub struct IntakeStage {
    paths: ProjectPaths,
}

impl IntakeStage {
    pub fn new(ctx: &StageContext) -> Self {
        Self {
            paths: ctx.paths.clone(),
        }
    }
}

impl Stage for IntakeStage {
    fn name(&self) -> &'static str {
        super::INTAKE
    }

    fn kind(&self) -> StageKind {
        StageKind::Intake
    }

    fn writes(&self) -> &'static [&'static str] {
        &[keys::TARGETS, keys::RISKS, keys::SOURCES]
    }

    fn run(&self, _record: &WorkRecord) -> Result<WorkRecord> {
        let brief_path = self.paths.brief_path();
        let brief = fs::read_to_string(&brief_path)
            .with_context(|| format!("read brief {}", brief_path.display()))?;

        let openapi = match self
            .paths
            .openapi_candidates()
            .into_iter()
            .find(|path| path.is_file())
        {
            Some(path) => Some(read_openapi(&path)?),
            None => None,
        };

        let feedback_path = self.paths.feedback_path();
        let feedback = if feedback_path.is_file() {
            read_feedback(&feedback_path)?
        } else {
            Vec::new()
        };

        let hints_path = self.paths.hints_path();
        let hints = if hints_path.is_file() {
            Some(
                fs::read_to_string(&hints_path)
                    .with_context(|| format!("read {}", hints_path.display()))?,
            )
        } else {
            None
        };

        let sources = Sources {
            brief,
            openapi,
            feedback,
            hints,
        };
        tracing::info!(
            openapi = sources.openapi.is_some(),
            feedback_rows = sources.feedback.len(),
            hints = sources.hints.is_some(),
            "intake gathered"
        );
        Ok(WorkRecord::new()
            .with(keys::TARGETS, json!(TARGETS))
            .with(keys::RISKS, json!(RISKS))
            .with(
                keys::SOURCES,
                serde_json::to_value(&sources).context("serialize intake sources")?,
            ))
    }
}

/// Parse an OpenAPI document; YAML parsing also accepts JSON.
pub fn read_openapi(path: &Path) -> Result<serde_json::Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

#[derive(Deserialize)]
struct RawFeedback {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    ticket_tag: Option<String>,
    #[serde(default)]
    frequency: Option<String>,
}

/// Read `query,ticket_tag,frequency` rows; a blank or bad frequency counts once.
pub fn read_feedback(path: &Path) -> Result<Vec<FeedbackRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut rows = Vec::new();
    for (index, row) in reader.deserialize::<RawFeedback>().enumerate() {
        let row = row.with_context(|| format!("parse {} row {}", path.display(), index + 1))?;
        rows.push(FeedbackRow {
            query: row.query.unwrap_or_default(),
            ticket_tag: row.ticket_tag.unwrap_or_default().to_lowercase(),
            frequency: row
                .frequency
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(1),
        });
    }
    Ok(rows)
}
