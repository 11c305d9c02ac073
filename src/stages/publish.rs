//! Terminal stage: map record keys to output paths and persist them.
use super::StageContext;
use crate::paths::ProjectPaths;
use crate::publish::{record_decision, Publisher};
use crate::record::{keys, WorkRecord};
use crate::stage::{Stage, StageKind};
use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Single-text keys and where they land under the project root.
pub const OUTPUTS: [(&str, &str); 7] = [
    (keys::API_REFERENCE_MD, "docs/samples/api-reference/reference.md"),
    (keys::USER_GUIDE_MD, "docs/samples/user-guide/tenant-admin.md"),
    (keys::RELEASE_NOTES_MD, "docs/samples/release-notes/latest.md"),
    (keys::TOOLTIPS_JSON, "docs/samples/in-app-guidance/tooltips.json"),
    (keys::WALKTHROUGH_YAML, "docs/samples/in-app-guidance/walkthrough.yaml"),
    (keys::COMMS_ANNOUNCE_MD, "docs/samples/internal-comms/announcement.md"),
    (keys::COMMS_EXEC_BRIEF_MD, "docs/samples/internal-comms/exec-brief.md"),
];
pub const KB_DIR: &str = "docs/samples/kb-articles";

/// Relative path to text for every non-empty publishable value.
pub fn collect_outputs(record: &WorkRecord) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    let mut add = |path: String, text: &str| {
        if !text.trim().is_empty() {
            files.insert(path, text.to_string());
        }
    };
    for (key, path) in OUTPUTS {
        if let Some(text) = record.text(key) {
            add(path.to_string(), text);
        }
    }
    if let Some(kb) = record.collection(keys::KB_FILES) {
        for (name, text) in kb {
            add(format!("{KB_DIR}/{name}"), text);
        }
    }
    if let Some(extras) = record.collection(keys::EXTRA_ARTIFACTS) {
        for (path, text) in extras {
            add(path.clone(), text);
        }
    }
    files
}

pub struct PublishStage {
    paths: ProjectPaths,
    publisher: Rc<dyn Publisher>,
    today: String,
}

impl PublishStage {
    pub fn new(ctx: &StageContext) -> Self {
        Self {
            paths: ctx.paths.clone(),
            publisher: ctx.publisher.clone(),
            today: ctx.today_iso(),
        }
    }
}

impl Stage for PublishStage {
    fn name(&self) -> &'static str {
        super::PUBLISH
    }

    fn kind(&self) -> StageKind {
        StageKind::Publish
    }

    fn writes(&self) -> &'static [&'static str] {
        &[keys::WRITTEN_PATHS, keys::SUMMARY]
    }

    fn run(&self, record: &WorkRecord) -> Result<WorkRecord> {
        let files = collect_outputs(record);
        let mut written = self.publisher.write(&files)?;
        let decisions = self.paths.decisions_rel();
        if record_decision(self.paths.root(), decisions, &self.today)? {
            written.push(decisions.to_string());
        }
        let summary = format!("{} artifacts written", written.len());
        tracing::info!(candidates = files.len(), written = written.len(), "published");
        Ok(WorkRecord::new()
            .with(keys::WRITTEN_PATHS, json!(written))
            .with(keys::SUMMARY, summary))
    }
}
