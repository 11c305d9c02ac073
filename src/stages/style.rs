//! House-style normalization of every governed artifact.
use super::StageContext;
use crate::governance::style::normalize;
use crate::governance::{rewrite_governed, GOVERNED_KEYS};
use crate::paths::ProjectPaths;
use crate::policy::{load_policy, PolicyMode, StylePolicy};
use crate::record::WorkRecord;
use crate::stage::{Stage, StageKind};
use anyhow::Result;

pub struct StyleStage {
    paths: ProjectPaths,
    mode: PolicyMode,
}

impl StyleStage {
    pub fn new(ctx: &StageContext) -> Self {
        Self {
            paths: ctx.paths.clone(),
            mode: ctx.policy_mode,
        }
    }
}

impl Stage for StyleStage {
    fn name(&self) -> &'static str {
        super::STYLE
    }

    fn kind(&self) -> StageKind {
        StageKind::Governance
    }

    fn writes(&self) -> &'static [&'static str] {
        &GOVERNED_KEYS
    }

    fn run(&self, record: &WorkRecord) -> Result<WorkRecord> {
        let loaded = load_policy::<StylePolicy>(&self.paths, self.mode)?;
        let update = rewrite_governed(record, |_, text| Ok(normalize(text, &loaded.policy)))?;
        tracing::info!(changed = update.len(), policy = ?loaded.source, "style normalized");
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;
    use crate::record::keys;
    use crate::stages::testing::{context, run, write};
    use std::collections::BTreeMap;

    const POLICY: &str = "active_voice: true\ntense: present\nforbidden: [simply]\nsentence_max: 0\n";

    #[test]
    fn rewrites_prose_and_kb_entries() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write(dir.path(), "policies/style.yml", POLICY);
        let mut kb = BTreeMap::new();
        kb.insert("a.md".to_string(), "The backups will start.\n".to_string());
        let record = WorkRecord::new()
            .with(keys::API_REFERENCE_MD, "# Using The API\n\nSimply call it.\n")
            .with(keys::USER_GUIDE_MD, "Already clean.\n")
            .with(keys::TOOLTIPS_JSON, "[ simply ]")
            .with(keys::KB_FILES, kb);

        let update = run(&StyleStage::new(&context(dir.path())), &record);
        assert_eq!(update.text(keys::API_REFERENCE_MD), Some("# Using the API\n\nCall it.\n"));
        assert_eq!(
            update.keys().collect::<Vec<_>>(),
            vec![keys::API_REFERENCE_MD, keys::KB_FILES]
        );
        let kb = update.collection(keys::KB_FILES).expect("kb");
        assert_eq!(kb["a.md"], "The backups start.\n");
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write(dir.path(), "policies/style.yml", POLICY);
        let stage = StyleStage::new(&context(dir.path()));
        let mut record = WorkRecord::new().with(
            keys::RELEASE_NOTES_MD,
            "# Notes\n\n\n\nThe fix is shipped by the team.   \n\n```\nwill stay\n```\n",
        );
        record.merge(run(&stage, &record));
        assert!(run(&stage, &record).is_empty());
    }

    #[test]
    fn strict_mode_rejects_unknown_policy_keys() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write(dir.path(), "policies/style.yml", "tone: friendly\n");
        let mut ctx = context(dir.path());
        ctx.policy_mode = PolicyMode::Strict;
        let err = StyleStage::new(&ctx)
            .run(&WorkRecord::new())
            .expect_err("strict policy");
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::UnknownKeys { .. })
        ));
    }
}
