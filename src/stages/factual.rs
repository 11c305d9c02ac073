//! Attribution gate: every governed artifact must cite a source.
use super::StageContext;
use crate::error::ComplianceViolation;
use crate::governance::attribution::{ensure_attribution, has_attribution};
use crate::governance::{governed_artifacts, rewrite_governed, GOVERNED_KEYS};
use crate::paths::ProjectPaths;
use crate::policy::{load_policy, CompliancePolicy, PolicyMode};
use crate::record::WorkRecord;
use crate::stage::{Stage, StageKind};
use anyhow::Result;

pub struct FactualStage {
    paths: ProjectPaths,
    mode: PolicyMode,
}

impl FactualStage {
    pub fn new(ctx: &StageContext) -> Self {
        Self {
            paths: ctx.paths.clone(),
            mode: ctx.policy_mode,
        }
    }
}

impl Stage for FactualStage {
    fn name(&self) -> &'static str {
        super::FACTUAL
    }

    fn kind(&self) -> StageKind {
        StageKind::Governance
    }

    fn writes(&self) -> &'static [&'static str] {
        &GOVERNED_KEYS
    }

    fn run(&self, record: &WorkRecord) -> Result<WorkRecord> {
        let policy = load_policy::<CompliancePolicy>(&self.paths, self.mode)?.policy;
        if !policy.sources_required {
            tracing::debug!("attribution not required");
            return Ok(WorkRecord::new());
        }

        let missing: Vec<String> = governed_artifacts(record)
            .into_iter()
            .filter(|artifact| !artifact.text.trim().is_empty() && !has_attribution(artifact.text))
            .map(|artifact| artifact.name)
            .collect();
        if missing.is_empty() {
            return Ok(WorkRecord::new());
        }
        if policy.hard_fail_missing_source {
            return Err(ComplianceViolation {
                violations: missing
                    .iter()
                    .map(|name| format!("{name} missing Source line"))
                    .collect(),
            }
            .into());
        }

        tracing::info!(artifacts = %missing.join(", "), source = %policy.default_source, "attribution added");
        rewrite_governed(record, |_, text| {
            Ok(if text.trim().is_empty() {
                text.to_string()
            } else {
                ensure_attribution(text, &policy.default_source)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::keys;
    use crate::stages::testing::{context, run, write};
    use std::collections::BTreeMap;

    fn record() -> WorkRecord {
        let mut kb = BTreeMap::new();
        kb.insert("a.md".to_string(), "Body\n\nSource: notes\n".to_string());
        kb.insert("b.md".to_string(), "Unsourced".to_string());
        WorkRecord::new()
            .with(keys::API_REFERENCE_MD, "# API\n")
            .with(keys::USER_GUIDE_MD, "Guide\nsource: brief.md\n")
            .with(keys::RELEASE_NOTES_MD, "   \n")
            .with(keys::KB_FILES, kb)
    }

    #[test]
    fn soft_mode_appends_the_default_source() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let update = run(&FactualStage::new(&context(dir.path())), &record());

        assert_eq!(
            update.keys().collect::<Vec<_>>(),
            vec![keys::API_REFERENCE_MD, keys::KB_FILES]
        );
        assert_eq!(
            update.text(keys::API_REFERENCE_MD),
            Some("# API\n\nSource: intake/tech-docs/openapi.yaml\n")
        );
        let kb = update.collection(keys::KB_FILES).expect("kb");
        assert_eq!(kb["a.md"], "Body\n\nSource: notes\n");
        assert_eq!(kb["b.md"], "Unsourced\n\nSource: intake/tech-docs/openapi.yaml\n");
    }

    #[test]
    fn policy_source_overrides_default() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write(dir.path(), "policies/compliance.yml", "default_source: intake/brief.md\n");
        let update = run(&FactualStage::new(&context(dir.path())), &record());
        assert_eq!(
            update.text(keys::API_REFERENCE_MD),
            Some("# API\n\nSource: intake/brief.md\n")
        );
    }

    #[test]
    fn hard_mode_names_every_unsourced_artifact() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write(dir.path(), "policies/compliance.yml", "hard_fail_on_missing_source: true\n");
        let err = FactualStage::new(&context(dir.path()))
            .run(&record())
            .expect_err("missing sources");
        let violation = err.downcast_ref::<ComplianceViolation>().expect("violation");
        assert_eq!(
            violation.violations,
            vec!["api-reference missing Source line", "kb:b.md missing Source line"]
        );
    }

    #[test]
    fn nothing_to_do_when_sources_are_optional() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write(dir.path(), "policies/compliance.yml", "sources_required: false\n");
        let update = run(&FactualStage::new(&context(dir.path())), &record());
        assert!(update.is_empty());
    }
}
