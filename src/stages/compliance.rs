//! Compliance gate over the governed artifacts.
use super::StageContext;
use crate::governance::compliance::evaluate;
use crate::governance::governed_artifacts;
use crate::paths::ProjectPaths;
use crate::policy::{load_policy, CompliancePolicy, PolicyMode, RiskPolicy};
use crate::record::{keys, WorkRecord};
use crate::stage::{Stage, StageKind};
use anyhow::Result;
use serde_json::json;

pub struct ComplianceStage {
    paths: ProjectPaths,
    mode: PolicyMode,
}

impl ComplianceStage {
    pub fn new(ctx: &StageContext) -> Self {
        Self {
            paths: ctx.paths.clone(),
            mode: ctx.policy_mode,
        }
    }
}

impl Stage for ComplianceStage {
    fn name(&self) -> &'static str {
        super::COMPLIANCE
    }

    fn kind(&self) -> StageKind {
        StageKind::Governance
    }

    fn writes(&self) -> &'static [&'static str] {
        &[keys::APPROVED, keys::COMPLIANCE_NOTES]
    }

    fn run(&self, record: &WorkRecord) -> Result<WorkRecord> {
        let compliance = load_policy::<CompliancePolicy>(&self.paths, self.mode)?.policy;
        let risk = load_policy::<RiskPolicy>(&self.paths, self.mode)?.policy;

        let report = evaluate(&governed_artifacts(record), &compliance, &risk);
        for artifact in &report.artifacts {
            tracing::debug!(%artifact, findings = report.findings_for(artifact).count(), "checked");
        }
        if report.is_clean() {
            tracing::debug!("no compliance findings");
        }
        for note in report.notes() {
            tracing::warn!(%note, "compliance note");
        }
        let checked = report.artifacts.len();
        let notes = report.into_result()?;
        tracing::info!(artifacts = checked, notes = notes.len(), "compliance passed");
        Ok(WorkRecord::new()
            .with(keys::APPROVED, json!(true))
            .with(keys::COMPLIANCE_NOTES, json!(notes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComplianceViolation;
    use crate::stages::testing::{context, run, write};

    const API: &str = "---\ntags: [api-reference]\n---\n# API\n\nSource: openapi.yaml\n";

    #[test]
    fn soft_findings_are_returned_as_notes() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write(dir.path(), "policies/risk.yml", "risk_band:\n  L2: [api-reference]\n");
        let record = WorkRecord::new()
            .with(keys::API_REFERENCE_MD, API)
            .with(keys::USER_GUIDE_MD, "Guide\n");

        let update = run(&ComplianceStage::new(&context(dir.path())), &record);
        assert_eq!(update.data(keys::APPROVED), Some(&json!(true)));
        assert_eq!(
            update.data(keys::COMPLIANCE_NOTES),
            Some(&json!([
                "api-reference expected risk_band L2 (tags=[api-reference])",
                "user-guide missing Source line",
            ]))
        );
    }

    #[test]
    fn hard_findings_fail_with_every_violation() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write(dir.path(), "policies/risk.yml", "risk_band:\n  L2: [api-reference]\n");
        write(
            dir.path(),
            "docs/governance/compliance.yml",
            "hard_fail_missing_gates: true\nhard_fail_pii: true\n",
        );
        let record = WorkRecord::new()
            .with(keys::API_REFERENCE_MD, API)
            .with(keys::RELEASE_NOTES_MD, "Mail ops@example.com\nSource: x\n");

        let err = ComplianceStage::new(&context(dir.path()))
            .run(&record)
            .expect_err("hard failure");
        let violation = err.downcast_ref::<ComplianceViolation>().expect("violation");
        assert_eq!(
            violation.violations,
            vec![
                "api-reference expected risk_band L2 (tags=[api-reference])",
                "PII detected (email) in release-notes",
            ]
        );
    }

    #[test]
    fn empty_record_is_approved() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let update = run(&ComplianceStage::new(&context(dir.path())), &WorkRecord::new());
        assert_eq!(update.data(keys::COMPLIANCE_NOTES), Some(&json!([])));
    }
}
