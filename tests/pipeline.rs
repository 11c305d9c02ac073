//! End-to-end runs of the docflow binary against temporary projects.

mod common;

use common::{outcome, Project};
use serde_json::json;

const REFERENCE: &str = "docs/samples/api-reference/reference.md";
const DECISIONS: &str = "docs/evidence/decisions.md";

#[test]
fn list_prints_registered_plans() {
    let project = Project::empty();
    let result = project.docflow(&["list"]);
    assert_eq!(result.code, Some(0), "stderr: {}", result.stderr);
    assert_eq!(
        result.stdout.lines().collect::<Vec<_>>(),
        vec!["all", "tech-release", "kb-update", "inapp-update", "comms-update"]
    );

    let verbose = project.docflow(&["list", "--verbose"]);
    assert!(verbose
        .stdout
        .contains("tech-release: intake, research, writer-tech, style, factual, compliance, publish"));
}

#[test]
fn unknown_plan_exits_with_two() {
    let project = Project::seeded();
    let result = project.docflow(&["run", "--plan", "nope"]);
    assert_eq!(result.code, Some(2));
    assert!(result.stderr.contains("unknown plan 'nope'"), "stderr: {}", result.stderr);
    assert!(!project.path("docs").exists());
}

#[test]
fn full_run_publishes_governed_artifacts() {
    let project = Project::seeded();
    let result = project.docflow(&["run", "--all", "--json"]);
    assert_eq!(result.code, Some(0), "stderr: {}", result.stderr);

    let payload = result.payload();
    assert_eq!(payload["plan"], json!("all"));
    for stage in ["intake", "research", "writer-comms", "style", "factual", "compliance", "publish"] {
        assert_eq!(outcome(&payload, stage), Some("ran"), "{stage}");
    }
    let written: Vec<&str> = payload["written_paths"]
        .as_array()
        .expect("written paths")
        .iter()
        .filter_map(|path| path.as_str())
        .collect();
    assert!(written.contains(&REFERENCE));
    assert!(written.contains(&"docs/samples/in-app-guidance/tooltips.json"));
    assert!(written.contains(&"docs/samples/internal-comms/announcement-slack.txt"));
    assert!(written.contains(&DECISIONS));
    assert_eq!(
        payload["summary"],
        json!(format!("{} artifacts written", written.len()))
    );

    let reference = project.read(REFERENCE);
    assert!(reference.contains("## GET /v1/backups"));
    assert!(reference.contains("Source: "));
    assert!(project.read("docs/samples/user-guide/tenant-admin.md").contains("restore APIs"));
    let kb_articles = std::fs::read_dir(project.path("docs/samples/kb-articles"))
        .expect("kb directory")
        .count();
    assert!(kb_articles > 0);
}

#[test]
fn second_run_rewrites_nothing() {
    let project = Project::seeded();
    let first = project.docflow(&["run", "--all"]);
    assert_eq!(first.code, Some(0), "stderr: {}", first.stderr);
    assert_eq!(project.read(DECISIONS).lines().count(), 1);

    let second = project.docflow(&["run", "--all", "--json"]);
    let payload = second.payload();
    assert_eq!(payload["summary"], json!("0 artifacts written"));
    assert_eq!(payload["written_paths"], json!([]));
    assert_eq!(project.read(DECISIONS).lines().count(), 1);
}

#[test]
fn dry_run_skips_publish_and_writes_nothing() {
    let project = Project::seeded();
    let result = project.docflow(&["run", "--plan", "kb-update", "--dry-run", "--json"]);
    assert_eq!(result.code, Some(0), "stderr: {}", result.stderr);

    let payload = result.payload();
    assert_eq!(outcome(&payload, "compliance"), Some("ran"));
    assert_eq!(outcome(&payload, "publish"), Some("skipped_by_dry_run"));
    assert_eq!(payload["written_paths"], json!([]));
    assert!(!project.path("docs").exists());
}

#[test]
fn dry_run_can_come_from_the_environment() {
    let project = Project::seeded();
    let mut command = std::process::Command::new(env!("CARGO_BIN_EXE_docflow"));
    let status = command
        .env("DOCFLOW_ROOT", project.root())
        .env("DOCFLOW_DRY_RUN", "yes")
        .args(["run", "--plan", "tech-release"])
        .status()
        .expect("spawn docflow");
    assert!(status.success());
    assert!(!project.path("docs").exists());
}

#[test]
fn include_filter_runs_only_named_stages() {
    let project = Project::seeded();
    let result = project.docflow(&[
        "run",
        "--plan",
        "tech-release",
        "--include",
        "intake,research,writer-tech,publish",
        "--json",
    ]);
    assert_eq!(result.code, Some(0), "stderr: {}", result.stderr);

    let payload = result.payload();
    for stage in ["style", "factual", "compliance"] {
        assert_eq!(outcome(&payload, stage), Some("skipped_by_filter"), "{stage}");
    }
    assert_eq!(outcome(&payload, "publish"), Some("ran"));
    assert!(project.path(REFERENCE).is_file());
    assert!(!project.path("docs/samples/kb-articles").exists());
}

#[test]
fn hard_compliance_failure_aborts_before_publish() {
    let project = Project::seeded();
    project.write(
        "intake/tech-docs/brief.md",
        "# Brief\n\nAccess requests go to ops@example.com for approval.\n",
    );
    project.write("policies/compliance.yml", "hard_fail_pii: true\n");

    let result = project.docflow(&["run", "--plan", "tech-release", "--json"]);
    assert_eq!(result.code, Some(1));
    assert!(
        result.stderr.contains("PII detected (email) in user-guide"),
        "stderr: {}",
        result.stderr
    );

    let payload = result.payload();
    assert_eq!(outcome(&payload, "compliance"), Some("errored"));
    assert_eq!(outcome(&payload, "publish"), None);
    assert!(!project.path("docs").exists());
}

#[test]
fn continue_on_error_still_withholds_publish_after_compliance_failure() {
    let project = Project::seeded();
    project.write(
        "intake/tech-docs/brief.md",
        "# Brief\n\nAccess requests go to ops@example.com for approval.\n",
    );
    project.write("policies/compliance.yml", "hard_fail_pii: true\n");

    let result = project.docflow(&[
        "run",
        "--plan",
        "tech-release",
        "--stop-on-error",
        "false",
        "--json",
    ]);
    assert_eq!(result.code, Some(1), "stderr: {}", result.stderr);
    assert!(
        result.stderr.contains("governance stage compliance failed"),
        "stderr: {}",
        result.stderr
    );

    let payload = result.payload();
    assert_eq!(outcome(&payload, "compliance"), Some("errored"));
    assert_eq!(outcome(&payload, "publish"), Some("errored"));
    assert_eq!(payload["written_paths"], json!([]));
    assert!(!project.path("docs").exists());
}

#[test]
fn strict_policy_rejects_unknown_keys() {
    let project = Project::seeded();
    project.write("docs/governance/style.yml", "sentence_max: 20\ntone: friendly\n");

    let lenient = project.docflow(&["run", "--plan", "tech-release", "--dry-run"]);
    assert_eq!(lenient.code, Some(0), "stderr: {}", lenient.stderr);

    let strict = project.docflow(&["run", "--plan", "tech-release", "--dry-run", "--strict-policy"]);
    assert_eq!(strict.code, Some(1));
    assert!(strict.stderr.contains("unknown keys"), "stderr: {}", strict.stderr);
}

#[test]
fn missing_brief_fails_at_intake() {
    let project = Project::empty();
    let result = project.docflow(&["run", "--all", "--json"]);
    assert_eq!(result.code, Some(1));
    let payload = result.payload();
    assert_eq!(outcome(&payload, "intake"), Some("errored"));
    assert_eq!(payload["report"]["entries"].as_array().map(Vec::len), Some(1));
}
