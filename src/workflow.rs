//! Command handlers: wire CLI arguments to the registry and engine.
use crate::cli::{RootArgs, RunArgs};
use crate::engine::{execute, ExecOptions, ExecutionReport, StageOutcome};
use crate::error::PlanError;
use crate::paths::ProjectPaths;
use crate::plans::{standard_registry, Capabilities, PlanRegistry};
use crate::policy::PolicyMode;
use crate::publish::FsPublisher;
use crate::record::{keys, WorkRecord};
use crate::stage::StageKind;
use crate::stages::{self, HttpFetcher, StageContext, StageSet};
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::rc::Rc;

/// Exit status for a failed command: `2` for an unknown plan, else `1`.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PlanError>() {
        Some(PlanError::UnknownPlan { .. }) => 2,
        _ => 1,
    }
}

fn context(root: &RootArgs, mode: PolicyMode) -> StageContext {
    StageContext {
        paths: ProjectPaths::new(root.root.clone()),
        policy_mode: mode,
        publisher: Rc::new(FsPublisher::new(root.root.clone())),
        fetcher: Rc::new(HttpFetcher::new()),
        today: chrono::Local::now().date_naive(),
    }
}

fn registry(root: &RootArgs, ctx: &StageContext) -> Result<PlanRegistry> {
    let caps = Capabilities {
        web_ingest: root.web,
    };
    let set = StageSet::new(ctx);
    standard_registry(&set, caps).context("build plan registry")
}

pub fn list_plans(root: &RootArgs) -> Result<()> {
    let registry = registry(root, &context(root, PolicyMode::Permissive))?;
    for name in registry.list() {
        if root.verbose {
            let plan = registry.get(name)?;
            println!("{name}: {}", plan.stage_names().join(", "));
        } else {
            println!("{name}");
        }
    }
    Ok(())
}

pub fn run_plan(root: &RootArgs, args: &RunArgs) -> Result<()> {
    let mode = if args.strict_policy {
        PolicyMode::Strict
    } else {
        PolicyMode::Permissive
    };
    let ctx = context(root, mode);
    let registry = registry(root, &ctx)?;
    let plan = registry.get(args.plan_name())?;

    let options = ExecOptions {
        stop_on_error: args.stop_on_error,
        dry_run: args.dry_run,
        include: args.include.iter().map(|name| name.trim().to_string()).collect(),
        exclude: args.exclude.iter().map(|name| name.trim().to_string()).collect(),
    };
    let known = plan.stage_names();
    for name in options.include.iter().chain(&options.exclude) {
        if !known.contains(&name.as_str()) {
            tracing::warn!(stage = %name, plan = plan.name(), "filter names a stage outside the plan");
        }
    }
    tracing::info!(
        plan = plan.name(),
        root = %root.root.display(),
        dry_run = options.dry_run,
        stop_on_error = options.stop_on_error,
        "run started"
    );

    match execute(plan.stages(), &options) {
        Ok(output) => {
            log_report(&output.report);
            let failed = output.report.errored().count();
            if failed > 0 {
                tracing::warn!(failed, "run completed with failed stages");
            }
            if output.report.outcome_of(stages::PUBLISH) == Some(StageOutcome::SkippedByDryRun) {
                tracing::info!("dry run; nothing published");
            }
            let payload = run_payload(plan.name(), &output.report, &output.record);
            log_summary(&payload);
            if args.json {
                print_json(&payload)?;
            }
            let governance_failure = plan
                .stages()
                .iter()
                .filter(|stage| stage.kind() == StageKind::Governance)
                .find(|stage| output.report.outcome_of(stage.name()) == Some(StageOutcome::Errored));
            match governance_failure {
                Some(stage) => Err(anyhow!("governance stage {} failed; nothing published", stage.name())),
                None => Ok(()),
            }
        }
        Err(aborted) => {
            log_report(&aborted.report);
            if args.json {
                print_json(&run_payload(plan.name(), &aborted.report, &aborted.record))?;
            }
            Err(aborted.into())
        }
    }
}

/// Machine-readable outcome of one run.
pub fn run_payload(plan: &str, report: &ExecutionReport, record: &WorkRecord) -> Value {
    json!({
        "plan": plan,
        "report": report,
        "summary": record.text(keys::SUMMARY),
        "written_paths": record.data(keys::WRITTEN_PATHS).cloned().unwrap_or_else(|| json!([])),
    })
}

fn log_report(report: &ExecutionReport) {
    for entry in &report.entries {
        let elapsed_ms = entry.elapsed.as_millis() as u64;
        match &entry.error {
            Some(error) => tracing::info!(stage = %entry.stage, outcome = %entry.outcome, elapsed_ms, %error, "report"),
            None => tracing::info!(stage = %entry.stage, outcome = %entry.outcome, elapsed_ms, "report"),
        }
    }
    tracing::info!(total_ms = report.total.as_millis() as u64, "run finished");
}

fn log_summary(payload: &Value) {
    let summary = payload["summary"].as_str().unwrap_or("no artifacts published");
    tracing::info!("SUMMARY: {summary}");
    for path in payload["written_paths"].as_array().into_iter().flatten() {
        if let Some(path) = path.as_str() {
            tracing::info!(%path, "written");
        }
    }
}

fn print_json(payload: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(payload).context("serialize run payload")?;
    println!("{text}");
    Ok(())
}
