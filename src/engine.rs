//! Execution engine: runs an ordered stage sequence against a fresh record.
//!
//! The engine owns the record for the whole run, applies include/exclude
//! filters and dry-run suppression, times each stage, and either stops at the
//! first failure or records it and moves on. A failed governance stage always
//! withholds every later publish stage.
use crate::error::{RunAborted, StageError};
use crate::record::WorkRecord;
use crate::stage::{check_contract, Stage, StageKind};
use anyhow::anyhow;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Per-run behavior switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    pub stop_on_error: bool,
    pub dry_run: bool,
    /// When non-empty, only these stages run.
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            dry_run: false,
            include: BTreeSet::new(),
            exclude: BTreeSet::new(),
        }
    }
}

impl ExecOptions {
    fn filtered_out(&self, name: &str) -> bool {
        if !self.include.is_empty() && !self.include.contains(name) {
            return true;
        }
        self.exclude.contains(name)
    }
}

/// What happened to one stage in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Ran,
    SkippedByFilter,
    SkippedByDryRun,
    Errored,
}

impl StageOutcome {
    /// Return the stable string identifier used in logs and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageOutcome::Ran => "ran",
            StageOutcome::SkippedByFilter => "skipped_by_filter",
            StageOutcome::SkippedByDryRun => "skipped_by_dry_run",
            StageOutcome::Errored => "errored",
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub stage: String,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ordered record of every attempted stage in one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    pub entries: Vec<ReportEntry>,
    #[serde(rename = "total_ms", serialize_with = "serialize_millis")]
    pub total: Duration,
}

impl ExecutionReport {
    pub fn outcome_of(&self, stage: &str) -> Option<StageOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.stage == stage)
            .map(|entry| entry.outcome)
    }

    pub fn errored(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.outcome == StageOutcome::Errored)
    }

    fn push(&mut self, stage: &str, elapsed: Duration, outcome: StageOutcome, error: Option<String>) {
        self.entries.push(ReportEntry {
            stage: stage.to_string(),
            elapsed,
            outcome,
            error,
        });
    }
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64() * 1000.0)
}

/// A completed run: the final record and its report.
#[derive(Debug)]
pub struct RunOutput {
    pub record: WorkRecord,
    pub report: ExecutionReport,
}

/// Run `stages` in order against a fresh record.
///
/// With `stop_on_error` the first failing stage aborts the run and the error
/// carries the partial record and report; otherwise failures are reported and
/// the failed stage's output is discarded. Publish stages after a failed
/// governance stage are reported as errored without running.
pub fn execute(stages: &[Rc<dyn Stage>], options: &ExecOptions) -> Result<RunOutput, RunAborted> {
    let started = Instant::now();
    let mut record = WorkRecord::new();
    let mut report = ExecutionReport::default();
    let mut failed_governance: Option<&str> = None;

    for stage in stages {
        let name = stage.name();
        if options.filtered_out(name) {
            tracing::debug!(stage = name, "stage skipped by filter");
            report.push(name, Duration::ZERO, StageOutcome::SkippedByFilter, None);
            continue;
        }
        if options.dry_run && stage.kind() == StageKind::Publish {
            tracing::info!(stage = name, "stage skipped by dry run");
            report.push(name, Duration::ZERO, StageOutcome::SkippedByDryRun, None);
            continue;
        }
        if let (StageKind::Publish, Some(governance)) = (stage.kind(), failed_governance) {
            let withheld = StageError::Withheld {
                stage: name.to_string(),
                governance: governance.to_string(),
            };
            tracing::warn!(stage = name, %governance, "publish withheld after governance failure");
            report.push(name, Duration::ZERO, StageOutcome::Errored, Some(withheld.to_string()));
            continue;
        }

        tracing::info!(stage = name, "stage started");
        let stage_started = Instant::now();
        let result = invoke(stage.as_ref(), &record);
        let elapsed = stage_started.elapsed();

        match result {
            Ok(update) => {
                tracing::info!(
                    stage = name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    keys = update.len(),
                    "stage finished"
                );
                record.merge(update);
                report.push(name, elapsed, StageOutcome::Ran, None);
            }
            Err(err) => {
                let message = format!("{err:#}");
                report.push(name, elapsed, StageOutcome::Errored, Some(message.clone()));
                if stage.kind() == StageKind::Governance && failed_governance.is_none() {
                    failed_governance = Some(name);
                }
                if options.stop_on_error {
                    tracing::error!(stage = name, error = %message, "stage failed; aborting run");
                    report.total = started.elapsed();
                    return Err(RunAborted {
                        stage: name.to_string(),
                        error: err,
                        record,
                        report,
                    });
                }
                tracing::warn!(stage = name, error = %message, "stage failed; continuing");
            }
        }
    }

    report.total = started.elapsed();
    Ok(RunOutput { record, report })
}

fn invoke(stage: &dyn Stage, record: &WorkRecord) -> anyhow::Result<WorkRecord> {
    let update = match panic::catch_unwind(AssertUnwindSafe(|| stage.run(record))) {
        Ok(result) => result?,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|text| text.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            return Err(anyhow!(StageError::contract(
                stage.name(),
                format!("panicked: {detail}")
            )));
        }
    };
    check_contract(stage, &update)?;
    Ok(update)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
