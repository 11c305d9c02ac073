//! Typed error kinds surfaced by the engine, plan registry, and governance.
//!
//! Stage bodies and file helpers propagate `anyhow::Error`; these types mark the
//! failures callers branch on (exit codes, report outcomes, strict policy mode).
use crate::engine::ExecutionReport;
use crate::record::WorkRecord;
use std::path::PathBuf;

/// A stage broke its declared contract.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("stage {stage} violated its contract: {message}")]
    ContractViolation { stage: String, message: String },

    #[error("stage {stage} withheld: governance stage {governance} failed")]
    Withheld { stage: String, governance: String },
}

impl StageError {
    pub fn contract(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContractViolation {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Plan lookup and registration failures.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("unknown plan '{name}' (known: {})", known.join(", "))]
    UnknownPlan { name: String, known: Vec<String> },

    #[error("plan '{name}' is already registered")]
    Duplicate { name: String },

    #[error("plan '{plan}' is malformed: {reason}")]
    Malformed { plan: String, reason: String },
}

/// Aggregated compliance failure listing every hard-fail violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("compliance failed: {}", violations.join("; "))]
pub struct ComplianceViolation {
    pub violations: Vec<String>,
}

/// Policy document problems that abort only in strict mode.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("malformed policy {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("unknown keys in policy {path}: {}", keys.join(", "))]
    UnknownKeys { path: PathBuf, keys: Vec<String> },
}

/// Permissive-mode counterpart of [`PolicyError`]: logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyLoadDegraded {
    pub path: PathBuf,
    pub reason: String,
}

impl std::fmt::Display for PolicyLoadDegraded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "policy {} degraded: {}", self.path.display(), self.reason)
    }
}

/// A `stop_on_error` run stopped at a failing stage.
///
/// Carries the record as of the last completed merge and the report up to and
/// including the failing stage.
#[derive(Debug, thiserror::Error)]
#[error("run aborted at stage {stage}: {error:#}")]
pub struct RunAborted {
    pub stage: String,
    pub error: anyhow::Error,
    pub record: WorkRecord,
    pub report: ExecutionReport,
}
