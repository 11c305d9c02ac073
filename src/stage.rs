//! The stage contract shared by producers, governance, and publish.
use crate::error::StageError;
use crate::record::WorkRecord;
use anyhow::Result;
use serde::Serialize;
use std::fmt;

/// Position class of a stage; plans are validated against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Intake,
    Producer,
    Governance,
    Publish,
}

impl StageKind {
    /// Return the stable string identifier used in logs and listings.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Intake => "intake",
            StageKind::Producer => "producer",
            StageKind::Governance => "governance",
            StageKind::Publish => "publish",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named unit of work over the work record.
///
/// `run` receives the full record and returns only the keys it adds or
/// overwrites; every returned key must appear in `writes`.
pub trait Stage {
    fn name(&self) -> &'static str;

    fn kind(&self) -> StageKind {
        StageKind::Producer
    }

    fn writes(&self) -> &'static [&'static str];

    fn run(&self, record: &WorkRecord) -> Result<WorkRecord>;
}

/// Reject keys a stage returned without declaring them.
pub fn check_contract(stage: &dyn Stage, update: &WorkRecord) -> Result<(), StageError> {
    let declared = stage.writes();
    let undeclared: Vec<&str> = update
        .keys()
        .filter(|key| !declared.contains(key))
        .collect();
    if undeclared.is_empty() {
        return Ok(());
    }
    Err(StageError::contract(
        stage.name(),
        format!("returned undeclared keys [{}]", undeclared.join(", ")),
    ))
}
