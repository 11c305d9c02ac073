//! Plan registry: named, immutable stage sequences fixed at startup.
//!
//! Registration is explicit. Optional stages are decided once from
//! [`Capabilities`] when the standard catalog is built, never per run.
use crate::error::PlanError;
use crate::stage::{Stage, StageKind};
use crate::stages::{self, StageSet};
use std::rc::Rc;

/// Governance stages must appear in exactly this relative order.
pub const GOVERNANCE_ORDER: [&str; 3] = [stages::STYLE, stages::FACTUAL, stages::COMPLIANCE];

/// Plan that runs every producer.
pub const FULL_PLAN: &str = "all";

/// Optional stages resolved once at process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub web_ingest: bool,
}

/// A named, ordered stage sequence.
pub struct Plan {
    name: String,
    stages: Vec<Rc<dyn Stage>>,
}

impl Plan {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Rc<dyn Stage>] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }
}

/// Catalog of plans in registration order.
#[derive(Default)]
pub struct PlanRegistry {
    plans: Vec<Plan>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a plan; names are unique.
    pub fn register(&mut self, name: &str, stages: Vec<Rc<dyn Stage>>) -> Result<(), PlanError> {
        if self.plans.iter().any(|plan| plan.name == name) {
            return Err(PlanError::Duplicate {
                name: name.to_string(),
            });
        }
        validate_plan(name, &stages)?;
        self.plans.push(Plan {
            name: name.to_string(),
            stages,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Plan, PlanError> {
        self.plans
            .iter()
            .find(|plan| plan.name == name)
            .ok_or_else(|| PlanError::UnknownPlan {
                name: name.to_string(),
                known: self.list().into_iter().map(str::to_string).collect(),
            })
    }

    /// Plan names in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.plans.iter().map(|plan| plan.name.as_str()).collect()
    }
}

/// Check plan shape: intake first, publish last, producers before governance,
/// governance in [`GOVERNANCE_ORDER`] with style and compliance present.
pub fn validate_plan(name: &str, stages: &[Rc<dyn Stage>]) -> Result<(), PlanError> {
    let malformed = |reason: String| PlanError::Malformed {
        plan: name.to_string(),
        reason,
    };
    let (Some(first), Some(last)) = (stages.first(), stages.last()) else {
        return Err(malformed("plan has no stages".to_string()));
    };
    if first.kind() != StageKind::Intake {
        return Err(malformed(format!(
            "first stage must be intake, got {}",
            first.name()
        )));
    }
    if last.kind() != StageKind::Publish {
        return Err(malformed(format!(
            "last stage must be publish, got {}",
            last.name()
        )));
    }

    let mut governance_seen: Vec<&str> = Vec::new();
    for (index, stage) in stages.iter().enumerate() {
        match stage.kind() {
            StageKind::Intake if index != 0 => {
                return Err(malformed(format!("intake stage {} is not first", stage.name())));
            }
            StageKind::Publish if index != stages.len() - 1 => {
                return Err(malformed(format!("publish stage {} is not last", stage.name())));
            }
            StageKind::Producer if !governance_seen.is_empty() => {
                return Err(malformed(format!(
                    "producer {} runs after governance",
                    stage.name()
                )));
            }
            StageKind::Governance => governance_seen.push(stage.name()),
            _ => {}
        }
    }

    let mut ranks = Vec::with_capacity(governance_seen.len());
    for stage in &governance_seen {
        let rank = GOVERNANCE_ORDER
            .iter()
            .position(|known| known == stage)
            .ok_or_else(|| malformed(format!("unknown governance stage {stage}")))?;
        ranks.push(rank);
    }
    if ranks.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(malformed(format!(
            "governance must run in order {}, got {}",
            GOVERNANCE_ORDER.join(" -> "),
            governance_seen.join(" -> ")
        )));
    }
    for required in [stages::STYLE, stages::COMPLIANCE] {
        if !governance_seen.contains(&required) {
            return Err(malformed(format!("missing governance stage {required}")));
        }
    }
    Ok(())
}

/// Build the standard plan catalog from one shared set of stage instances.
pub fn standard_registry(set: &StageSet, caps: Capabilities) -> Result<PlanRegistry, PlanError> {
    let web: Vec<Rc<dyn Stage>> = if caps.web_ingest {
        vec![set.ingest_web.clone()]
    } else {
        Vec::new()
    };
    let governed = |mut producers: Vec<Rc<dyn Stage>>| -> Vec<Rc<dyn Stage>> {
        let mut plan: Vec<Rc<dyn Stage>> = vec![set.intake.clone()];
        plan.append(&mut producers);
        plan.extend([
            set.style.clone(),
            set.factual.clone(),
            set.compliance.clone(),
            set.publish.clone(),
        ]);
        plan
    };

    let mut registry = PlanRegistry::new();

    let mut full: Vec<Rc<dyn Stage>> = web.clone();
    full.extend([
        set.research.clone(),
        set.writer_tech.clone(),
        set.writer_support.clone(),
        set.writer_inapp.clone(),
        set.writer_comms.clone(),
    ]);
    registry.register(FULL_PLAN, governed(full))?;

    registry.register(
        "tech-release",
        governed(vec![set.research.clone(), set.writer_tech.clone()]),
    )?;

    let mut kb: Vec<Rc<dyn Stage>> = web;
    kb.extend([set.research.clone(), set.writer_support.clone()]);
    registry.register("kb-update", governed(kb))?;

    registry.register(
        "inapp-update",
        governed(vec![set.research.clone(), set.writer_inapp.clone()]),
    )?;

    registry.register(
        "comms-update",
        governed(vec![
            set.research.clone(),
            set.writer_tech.clone(),
            set.writer_comms.clone(),
        ]),
    )?;

    Ok(registry)
}

#[cfg(test)]
#[path = "plans_tests.rs"]
mod tests;
