//! Concrete pipeline stages and the shared context they are built from.
//!
//! Producers are deterministic and read intake files under the project root;
//! governance stages reload their policies on every run.
use crate::paths::ProjectPaths;
use crate::policy::PolicyMode;
use crate::publish::Publisher;
use crate::stage::Stage;
use chrono::NaiveDate;
use std::rc::Rc;

pub mod compliance;
pub mod factual;
pub mod ingest_web;
pub mod intake;
pub mod publish;
pub mod research;
pub mod style;
pub mod writer_comms;
pub mod writer_inapp;
pub mod writer_support;
pub mod writer_tech;

pub use ingest_web::{Fetch, HttpFetcher};

pub const INTAKE: &str = "intake";
pub const INGEST_WEB: &str = "ingest-web";
pub const RESEARCH: &str = "research";
pub const WRITER_TECH: &str = "writer-tech";
pub const WRITER_SUPPORT: &str = "writer-support";
pub const WRITER_INAPP: &str = "writer-inapp";
pub const WRITER_COMMS: &str = "writer-comms";
pub const STYLE: &str = "style";
pub const FACTUAL: &str = "factual";
pub const COMPLIANCE: &str = "compliance";
pub const PUBLISH: &str = "publish";

/// Collaborators and settings shared by every stage of a process.
#[derive(Clone)]
pub struct StageContext {
    pub paths: ProjectPaths,
    pub policy_mode: PolicyMode,
    pub publisher: Rc<dyn Publisher>,
    pub fetcher: Rc<dyn Fetch>,
    /// Date stamped into generated metadata and the decisions log.
    pub today: NaiveDate,
}

impl StageContext {
    pub fn today_iso(&self) -> String {
        self.today.format("%Y-%m-%d").to_string()
    }
}

/// One instance of every stage, shared by all plans.
pub struct StageSet {
    pub intake: Rc<dyn Stage>,
    pub ingest_web: Rc<dyn Stage>,
    pub research: Rc<dyn Stage>,
    pub writer_tech: Rc<dyn Stage>,
    pub writer_support: Rc<dyn Stage>,
    pub writer_inapp: Rc<dyn Stage>,
    pub writer_comms: Rc<dyn Stage>,
    pub style: Rc<dyn Stage>,
    pub factual: Rc<dyn Stage>,
    pub compliance: Rc<dyn Stage>,
    pub publish: Rc<dyn Stage>,
}

impl StageSet {
    pub fn new(ctx: &StageContext) -> Self {
        Self {
            intake: Rc::new(intake::IntakeStage::new(ctx)),
            ingest_web: Rc::new(ingest_web::IngestWebStage::new(ctx)),
            research: Rc::new(research::ResearchStage::new(ctx)),
            writer_tech: Rc::new(writer_tech::WriterTechStage::new(ctx)),
            writer_support: Rc::new(writer_support::WriterSupportStage::new(ctx)),
            writer_inapp: Rc::new(writer_inapp::WriterInappStage::new(ctx)),
            writer_comms: Rc::new(writer_comms::WriterCommsStage::new(ctx)),
            style: Rc::new(style::StyleStage::new(ctx)),
            factual: Rc::new(factual::FactualStage::new(ctx)),
            compliance: Rc::new(compliance::ComplianceStage::new(ctx)),
            publish: Rc::new(publish::PublishStage::new(ctx)),
        }
    }
}

/// Join markdown bullets, one `- item` per line.
pub(crate) fn bullets<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
