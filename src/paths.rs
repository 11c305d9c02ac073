//! Typed paths into a project layout.
//!
//! Intake, policy, and output locations are fixed relative to the project root
//! so every stage resolves them the same way.
use std::path::{Path, PathBuf};

/// Policy document names looked up under the governance directories.
pub const STYLE_POLICY: &str = "style.yml";
pub const COMPLIANCE_POLICY: &str = "compliance.yml";
pub const RISK_POLICY: &str = "risk.yml";

/// Convenience wrapper for locating intake, policy, and output files.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn intake_dir(&self) -> PathBuf {
        self.root.join("intake")
    }

    pub fn brief_path(&self) -> PathBuf {
        self.intake_dir().join("tech-docs/brief.md")
    }

    /// OpenAPI candidates, first existing wins.
    pub fn openapi_candidates(&self) -> [PathBuf; 2] {
        let dir = self.intake_dir().join("tech-docs");
        [dir.join("openapi.yaml"), dir.join("openapi.json")]
    }

    pub fn feedback_path(&self) -> PathBuf {
        self.intake_dir().join("support/feedback.csv")
    }

    pub fn incidents_dir(&self) -> PathBuf {
        self.intake_dir().join("support/incidents")
    }

    pub fn support_notes_dir(&self) -> PathBuf {
        self.intake_dir().join("support/notes")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.intake_dir().join("logs")
    }

    pub fn hints_path(&self) -> PathBuf {
        self.intake_dir().join("inapp/hints.md")
    }

    pub fn web_urls_path(&self) -> PathBuf {
        self.intake_dir().join("web/urls.txt")
    }

    pub fn web_prompts_path(&self) -> PathBuf {
        self.intake_dir().join("web/prompts.md")
    }

    /// Policy document candidates for `name`, in lookup order.
    pub fn policy_candidates(&self, name: &str) -> [PathBuf; 2] {
        [
            self.root.join("docs/governance").join(name),
            self.root.join("policies").join(name),
        ]
    }

    /// Previously published OpenAPI document used for change detection.
    pub fn published_openapi_path(&self) -> PathBuf {
        self.root.join("docs/samples/api-reference/openapi.json")
    }

    pub fn decisions_rel(&self) -> &'static str {
        "docs/evidence/decisions.md"
    }
}
