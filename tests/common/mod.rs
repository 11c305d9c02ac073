//! Shared test infrastructure for integration tests.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const BRIEF: &str = "# Backup service brief\n\nThe October release adds backup listing and restore APIs.\nRestores of large tenants are faster.\n";

const OPENAPI: &str = "\
openapi: 3.0.0
info:
  title: Backup API
servers:
  - url: https://api.example.test
paths:
  /v1/backups:
    get:
      parameters:
        - name: tenantId
          in: query
  /v1/restores:
    post: {}
";

const FEEDBACK: &str = "query,ticket_tag,frequency\nrestore failing with timeout,restore,12\npolicy conflict on save,policy,4\n";

const HINTS: &str = "# Hints\n- Backup: Use Run Now for an immediate backup\n- Restore: Provide the full target path\n";

/// A throwaway project root seeded with intake material.
pub struct Project {
    dir: TempDir,
}

/// Captured result of one binary invocation.
pub struct RunResult {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    /// Parse stdout as the `--json` run payload.
    pub fn payload(&self) -> Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|err| panic!("stdout is not JSON ({err}): {}", self.stdout))
    }
}

/// Outcome of `stage` in a run payload's report.
pub fn outcome<'a>(payload: &'a Value, stage: &str) -> Option<&'a str> {
    payload["report"]["entries"]
        .as_array()?
        .iter()
        .find(|entry| entry["stage"] == stage)
        .and_then(|entry| entry["outcome"].as_str())
}

impl Project {
    /// Project with brief, OpenAPI, feedback, and hints in place.
    pub fn seeded() -> Self {
        let project = Self::empty();
        project.write("intake/tech-docs/brief.md", BRIEF);
        project.write("intake/tech-docs/openapi.yaml", OPENAPI);
        project.write("intake/support/feedback.csv", FEEDBACK);
        project.write("intake/inapp/hints.md", HINTS);
        project
    }

    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("create temp project"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().expect("parent dir")).expect("create dirs");
        fs::write(path, contents).expect("write fixture");
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap_or_else(|err| panic!("read {rel}: {err}"))
    }

    /// Run `docflow --root <project> <args>` with a clean environment.
    pub fn docflow(&self, args: &[&str]) -> RunResult {
        let mut command = Command::new(env!("CARGO_BIN_EXE_docflow"));
        for (key, _) in std::env::vars() {
            if key.starts_with("DOCFLOW_") {
                command.env_remove(key);
            }
        }
        let Output {
            status,
            stdout,
            stderr,
        } = command
            .arg("--root")
            .arg(self.root())
            .args(args)
            .output()
            .expect("spawn docflow");
        RunResult {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }
    }
}
