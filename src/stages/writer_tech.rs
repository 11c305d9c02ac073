//! Technical writer: API reference, tenant admin guide, and release notes.
use super::intake::Sources;
use super::research::{endpoints_from, Endpoint};
use super::{bullets, StageContext};
use crate::record::{keys, WorkRecord};
use crate::stage::Stage;
use anyhow::Result;
use chrono::NaiveDate;
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://api.example.com";
const API_SOURCE: &str = "intake/tech-docs/openapi.yaml";
const BRIEF_SOURCE: &str = "intake/tech-docs/brief.md";

pub struct WriterTechStage {
    today: NaiveDate,
}

impl WriterTechStage {
    pub fn new(ctx: &StageContext) -> Self {
        Self { today: ctx.today }
    }
}

impl Stage for WriterTechStage {
    fn name(&self) -> &'static str {
        super::WRITER_TECH
    }

    fn writes(&self) -> &'static [&'static str] {
        &[keys::API_REFERENCE_MD, keys::USER_GUIDE_MD, keys::RELEASE_NOTES_MD]
    }

    fn run(&self, record: &WorkRecord) -> Result<WorkRecord> {
        let sources = Sources::from_record(record)?;
        let endpoints = endpoints_from(record)?;
        let diffs: Vec<String> = record.data_as(keys::DIFFS)?.unwrap_or_default();
        let today = self.today.format("%Y-%m-%d").to_string();

        let api_reference = api_reference(sources.openapi.as_ref(), &endpoints, &today);
        let user_guide = user_guide(&sources.brief, &today);
        let release_notes = release_notes(&endpoints, &diffs, self.today);

        tracing::info!(endpoints = endpoints.len(), "technical docs created");
        Ok(WorkRecord::new()
            .with(keys::API_REFERENCE_MD, api_reference)
            .with(keys::USER_GUIDE_MD, user_guide)
            .with(keys::RELEASE_NOTES_MD, release_notes))
    }
}

fn metadata(title: &str, owner: &str, tags: &str, today: &str) -> String {
    format!(
        "---\ntitle: {title}\nowner: {owner}\nstatus: active\ntags: [{tags}]\nlast_reviewed: {today}\n---\n"
    )
}

fn api_reference(openapi: Option<&Value>, endpoints: &[Endpoint], today: &str) -> String {
    let info_title = openapi
        .and_then(|doc| doc.pointer("/info/title"))
        .and_then(Value::as_str)
        .unwrap_or("Service API");
    let base_url = openapi
        .and_then(|doc| doc.pointer("/servers/0/url"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/');

    let mut out = metadata(&format!("{info_title} Reference"), "docs-team", "api-reference", today);
    out.push_str(&format!("# {info_title} reference\n\n"));
    out.push_str("Authentication uses bearer tokens.\n\nPagination uses limit and offset.\n\n");
    if endpoints.is_empty() {
        out.push_str("No endpoints are described yet.\n\n");
    }
    for endpoint in endpoints {
        out.push_str(&format!("## {}\n\n", endpoint.label()));
        if endpoint.params.is_empty() {
            out.push_str("Parameters: none.\n\n");
        } else {
            let params: Vec<String> = endpoint.params.iter().map(|p| format!("`{p}`")).collect();
            out.push_str(&format!("Parameters: {}.\n\n", params.join(", ")));
        }
        out.push_str("```bash\n");
        out.push_str(&curl_example(base_url, endpoint));
        out.push_str("\n```\n\n");
    }
    out.push_str("Checklist: PM, Eng\n\n");
    out.push_str(&format!("Source: {API_SOURCE}\n"));
    out
}

fn curl_example(base_url: &str, endpoint: &Endpoint) -> String {
    let method = if endpoint.method == "GET" {
        String::new()
    } else {
        format!("-X {} ", endpoint.method)
    };
    let query = if endpoint.method == "GET" && !endpoint.params.is_empty() {
        let pairs: Vec<String> = endpoint
            .params
            .iter()
            .map(|param| format!("{param}=VALUE"))
            .collect();
        format!("?{}", pairs.join("&"))
    } else {
        String::new()
    };
    format!(
        "curl {method}-H \"Authorization: Bearer TOKEN\" \\\n  \"{base_url}{}{query}\"",
        endpoint.path
    )
}

/// First prose paragraph of the brief, headings skipped.
fn brief_overview(brief: &str) -> Option<String> {
    let paragraph: Vec<&str> = brief
        .lines()
        .map(str::trim)
        .skip_while(|line| line.is_empty() || line.starts_with('#'))
        .take_while(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    if paragraph.is_empty() {
        None
    } else {
        Some(paragraph.join(" "))
    }
}

fn user_guide(brief: &str, today: &str) -> String {
    let mut out = metadata("Tenant Admin Guide", "docs-team", "user-guide", today);
    out.push_str("# Tenant admin guide\n\n");
    if let Some(overview) = brief_overview(brief) {
        out.push_str(&format!("## Overview\n\n{overview}\n\n"));
    }
    out.push_str(
        "## Configure backup policy\n\
         1. Navigate to Policies.\n\
         2. Define scope and schedule.\n\
         3. Save.\n\n\
         ## Run backup\n\
         1. Open the Backup page.\n\
         2. Select a tenant.\n\
         3. Click Run Now.\n\n\
         ## Restore data\n\
         1. Open Restores.\n\
         2. Choose a backup.\n\
         3. Provide the target path.\n\
         4. Submit.\n\n\
         Verification: Files appear in the target path.\n\
         Rollback: Re-run the backup with the previous settings.\n\n",
    );
    out.push_str(&format!("Source: {BRIEF_SOURCE}\n"));
    out
}

fn release_notes(endpoints: &[Endpoint], diffs: &[String], today: NaiveDate) -> String {
    let iso = today.format("%Y-%m-%d").to_string();
    let month = today.format("%B %Y").to_string();
    let mut out = metadata(&format!("{month} Release Notes"), "docs-team", "release-notes", &iso);
    out.push_str(&format!("# Release notes for {month}\n\n"));
    out.push_str(
        "## Highlights\n\
         - Backup list and restore APIs simplify tenant management.\n\n\
         ## Enhancements\n\
         - Improved restore performance.\n\
         \x20 - Impact: Faster recovery for large tenants.\n\n\
         ## Fixes\n\
         - Addressed policy conflict errors.\n\n\
         ## Known issues\n\
         - Slow backup on large datasets.\n\n",
    );
    let changes: Vec<String> = if diffs.is_empty() {
        endpoints.iter().map(Endpoint::label).collect()
    } else {
        diffs.to_vec()
    };
    out.push_str("## API changes\n");
    if changes.is_empty() {
        out.push_str("- No API changes.\n\n");
    } else {
        out.push_str(&bullets(&changes));
        out.push_str("\n\n");
    }
    out.push_str("Checklist: PM, Eng\n\n");
    out.push_str(&format!("Source: {API_SOURCE}\n"));
    out
}
