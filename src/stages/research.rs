//! Research: endpoint inventory, API change detection, and top support queries.
use super::intake::{read_openapi, FeedbackRow, Sources};
use super::StageContext;
use crate::paths::ProjectPaths;
use crate::record::{keys, WorkRecord};
use crate::stage::Stage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const HTTP_METHODS: [&str; 8] = ["get", "put", "post", "delete", "patch", "head", "options", "trace"];

/// One operation of the API description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl Endpoint {
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Endpoints stored under the `endpoints` key, or none.
pub fn endpoints_from(record: &WorkRecord) -> Result<Vec<Endpoint>> {
    Ok(record.data_as(keys::ENDPOINTS)?.unwrap_or_default())
}

/// Operations under `paths`, in path order then method order.
pub fn extract_endpoints(openapi: &Value) -> Vec<Endpoint> {
    let Some(paths) = openapi.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut endpoints = Vec::new();
    for (path, operations) in paths {
        let Some(operations) = operations.as_object() else {
            continue;
        };
        for (method, detail) in operations {
            if !HTTP_METHODS.contains(&method.to_ascii_lowercase().as_str()) {
                continue;
            }
            let params = detail
                .get("parameters")
                .and_then(Value::as_array)
                .map(|params| {
                    params
                        .iter()
                        .filter_map(|param| param.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            endpoints.push(Endpoint {
                method: method.to_ascii_uppercase(),
                path: path.clone(),
                params,
            });
        }
    }
    endpoints
}

/// Feedback rows by descending frequency; ties keep intake order.
pub fn top_queries(feedback: &[FeedbackRow]) -> Vec<FeedbackRow> {
    let mut rows = feedback.to_vec();
    rows.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    rows
}

pub struct ResearchStage {
    paths: ProjectPaths,
}

impl ResearchStage {
    pub fn new(ctx: &StageContext) -> Self {
        Self {
            paths: ctx.paths.clone(),
        }
    }

    fn diffs(&self, openapi: Option<&Value>, endpoints: &[Endpoint]) -> Result<Vec<String>> {
        let published_path = self.paths.published_openapi_path();
        let Some(current) = openapi else {
            return Ok(Vec::new());
        };
        if !published_path.is_file() {
            return Ok(Vec::new());
        }
        let published = read_openapi(&published_path)?;
        if &published == current {
            return Ok(Vec::new());
        }
        Ok(endpoints.iter().map(Endpoint::label).collect())
    }
}

impl Stage for ResearchStage {
    fn name(&self) -> &'static str {
        super::RESEARCH
    }

    fn writes(&self) -> &'static [&'static str] {
        &[
            keys::API_SUMMARY,
            keys::DIFFS,
            keys::SUPPORT_INSIGHTS,
            keys::ENDPOINTS,
        ]
    }

    fn run(&self, record: &WorkRecord) -> Result<WorkRecord> {
        let sources = Sources::from_record(record)?;
        let endpoints = sources
            .openapi
            .as_ref()
            .map(extract_endpoints)
            .unwrap_or_default();
        let api_summary = endpoints
            .iter()
            .map(Endpoint::label)
            .collect::<Vec<_>>()
            .join(", ");
        let diffs = self.diffs(sources.openapi.as_ref(), &endpoints)?;
        let insights = json!({ "top_queries": top_queries(&sources.feedback) });

        tracing::info!(
            endpoints = endpoints.len(),
            diffs = diffs.len(),
            "research complete"
        );
        Ok(WorkRecord::new()
            .with(keys::API_SUMMARY, api_summary)
            .with(keys::DIFFS, json!(diffs))
            .with(keys::SUPPORT_INSIGHTS, insights)
            .with(
                keys::ENDPOINTS,
                serde_json::to_value(&endpoints).context("serialize endpoints")?,
            ))
    }
}
