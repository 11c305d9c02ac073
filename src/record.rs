//! The work record threaded through one pipeline run.
//!
//! A record is an ordered map from key to value. Stages read the whole record
//! and return a partial record; merging overwrites by key and never removes.
use serde::Serialize;
use std::collections::BTreeMap;

/// Well-known record keys shared by stages and the publisher.
pub mod keys {
    pub const TARGETS: &str = "targets";
    pub const RISKS: &str = "risks";
    pub const SOURCES: &str = "sources";
    pub const WEB_DOCS: &str = "web_docs";
    pub const API_SUMMARY: &str = "api_summary";
    pub const DIFFS: &str = "diffs";
    pub const SUPPORT_INSIGHTS: &str = "support_insights";
    pub const ENDPOINTS: &str = "endpoints";
    pub const API_REFERENCE_MD: &str = "api_reference_md";
    pub const USER_GUIDE_MD: &str = "user_guide_md";
    pub const RELEASE_NOTES_MD: &str = "release_notes_md";
    pub const KB_FILES: &str = "kb_files";
    pub const TOOLTIPS_JSON: &str = "tooltips_json";
    pub const WALKTHROUGH_YAML: &str = "walkthrough_yaml";
    pub const COMMS_ANNOUNCE_MD: &str = "comms_announce_md";
    pub const COMMS_EXEC_BRIEF_MD: &str = "comms_exec_brief_md";
    pub const EXTRA_ARTIFACTS: &str = "extra_artifacts";
    pub const APPROVED: &str = "approved";
    pub const COMPLIANCE_NOTES: &str = "compliance_notes";
    pub const WRITTEN_PATHS: &str = "written_paths";
    pub const SUMMARY: &str = "summary";
}

/// One value stored under a record key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    Text(String),
    Data(serde_json::Value),
    /// Named text entries, e.g. KB articles keyed by file name.
    Collection(BTreeMap<String, String>),
}

impl From<String> for RecordValue {
    fn from(value: String) -> Self {
        RecordValue::Text(value)
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        RecordValue::Text(value.to_string())
    }
}

impl From<serde_json::Value> for RecordValue {
    fn from(value: serde_json::Value) -> Self {
        RecordValue::Data(value)
    }
}

impl From<BTreeMap<String, String>> for RecordValue {
    fn from(value: BTreeMap<String, String>) -> Self {
        RecordValue::Collection(value)
    }
}

/// Accumulating key/value state for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WorkRecord {
    fields: BTreeMap<String, RecordValue>,
}

impl WorkRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used by stages to assemble their partial output.
    pub fn with(mut self, key: &str, value: impl Into<RecordValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<RecordValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Overwrite-by-key merge; keys absent from `update` are kept.
    pub fn merge(&mut self, update: WorkRecord) {
        self.fields.extend(update.fields);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Text stored under `key`; `None` when absent or not text.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(RecordValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Structured data stored under `key`; `None` when absent or not data.
    pub fn data(&self, key: &str) -> Option<&serde_json::Value> {
        match self.fields.get(key) {
            Some(RecordValue::Data(value)) => Some(value),
            _ => None,
        }
    }

    /// Named text collection stored under `key`; `None` when absent or not a collection.
    pub fn collection(&self, key: &str) -> Option<&BTreeMap<String, String>> {
        match self.fields.get(key) {
            Some(RecordValue::Collection(entries)) => Some(entries),
            _ => None,
        }
    }

    /// Deserialize structured data under `key`, treating absence as `None`.
    pub fn data_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        use anyhow::Context;
        match self.data(key) {
            Some(value) => {
                let parsed = serde_json::from_value(value.clone())
                    .with_context(|| format!("decode record key {key}"))?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overwrites_by_key_and_keeps_the_rest() {
        let mut record = WorkRecord::new().with("a", "one").with("b", json!(1));
        record.merge(WorkRecord::new().with("b", json!(2)).with("c", "three"));

        assert_eq!(record.len(), 3);
        assert_eq!(record.text("a"), Some("one"));
        assert_eq!(record.data("b"), Some(&json!(2)));
        assert_eq!(record.text("c"), Some("three"));
    }

    #[test]
    fn typed_accessors_treat_mismatch_as_absent() {
        let record = WorkRecord::new().with("a", json!("not text"));
        assert_eq!(record.text("a"), None);
        assert_eq!(record.collection("a"), None);
        assert_eq!(record.text("missing"), None);
    }

    #[test]
    fn serializes_as_plain_map() {
        let mut kb = BTreeMap::new();
        kb.insert("a.md".to_string(), "body".to_string());
        let record = WorkRecord::new()
            .with("x", json!(1))
            .with("kb", kb)
            .with("t", "text");
        let value = serde_json::to_value(&record).expect("serialize record");
        assert_eq!(value, json!({"kb": {"a.md": "body"}, "t": "text", "x": 1}));
    }
}
