//! Leading `---` metadata block of a governed artifact.
use serde_yaml::Value;
use std::collections::BTreeMap;

const MARKER: &str = "---";

/// Split `doc` into its metadata block (delimiters included) and body.
///
/// The block must open on the first line and close on a later line that is
/// exactly the marker; otherwise the whole document is body.
pub fn split(doc: &str) -> (Option<&str>, &str) {
    let Some(first_end) = doc.find('\n') else {
        return (None, doc);
    };
    if doc[..first_end].trim_end_matches('\r') != MARKER {
        return (None, doc);
    }
    let mut offset = first_end + 1;
    while offset < doc.len() {
        let line_end = doc[offset..]
            .find('\n')
            .map(|index| offset + index + 1)
            .unwrap_or(doc.len());
        let line = doc[offset..line_end].trim_end_matches(['\n', '\r']);
        if line == MARKER {
            return (Some(&doc[..line_end]), &doc[line_end..]);
        }
        offset = line_end;
    }
    (None, doc)
}

/// Governance-relevant fields of the metadata block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub tags: Vec<String>,
    pub risk_band: Option<String>,
    /// Approver name to whether the approval counts as granted.
    pub approvals: BTreeMap<String, bool>,
}

impl Metadata {
    /// Approvers recorded as granted.
    pub fn granted(&self) -> impl Iterator<Item = &str> {
        self.approvals
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(name, _)| name.as_str())
    }

    /// Read each field on its own so one mistyped field never hides the rest.
    fn from_yaml(root: &Value) -> Self {
        let tags = match root.get("tags") {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar).collect(),
            Some(other) => scalar(other).into_iter().collect(),
            None => Vec::new(),
        };
        let risk_band = root
            .get("risk_band")
            .or_else(|| root.get("riskBand"))
            .and_then(scalar);
        let approvals = match root.get("approvals") {
            Some(Value::Mapping(entries)) => entries
                .iter()
                .filter_map(|(name, granted)| Some((scalar(name)?, truthy(granted))))
                .collect(),
            _ => BTreeMap::new(),
        };
        Self {
            tags,
            risk_band,
            approvals,
        }
    }
}

/// Parse the metadata block of `doc`; absent or malformed metadata is empty.
pub fn metadata(doc: &str) -> Metadata {
    let (Some(block), _) = split(doc) else {
        return Metadata::default();
    };
    let inner: Vec<&str> = block.lines().collect();
    if inner.len() < 2 {
        return Metadata::default();
    }
    let yaml = inner[1..inner.len() - 1].join("\n");
    if yaml.trim().is_empty() {
        return Metadata::default();
    }
    match serde_yaml::from_str::<Value>(&yaml) {
        Ok(root) => Metadata::from_yaml(&root),
        Err(err) => {
            tracing::debug!(error = %err, "unparseable metadata block treated as empty");
            Metadata::default()
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

// `yes`, `1` and non-empty structures grant; `false`, `0`, `""`, null deny.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Sequence(items) => !items.is_empty(),
        Value::Mapping(entries) => !entries.is_empty(),
        Value::Tagged(tagged) => truthy(&tagged.value),
    }
}
