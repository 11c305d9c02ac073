//! Rule enforcement applied to prose artifacts before publish.
//!
//! Style, attribution, and compliance all walk the same set of governed
//! artifacts: the single-text document keys plus every KB article.
use crate::record::{keys, WorkRecord};
use anyhow::Result;
use std::collections::BTreeMap;

pub mod attribution;
pub mod compliance;
pub mod frontmatter;
pub mod style;

/// Logical-name prefix for entries of the KB article collection.
pub const KB_PREFIX: &str = "kb:";

/// Single-text record keys and the logical names policies refer to.
pub const TEXT_ARTIFACTS: [(&str, &str); 5] = [
    (keys::API_REFERENCE_MD, "api-reference"),
    (keys::USER_GUIDE_MD, "user-guide"),
    (keys::RELEASE_NOTES_MD, "release-notes"),
    (keys::COMMS_ANNOUNCE_MD, "comms-announcement"),
    (keys::COMMS_EXEC_BRIEF_MD, "comms-exec-brief"),
];

/// Record keys a governance stage may rewrite.
pub const GOVERNED_KEYS: [&str; 6] = [
    keys::API_REFERENCE_MD,
    keys::USER_GUIDE_MD,
    keys::RELEASE_NOTES_MD,
    keys::COMMS_ANNOUNCE_MD,
    keys::COMMS_EXEC_BRIEF_MD,
    keys::KB_FILES,
];

/// One governed document, borrowed from the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernedArtifact<'a> {
    pub name: String,
    pub text: &'a str,
}

/// Every governed artifact present in `record`, text keys first.
pub fn governed_artifacts(record: &WorkRecord) -> Vec<GovernedArtifact<'_>> {
    let mut artifacts: Vec<GovernedArtifact<'_>> = TEXT_ARTIFACTS
        .iter()
        .filter_map(|(key, name)| {
            record.text(key).map(|text| GovernedArtifact {
                name: (*name).to_string(),
                text,
            })
        })
        .collect();
    if let Some(kb) = record.collection(keys::KB_FILES) {
        artifacts.extend(kb.iter().map(|(file, text)| GovernedArtifact {
            name: format!("{KB_PREFIX}{file}"),
            text,
        }));
    }
    artifacts
}

/// Apply `rewrite(name, text)` to every governed artifact.
///
/// The returned record holds only the keys whose content changed; a changed
/// KB article returns the whole collection with its edits applied.
pub fn rewrite_governed<F>(record: &WorkRecord, mut rewrite: F) -> Result<WorkRecord>
where
    F: FnMut(&str, &str) -> Result<String>,
{
    let mut update = WorkRecord::new();
    for (key, name) in TEXT_ARTIFACTS {
        let Some(text) = record.text(key) else {
            continue;
        };
        let rewritten = rewrite(name, text)?;
        if rewritten != text {
            tracing::debug!(artifact = name, "artifact rewritten");
            update.insert(key, rewritten);
        }
    }

    if let Some(kb) = record.collection(keys::KB_FILES) {
        let mut edited: BTreeMap<String, String> = kb.clone();
        let mut changed = false;
        for (file, text) in kb {
            let name = format!("{KB_PREFIX}{file}");
            let rewritten = rewrite(&name, text)?;
            if &rewritten != text {
                tracing::debug!(artifact = %name, "artifact rewritten");
                edited.insert(file.clone(), rewritten);
                changed = true;
            }
        }
        if changed {
            update.insert(keys::KB_FILES, edited);
        }
    }
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> WorkRecord {
        let mut kb = BTreeMap::new();
        kb.insert("a.md".to_string(), "alpha".to_string());
        kb.insert("b.md".to_string(), "beta".to_string());
        WorkRecord::new()
            .with(keys::API_REFERENCE_MD, "api")
            .with(keys::RELEASE_NOTES_MD, "notes")
            .with(keys::TOOLTIPS_JSON, "{}")
            .with(keys::USER_GUIDE_MD, json!({"not": "text"}))
            .with(keys::KB_FILES, kb)
    }

    #[test]
    fn collects_text_keys_and_kb_entries() {
        let record = record();
        let names: Vec<String> = governed_artifacts(&record)
            .into_iter()
            .map(|artifact| artifact.name)
            .collect();
        assert_eq!(names, vec!["api-reference", "release-notes", "kb:a.md", "kb:b.md"]);
    }

    #[test]
    fn rewrite_returns_only_changed_keys() {
        let record = record();
        let update = rewrite_governed(&record, |name, text| {
            Ok(if name == "release-notes" || name == "kb:b.md" {
                text.to_uppercase()
            } else {
                text.to_string()
            })
        })
        .expect("rewrite");

        assert_eq!(update.keys().collect::<Vec<_>>(), vec!["kb_files", "release_notes_md"]);
        assert_eq!(update.text(keys::RELEASE_NOTES_MD), Some("NOTES"));
        let kb = update.collection(keys::KB_FILES).expect("kb collection");
        assert_eq!(kb["a.md"], "alpha");
        assert_eq!(kb["b.md"], "BETA");
    }

    #[test]
    fn rewrite_of_empty_record_is_empty() {
        let update = rewrite_governed(&WorkRecord::new(), |_, text| Ok(text.to_string()))
            .expect("rewrite");
        assert!(update.is_empty());
    }
}
