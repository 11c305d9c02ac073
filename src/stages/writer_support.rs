//! Support writer: troubleshooting KB articles from support signals.
//!
//! Feedback rows, incident and note files, error log lines, and the brief are
//! turned into signals, grouped by inferred topic, and rendered one article
//! per topic. Ingested web pages become draft articles of their own.
use super::ingest_web::WebDoc;
use super::intake::Sources;
use super::{bullets, StageContext};
use crate::paths::ProjectPaths;
use crate::record::{keys, WorkRecord};
use crate::stage::Stage;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const FEEDBACK_SOURCE: &str = "intake/support/feedback.csv";
const MAX_BULLETS: usize = 8;
const MAX_LOG_LINES: usize = 20;

/// Topic keywords, checked in order; the first topic with a hit wins.
const TOPIC_KEYWORDS: [(&str, &str); 3] = [
    ("restore", r"(?i)\brestore\b|\balternate path\b|\btargetPath\b|\b500\b"),
    ("policy", r"(?i)\bpolicy\b|\bretention\b|\bschedule\b|\bconflict\b"),
    ("backup", r"(?i)\bbackup\b|\bRPO\b|\bthroughput\b"),
];

const ERROR_PATTERNS: [&str; 5] = [
    r"\b(?:4\d{2}|5\d{2})\b",
    r"(?i)\bpermission denied\b",
    r"(?i)\bnot writable\b",
    r"(?i)\bpath (?:does not exist|missing)\b",
    r"(?i)\btimeout\b",
];

const CAUSE_HINTS: [(&str, &str); 5] = [
    (r"(?i)\bpermissions?\b", "Insufficient permissions on destination."),
    (r"(?i)\bnot writable\b", "Destination path is not writable."),
    (r"(?i)\bmissing path\b", "Destination path does not exist."),
    (r"(?i)\bconflict\b", "Policy conflict during schedule or path override."),
    (r"(?i)\bendpoint protection\b|\bantivirus\b", "Endpoint protection or antivirus blocked writes."),
];

const RESOLUTION_HINTS: [(&str, &str); 5] = [
    (r"(?i)\bcreate\b|\bmkdir\b", "Create the destination path before restore."),
    (
        r"(?i)\bgrant\b|\bchmod\b|\bchown\b|\badmin\b",
        "Run restore with admin rights or grant write permissions.",
    ),
    (
        r"(?i)\bdisable\b.*(?:\bav\b|antivirus|endpoint)",
        "Temporarily disable endpoint protection and retry.",
    ),
    (r"(?i)\bretry\b|\bre-run\b", "Re-run the job after applying fixes."),
    (r"(?i)\bverify\b", "Verify success with file presence and integrity checks."),
];

fn compile(patterns: &[(&'static str, &'static str)]) -> Vec<(Regex, &'static str)> {
    patterns
        .iter()
        .map(|(pattern, label)| (Regex::new(pattern).expect("regex for support heuristics"), *label))
        .collect()
}

static TOPICS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    TOPIC_KEYWORDS
        .iter()
        .map(|(topic, pattern)| (Regex::new(pattern).expect("regex for topics"), *topic))
        .collect()
});
static ERRORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ERROR_PATTERNS
        .iter()
        .map(|pattern| Regex::new(pattern).expect("regex for error lines"))
        .collect()
});
static CAUSES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| compile(&CAUSE_HINTS));
static RESOLUTIONS: LazyLock<Vec<(Regex, &'static str)>> =
    LazyLock::new(|| compile(&RESOLUTION_HINTS));

/// One piece of support evidence attributed to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub topic: String,
    pub text: String,
    pub source: String,
}

/// Everything known about one topic, ready to render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicBundle {
    pub symptoms: Vec<String>,
    pub causes: Vec<String>,
    pub resolutions: Vec<String>,
    pub verifications: Vec<String>,
    pub preventions: Vec<String>,
    pub sources: BTreeSet<String>,
}

pub fn infer_topic(text: &str) -> Option<&'static str> {
    TOPICS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, topic)| *topic)
}

fn looks_like_error(line: &str) -> bool {
    !line.trim().is_empty() && ERRORS.iter().any(|pattern| pattern.is_match(line))
}

fn clean_bullet(line: &str) -> String {
    line.trim()
        .trim_start_matches(['-', '*', '•'])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if item.is_empty() || items.len() >= MAX_BULLETS {
        return;
    }
    let key = item.to_lowercase();
    if !items.iter().any(|existing| existing.to_lowercase() == key) {
        items.push(item);
    }
}

pub struct WriterSupportStage {
    paths: ProjectPaths,
    today: String,
}

impl WriterSupportStage {
    pub fn new(ctx: &StageContext) -> Self {
        Self {
            paths: ctx.paths.clone(),
            today: ctx.today_iso(),
        }
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(self.paths.root())
            .unwrap_or(path)
            .display()
            .to_string()
    }

    fn files_in(&self, dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Collect signals from every support source under the project root.
    pub fn collect_signals(&self, sources: &Sources) -> Result<Vec<Signal>> {
        let mut signals = Vec::new();

        for row in &sources.feedback {
            let query = row.query.trim();
            let topic = if row.ticket_tag.is_empty() {
                infer_topic(query).map(str::to_string)
            } else {
                Some(row.ticket_tag.clone())
            };
            if let Some(topic) = topic {
                signals.push(Signal {
                    topic,
                    text: query.to_string(),
                    source: FEEDBACK_SOURCE.to_string(),
                });
            }
        }

        let folders = [
            (self.paths.incidents_dir(), "restore"),
            (self.paths.support_notes_dir(), "policy"),
        ];
        for (dir, default_topic) in folders {
            for path in self.files_in(&dir, "md")? {
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("read {}", path.display()))?;
                signals.push(Signal {
                    topic: infer_topic(&text).unwrap_or(default_topic).to_string(),
                    text,
                    source: self.relative(&path),
                });
            }
        }

        for path in self.files_in(&self.paths.logs_dir(), "txt")? {
            let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            let text = String::from_utf8_lossy(&bytes);
            let lines: Vec<&str> = text
                .lines()
                .filter(|line| looks_like_error(line))
                .map(str::trim)
                .take(MAX_LOG_LINES)
                .collect();
            if lines.is_empty() {
                continue;
            }
            let joined = lines.join("\n");
            signals.push(Signal {
                topic: infer_topic(&joined).unwrap_or("restore").to_string(),
                text: joined,
                source: self.relative(&path),
            });
        }

        if !sources.brief.trim().is_empty() {
            signals.push(Signal {
                topic: infer_topic(&sources.brief).unwrap_or("backup").to_string(),
                text: sources.brief.clone(),
                source: "intake/tech-docs/brief.md".to_string(),
            });
        }
        Ok(signals)
    }
}

/// Group signals by topic and derive each section's bullets.
pub fn bundle_signals(signals: &[Signal]) -> BTreeMap<String, TopicBundle> {
    let mut bundles: BTreeMap<String, TopicBundle> = BTreeMap::new();
    for signal in signals {
        let bundle = bundles.entry(signal.topic.clone()).or_default();
        for line in signal.text.lines() {
            let lower = line.to_lowercase();
            if looks_like_error(line) || lower.contains("fails") || lower.contains("error") {
                push_unique(&mut bundle.symptoms, clean_bullet(line));
            }
        }
        for (pattern, phrase) in CAUSES.iter() {
            if pattern.is_match(&signal.text) {
                push_unique(&mut bundle.causes, (*phrase).to_string());
            }
        }
        for (pattern, phrase) in RESOLUTIONS.iter() {
            if pattern.is_match(&signal.text) {
                push_unique(&mut bundle.resolutions, (*phrase).to_string());
            }
        }
        bundle.sources.insert(signal.source.clone());
    }

    for bundle in bundles.values_mut() {
        let resolved = |needle: &str| {
            bundle
                .resolutions
                .iter()
                .any(|item| item.to_lowercase().contains(needle))
        };
        let mut verifications = Vec::new();
        if resolved("permissions") || resolved("admin") {
            verifications.push("Attempt restore as admin and confirm files are created at the destination.");
        }
        if resolved("create the destination path") {
            verifications.push("Confirm the destination path exists before restore and holds the restored files after the run.");
        }
        if resolved("endpoint protection") {
            verifications.push("Re-enable antivirus and confirm restores continue to succeed.");
        }
        if verifications.is_empty() {
            verifications.push("Confirm files exist at the target path and pass integrity checks.");
        }

        let caused = |needle: &str| {
            bundle
                .causes
                .iter()
                .any(|item| item.to_lowercase().contains(needle))
        };
        let mut preventions = Vec::new();
        if caused("permissions") {
            preventions.push("Grant least-privilege write access on restore destinations.");
        }
        if caused("not writable") || caused("does not exist") {
            preventions.push("Pre-create and validate alternate paths during policy setup.");
        }
        if caused("endpoint protection") {
            preventions.push("Allowlist agent processes and paths in endpoint protection policies.");
        }
        if caused("policy conflict") {
            preventions.push("Avoid overlapping policies and review path overrides after changes.");
        }
        if preventions.is_empty() {
            preventions.push("Schedule periodic test restores to validate readiness.");
        }

        bundle.verifications = verifications.into_iter().map(str::to_string).collect();
        bundle.preventions = preventions.into_iter().map(str::to_string).collect();
    }
    bundles
}

/// KB file name for a topic.
pub fn article_name(topic: &str) -> String {
    match topic {
        "restore" => "restore-errors.md".to_string(),
        "policy" => "policy-conflicts.md".to_string(),
        other => format!("{other}-troubleshooting.md"),
    }
}

fn article_title(topic: &str) -> String {
    match topic {
        "restore" => "Restore: Alternate Path Failures".to_string(),
        "policy" => "Backup Policy: Conflict Resolution".to_string(),
        "backup" => "Backup: Throughput and Scheduling".to_string(),
        other => {
            let mut chars = other.chars();
            let title: String = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            format!("{title}: Troubleshooting")
        }
    }
}

fn section(name: &str, items: &[String]) -> String {
    if items.is_empty() {
        format!("## {name}\n- (none)\n\n")
    } else {
        format!("## {name}\n{}\n\n", bullets(items))
    }
}

pub fn render_article(topic: &str, bundle: &TopicBundle, has_api: bool, today: &str) -> String {
    let mut out = format!(
        "---\ntitle: {}\nowner: support\nstatus: active\ntags: [kb, {topic}]\nlast_reviewed: {today}\n---\n",
        article_title(topic)
    );
    out.push_str(&section("Symptoms", &bundle.symptoms));
    out.push_str(&section("Possible causes", &bundle.causes));
    if bundle.resolutions.is_empty() {
        out.push_str("## Resolution\n- Follow the steps in the user guide.\n\n");
    } else {
        out.push_str(&section("Resolution", &bundle.resolutions));
    }
    out.push_str(&section("Verification", &bundle.verifications));
    out.push_str(&section("Prevention", &bundle.preventions));

    let mut references = Vec::new();
    if has_api {
        references.push("[API reference](../api-reference/reference.md)".to_string());
    }
    references.push("[Tenant admin guide](../user-guide/tenant-admin.md#restore-data)".to_string());
    references.push("[Release notes](../release-notes/latest.md#known-issues)".to_string());
    out.push_str(&section("References", &references));

    let source = if bundle.sources.is_empty() {
        FEEDBACK_SOURCE.to_string()
    } else {
        bundle.sources.iter().cloned().collect::<Vec<_>>().join(", ")
    };
    out.push_str(&format!("Source: {source}\n"));
    out
}

fn placeholder_article(today: &str) -> String {
    format!(
        "---\ntitle: Troubleshooting: Getting Started\nowner: support\nstatus: active\ntags: [kb]\nlast_reviewed: {today}\n---\n\
         ## Symptoms\n- (none)\n\n\
         ## Possible causes\n- (none)\n\n\
         ## Resolution\n- Ensure intake/support/feedback.csv is populated.\n\n\
         ## Verification\n- Run a test restore and confirm the files are present.\n\n\
         ## Prevention\n- Add feedback exports to the intake folder regularly.\n\n\
         ## References\n- [Tenant admin guide](../user-guide/tenant-admin.md)\n\n\
         Source: intake/support\n"
    )
}

/// Lowercase ASCII slug; `kb` when nothing usable remains.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "kb".to_string()
    } else {
        slug.to_string()
    }
}

fn web_article(doc: &WebDoc, today: &str) -> String {
    let notes = if doc.notes.trim().is_empty() {
        "Review carefully before applying in production."
    } else {
        doc.notes.trim()
    };
    format!(
        "---\ntitle: {}\nowner: support\nstatus: draft\ntags: [kb, external]\nlast_reviewed: {today}\n---\n\n\
         ## Summary\n{}\n\n\
         ## Why it matters\nProvides external context relevant to this release.\n\n\
         ## Guidance\n{notes}\n\n\
         Source: {}\n",
        doc.display_title(),
        doc.summary,
        doc.url
    )
}

impl Stage for WriterSupportStage {
    fn name(&self) -> &'static str {
        super::WRITER_SUPPORT
    }

    fn writes(&self) -> &'static [&'static str] {
        &[keys::KB_FILES]
    }

    fn run(&self, record: &WorkRecord) -> Result<WorkRecord> {
        let sources = Sources::from_record(record)?;
        let signals = self.collect_signals(&sources)?;
        let bundles = bundle_signals(&signals);

        let mut kb_files: BTreeMap<String, String> = BTreeMap::new();
        if bundles.is_empty() {
            tracing::info!("no support signals; producing placeholder KB article");
            kb_files.insert("getting-started.md".to_string(), placeholder_article(&self.today));
        } else {
            let has_api = sources.openapi.is_some();
            for (topic, bundle) in &bundles {
                kb_files.insert(
                    article_name(topic),
                    render_article(topic, bundle, has_api, &self.today),
                );
            }
        }

        let web_docs: Vec<WebDoc> = record.data_as(keys::WEB_DOCS)?.unwrap_or_default();
        for doc in &web_docs {
            let name = format!("{}.md", slugify(doc.display_title()));
            kb_files.insert(name, web_article(doc, &self.today));
        }

        tracing::info!(
            signals = signals.len(),
            articles = kb_files.len(),
            "kb articles created"
        );
        Ok(WorkRecord::new().with(keys::KB_FILES, kb_files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::attribution::has_attribution;
    use crate::stages::intake::FeedbackRow;
    use crate::stages::testing::{context, run, write};
    use serde_json::json;

    fn sources_record(sources: Sources) -> WorkRecord {
        WorkRecord::new().with(keys::SOURCES, serde_json::to_value(sources).expect("sources"))
    }

    #[test]
    fn infers_topics_in_priority_order() {
        assert_eq!(infer_topic("Restore to alternate path fails"), Some("restore"));
        assert_eq!(infer_topic("retention policy clash"), Some("policy"));
        assert_eq!(infer_topic("slow backup throughput"), Some("backup"));
        assert_eq!(infer_topic("login page"), None);
    }

    #[test]
    fn bundles_derive_causes_resolutions_and_follow_ups() {
        let signals = vec![Signal {
            topic: "restore".to_string(),
            text: "Restore fails: permission denied on D:\\data\nFix: grant write access, then retry".to_string(),
            source: "intake/support/incidents/a.md".to_string(),
        }];
        let bundles = bundle_signals(&signals);
        let restore = &bundles["restore"];
        assert_eq!(restore.symptoms, vec!["Restore fails: permission denied on D:\\data"]);
        assert_eq!(restore.causes, vec!["Insufficient permissions on destination."]);
        assert_eq!(
            restore.resolutions,
            vec![
                "Run restore with admin rights or grant write permissions.",
                "Re-run the job after applying fixes.",
            ]
        );
        assert_eq!(
            restore.verifications,
            vec!["Attempt restore as admin and confirm files are created at the destination."]
        );
        assert_eq!(
            restore.preventions,
            vec!["Grant least-privilege write access on restore destinations."]
        );
    }

    #[test]
    fn articles_are_written_per_topic_from_all_sources() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write(dir.path(), "intake/support/notes/n1.md", "Retention schedule conflict after edit\n");
        write(
            dir.path(),
            "intake/logs/agent.txt",
            "INFO ok\nERROR 500 restore path missing\nWARN timeout on upload\n",
        );
        let sources = Sources {
            feedback: vec![FeedbackRow {
                query: "Backup throughput is low".to_string(),
                ticket_tag: String::new(),
                frequency: 3,
            }],
            ..Sources::default()
        };
        let update = run(
            &WriterSupportStage::new(&context(dir.path())),
            &sources_record(sources),
        );
        let kb = update.collection(keys::KB_FILES).expect("kb files");
        assert_eq!(
            kb.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["backup-troubleshooting.md", "policy-conflicts.md", "restore-errors.md"]
        );
        let restore = &kb["restore-errors.md"];
        assert!(restore.contains("- ERROR 500 restore path missing\n"));
        assert!(restore.ends_with("Source: intake/logs/agent.txt\n"));
        assert!(kb["policy-conflicts.md"].contains("Policy conflict during schedule or path override."));
        assert!(kb.values().all(|article| has_attribution(article)));
    }

    #[test]
    fn placeholder_when_there_are_no_signals() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let update = run(&WriterSupportStage::new(&context(dir.path())), &WorkRecord::new());
        let kb = update.collection(keys::KB_FILES).expect("kb files");
        assert_eq!(kb.keys().collect::<Vec<_>>(), vec!["getting-started.md"]);
        assert!(kb["getting-started.md"].contains("last_reviewed: 2026-10-19"));
    }

    #[test]
    fn web_documents_become_draft_articles() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let record = WorkRecord::new().with(
            keys::WEB_DOCS,
            json!([{
                "url": "https://example.test/guide",
                "title": "Zero Trust Backups!",
                "summary": "Backups should be immutable.",
                "text": "ignored",
                "notes": ""
            }]),
        );
        let update = run(&WriterSupportStage::new(&context(dir.path())), &record);
        let kb = update.collection(keys::KB_FILES).expect("kb files");
        let article = &kb["zero-trust-backups.md"];
        assert!(article.contains("status: draft\n"));
        assert!(article.contains("## Summary\nBackups should be immutable.\n"));
        assert!(article.ends_with("Source: https://example.test/guide\n"));
    }

    #[test]
    fn slugs_are_ascii_and_never_empty() {
        assert_eq!(slugify("Hello, World: Part 2"), "hello-world-part-2");
        assert_eq!(slugify("***"), "kb");
    }
}
