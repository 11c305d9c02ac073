//! Internal comms: announcement, exec brief, and channel variants derived
//! from the release notes.
use super::{bullets, StageContext};
use crate::record::{keys, WorkRecord};
use crate::stage::Stage;
use anyhow::Result;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

const RELEASE_NOTES_SOURCE: &str = "docs/samples/release-notes/latest.md";
const FALLBACK_HIGHLIGHT: &str = "Backup list and restore APIs simplify tenant management.";
const SLACK_PATH: &str = "docs/samples/internal-comms/announcement-slack.txt";
const EMAIL_PATH: &str = "docs/samples/internal-comms/announcement-email.txt";

const LINKS: [&str; 3] = [
    "API reference: docs/samples/api-reference/reference.md",
    "User guide: docs/samples/user-guide/tenant-admin.md",
    "Release notes: docs/samples/release-notes/latest.md",
];
const ACTIONS: [&str; 3] = [
    "Support: point customers to the updated KB articles for restore and policy conflicts.",
    "Sales and CS: reference the new APIs in automation pitches.",
    "PM and Eng: monitor restore success rate and conflict deflection.",
];

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s+(.*)$").expect("regex for bullets"));
static INLINE_CALLOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+-\s+\*\*(?:Impact|Actions?|Workaround|Notes?)\*\*:\s*.*$")
        .expect("regex for inline callouts")
});
static HEADER_BLEED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*##\s.*$").expect("regex for header bleed"));
static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\*?\*?(?:Impact|Actions?|Workaround|Notes?)\*?\*?:\s*")
        .expect("regex for label bullets")
});
static IMPACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s{0,6}-\s+(?:\*\*)?Impact:(?:\*\*)?\s*(.+)$").expect("regex for impact lines")
});
static FIRST_SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?[.!?])(?:\s|$)").expect("regex for first sentence"));

/// Lines under `## <heading>` up to the next level-two heading.
pub fn extract_section<'a>(md: &'a str, heading: &str) -> Vec<&'a str> {
    let is_h2 = |line: &str| {
        let trimmed = line.trim_start();
        trimmed.starts_with("##") && trimmed[2..].starts_with(char::is_whitespace)
    };
    let mut lines = md.lines();
    let found = lines.by_ref().any(|line| {
        is_h2(line) && line.trim_start()[2..].trim().eq_ignore_ascii_case(heading)
    });
    if !found {
        return Vec::new();
    }
    lines.take_while(|line| !is_h2(line)).collect()
}

fn is_code_bullet(text: &str) -> bool {
    text.trim().starts_with('`')
}

fn sanitize(text: &str) -> String {
    let text = INLINE_CALLOUT.replace(text, "");
    let text = HEADER_BLEED.replace(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_sentence(text: &str) -> String {
    FIRST_SENTENCE
        .captures(text)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| text.trim().to_string())
}

fn section_bullets(section: &[&str]) -> Vec<String> {
    section
        .iter()
        .filter_map(|line| BULLET.captures(line))
        .map(|caps| caps[1].to_string())
        .filter(|item| !is_code_bullet(item))
        .map(|item| sanitize(&item))
        .filter(|item| !item.is_empty())
        .collect()
}

fn first_real_bullet(md: &str, heading: &str) -> Option<String> {
    section_bullets(&extract_section(md, heading))
        .into_iter()
        .find(|item| !LABEL.is_match(item))
        .map(|item| first_sentence(&item))
}

fn push_unique(items: &mut Vec<String>, item: String) {
    let key = item.to_lowercase();
    if !item.is_empty() && !items.iter().any(|existing| existing.to_lowercase() == key) {
        items.push(item);
    }
}

/// Up to four headline items: highlights, then the lead enhancement and fix.
pub fn derive_highlights(release_notes: &str) -> Vec<String> {
    let mut combined = Vec::new();
    let highlights = section_bullets(&extract_section(release_notes, "Highlights"));
    for item in highlights.into_iter().take(6) {
        push_unique(&mut combined, item);
    }
    for heading in ["Enhancements", "Fixes"] {
        if let Some(item) = first_real_bullet(release_notes, heading) {
            push_unique(&mut combined, item);
        }
    }
    if !combined.is_empty() {
        combined.truncate(4);
        return combined;
    }
    for heading in ["Known issues", "Issues"] {
        if let Some(first) = section_bullets(&extract_section(release_notes, heading)).first() {
            return vec![first_sentence(first)];
        }
    }
    vec![FALLBACK_HIGHLIGHT.to_string()]
}

/// Up to four `Impact:` statements, else the first two highlights.
pub fn derive_impact(release_notes: &str) -> Vec<String> {
    let mut impact = Vec::new();
    for heading in ["Enhancements", "Fixes", "Known issues", "Issues"] {
        for line in extract_section(release_notes, heading) {
            if let Some(caps) = IMPACT.captures(line) {
                push_unique(&mut impact, first_sentence(caps[1].trim_matches(['*', ' '])));
            }
        }
    }
    if !impact.is_empty() {
        impact.truncate(4);
        return impact;
    }
    derive_highlights(release_notes)
        .iter()
        .take(2)
        .map(|item| first_sentence(item))
        .collect()
}

fn metadata(title: &str, tags: &str, today: &str) -> String {
    format!(
        "---\ntitle: {title}\nowner: comms\nstatus: draft\ntags: [{tags}]\nlast_reviewed: {today}\n---\n"
    )
}

fn announcement(today: &str, highlights: &[String], impact: &[String]) -> String {
    let mut out = metadata(
        &format!("Internal Announcement {today}"),
        "internal-comms, announcement",
        today,
    );
    out.push_str("## Audience\n- Product, Engineering, Support, Sales, CS\n\n");
    out.push_str(&format!("## Summary\n{}\n\n", bullets(highlights)));
    out.push_str(&format!("## Impact\n{}\n\n", bullets(impact)));
    out.push_str(&format!("## Actions\n{}\n\n", bullets(&ACTIONS)));
    out.push_str(&format!("## Links\n{}\n\n", bullets(&LINKS)));
    out.push_str(&format!("Source: {RELEASE_NOTES_SOURCE}\n"));
    out
}

fn exec_brief(today: &str, highlights: &[String], impact: &[String]) -> String {
    let mut out = metadata(&format!("Executive Brief {today}"), "internal-comms, exec", today);
    out.push_str(&format!("## What shipped\n{}\n\n", bullets(highlights)));
    out.push_str(&format!("## Why it matters\n{}\n\n", bullets(impact)));
    out.push_str(
        "## Risks and mitigations\n\
         - Low risk of performance regressions, mitigated by staged rollout and monitoring.\n\n\
         ## Metrics to watch\n\
         - Restore success rate (RTO proxy)\n\
         - Time to first policy after onboarding\n\
         - KB deflection on policy conflicts\n\n",
    );
    out.push_str(&format!("## References\n{}\n\n", bullets(&LINKS)));
    out.push_str(&format!("Source: {RELEASE_NOTES_SOURCE}\n"));
    out
}

fn slack_text(today: &str, highlights: &[String]) -> String {
    let mut lines = vec![format!("*Release update {today}*"), "*TL;DR:*".to_string()];
    lines.extend(highlights.iter().take(4).map(|item| format!("• {item}")));
    lines.push(String::new());
    lines.push("Links:".to_string());
    lines.extend(LINKS.iter().map(|link| format!("- {link}")));
    lines.join("\n") + "\n"
}

fn email_text(today: &str, highlights: &[String], impact: &[String]) -> String {
    let mut lines = vec![
        format!("Subject: Release update {today}"),
        String::new(),
        "TL;DR:".to_string(),
    ];
    lines.extend(highlights.iter().take(5).map(|item| format!("- {item}")));
    lines.extend([String::new(), "Impact:".to_string()]);
    lines.extend(impact.iter().take(4).map(|item| format!("- {item}")));
    lines.extend([String::new(), "Links:".to_string()]);
    lines.extend(LINKS.iter().map(|link| format!("- {link}")));
    lines.extend([String::new(), format!("Source: {RELEASE_NOTES_SOURCE}")]);
    lines.join("\n") + "\n"
}

pub struct WriterCommsStage {
    today: String,
}

impl WriterCommsStage {
    pub fn new(ctx: &StageContext) -> Self {
        Self {
            today: ctx.today_iso(),
        }
    }
}

impl Stage for WriterCommsStage {
    fn name(&self) -> &'static str {
        super::WRITER_COMMS
    }

    fn writes(&self) -> &'static [&'static str] {
        &[
            keys::COMMS_ANNOUNCE_MD,
            keys::COMMS_EXEC_BRIEF_MD,
            keys::EXTRA_ARTIFACTS,
        ]
    }

    fn run(&self, record: &WorkRecord) -> Result<WorkRecord> {
        let release_notes = record.text(keys::RELEASE_NOTES_MD).unwrap_or_default();
        let highlights = derive_highlights(release_notes);
        let impact = derive_impact(release_notes);
        tracing::debug!(
            highlights = highlights.len(),
            impact = impact.len(),
            "comms extraction"
        );

        let mut extras = BTreeMap::new();
        extras.insert(SLACK_PATH.to_string(), slack_text(&self.today, &highlights));
        extras.insert(
            EMAIL_PATH.to_string(),
            email_text(&self.today, &highlights, &impact),
        );

        tracing::info!("internal comms drafts created");
        Ok(WorkRecord::new()
            .with(
                keys::COMMS_ANNOUNCE_MD,
                announcement(&self.today, &highlights, &impact),
            )
            .with(
                keys::COMMS_EXEC_BRIEF_MD,
                exec_brief(&self.today, &highlights, &impact),
            )
            .with(keys::EXTRA_ARTIFACTS, extras))
    }
}
