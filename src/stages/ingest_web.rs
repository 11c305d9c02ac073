//! Optional web ingestion: fetch listed pages and keep clean text plus a summary.
use super::StageContext;
use crate::paths::ProjectPaths;
use crate::record::{keys, WorkRecord};
use crate::stage::Stage;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::rc::Rc;
use std::sync::LazyLock;
use std::time::Duration;

const USER_AGENT: &str = "docflow/0.1 (+https://localhost)";
const MAX_BYTES: u64 = 2_000_000;
const TIMEOUT: Duration = Duration::from_secs(20);
const MAX_TEXT_CHARS: usize = 200_000;
const SUMMARY_SENTENCES: usize = 5;
const SUMMARY_MIN_WORDS: usize = 7;

static HIDDEN_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<noscript\b.*?</noscript\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("regex for hidden html blocks")
});
static TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("regex for html title")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("regex for html tags"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("regex for whitespace"));

/// Source of page bodies by URL.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP fetcher with a global timeout and body size cap.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .build()
            .into();
        Self { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .call()
            .with_context(|| format!("GET {url}"))?;
        response
            .body_mut()
            .with_config()
            .limit(MAX_BYTES)
            .read_to_string()
            .with_context(|| format!("read body of {url}"))
    }
}

/// One ingested page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDoc {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub text: String,
    pub notes: String,
}

impl WebDoc {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}

/// Title and visible text of an HTML page.
pub fn extract(html: &str) -> (String, String) {
    let visible = HIDDEN_BLOCKS.replace_all(html, " ");
    let title = TITLE
        .captures(&visible)
        .map(|caps| collapse(&decode_entities(&TAG.replace_all(&caps[1], " "))))
        .unwrap_or_default();
    let body = TITLE.replace_all(&visible, " ");
    let text = collapse(&decode_entities(&TAG.replace_all(&body, " ")));
    (title, text)
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// First sentences long enough to carry meaning.
pub fn summarize(text: &str) -> String {
    let mut picked = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (index, ch) in text.char_indices() {
        let ends = matches!(ch, '.' | '!' | '?')
            && bytes
                .get(index + 1)
                .is_none_or(|next| next.is_ascii_whitespace());
        if !ends {
            continue;
        }
        let sentence = text[start..=index].trim();
        start = index + 1;
        if sentence.split_whitespace().count() >= SUMMARY_MIN_WORDS {
            picked.push(sentence);
            if picked.len() >= SUMMARY_SENTENCES {
                break;
            }
        }
    }
    if picked.len() < SUMMARY_SENTENCES {
        let tail = text[start..].trim();
        if tail.split_whitespace().count() >= SUMMARY_MIN_WORDS {
            picked.push(tail);
        }
    }
    picked.join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

pub struct IngestWebStage {
    paths: ProjectPaths,
    fetcher: Rc<dyn Fetch>,
}

impl IngestWebStage {
    pub fn new(ctx: &StageContext) -> Self {
        Self {
            paths: ctx.paths.clone(),
            fetcher: ctx.fetcher.clone(),
        }
    }

    fn urls(&self) -> Result<Vec<String>> {
        let path = self.paths.web_urls_path();
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect())
    }
}

impl Stage for IngestWebStage {
    fn name(&self) -> &'static str {
        super::INGEST_WEB
    }

    fn writes(&self) -> &'static [&'static str] {
        &[keys::WEB_DOCS]
    }

    fn run(&self, _record: &WorkRecord) -> Result<WorkRecord> {
        let urls = self.urls()?;
        if urls.is_empty() {
            tracing::info!("no URLs to ingest");
            return Ok(WorkRecord::new().with(keys::WEB_DOCS, serde_json::json!([])));
        }
        let prompts_path = self.paths.web_prompts_path();
        let notes = if prompts_path.is_file() {
            fs::read_to_string(&prompts_path)
                .with_context(|| format!("read {}", prompts_path.display()))?
        } else {
            String::new()
        };

        let mut docs = Vec::new();
        for url in urls {
            match self.fetcher.fetch(&url) {
                Ok(html) => {
                    tracing::info!(%url, "ingested");
                    let (title, text) = extract(&html);
                    docs.push(WebDoc {
                        summary: summarize(&text),
                        title: if title.is_empty() { url.clone() } else { title },
                        text: truncate_chars(&text, MAX_TEXT_CHARS),
                        notes: notes.clone(),
                        url,
                    });
                }
                Err(err) => tracing::warn!(%url, error = %format!("{err:#}"), "ingest failed; skipped"),
            }
        }
        Ok(WorkRecord::new().with(
            keys::WEB_DOCS,
            serde_json::to_value(&docs).context("serialize web docs")?,
        ))
    }
}
