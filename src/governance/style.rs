//! Markdown-aware house-style normalizer.
//!
//! The metadata block and fenced spans pass through byte-for-byte. Prose
//! lines go through a fixed rule pipeline (voice, tense, forbidden terms,
//! sentence length) that repeats until the line stops changing; list and table
//! lines only get forbidden-term scrubbing. Normalizing twice changes nothing.
use super::frontmatter;
use crate::policy::StylePolicy;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Upper bound on fixpoint iterations of a single rule.
const MAX_PASSES: usize = 8;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( {0,3}#{1,6})[ \t]+(.*)$").expect("regex for headings"));
static STRUCTURAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*+][ \t]|\d+[.)][ \t]|\||<|(?:-{3,}|\*{3,}|_{3,})\s*$)")
        .expect("regex for list and table lines")
});
static PROSE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*(?:>[ \t]?)*").expect("regex for prose prefix"));
static LOCKED_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"``[^`]+``|`[^`]+`|!?\[[^\]\n]*\]\([^)\n]*\)|<https?://[^>\s]+>|https?://[^\s)]+",
    )
    .expect("regex for inline code and links")
});
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{E000}([\u{E010}-\u{E019}]+)\u{E001}").expect("regex for placeholders")
});
static ACRONYM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,4}s?$").expect("regex for acronyms"));
static PASSIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<subj>.+?)\s+(?P<aux>is|are|was|were)\s+(?P<verb>[A-Za-z]+ed)\s+by\s+(?P<agent>[^,;.!?]+)(?P<rest>.*)$",
    )
    .expect("regex for passive voice")
});
static FUTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<w>[Ww])ill\s+(?P<verb>[A-Za-z]+)\b").expect("regex for future tense")
});
static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("regex for repeated spaces"));
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([,.;:!?])").expect("regex for space before punctuation"));

/// Compiled form of a [`StylePolicy`].
pub struct StyleRules {
    active_voice: bool,
    present_tense: bool,
    forbidden: Vec<Regex>,
    sentence_max: usize,
}

impl StyleRules {
    pub fn new(policy: &StylePolicy) -> Self {
        Self {
            active_voice: policy.active_voice,
            present_tense: policy.present_tense(),
            forbidden: forbidden_patterns(&policy.forbidden),
            sentence_max: policy.sentence_max,
        }
    }
}

/// Normalize `doc` under `policy`.
pub fn normalize(doc: &str, policy: &StylePolicy) -> String {
    normalize_with(doc, &StyleRules::new(policy))
}

/// Normalize `doc` under precompiled rules.
pub fn normalize_with(doc: &str, rules: &StyleRules) -> String {
    if doc.trim().is_empty() {
        return String::new();
    }
    let (metadata, body) = frontmatter::split(doc);

    let mut lines: Vec<String> = Vec::new();
    for segment in segments(body) {
        match segment {
            Segment::Verbatim(raw) => lines.extend(raw.into_iter().map(str::to_string)),
            Segment::Prose(raw) => {
                for line in raw {
                    let normalized = normalize_line(line, rules);
                    if normalized.is_empty() && lines.last().is_some_and(|prev| prev.is_empty()) {
                        continue;
                    }
                    lines.push(normalized);
                }
            }
        }
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    let mut out = metadata.unwrap_or_default().to_string();
    if lines.is_empty() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        return out;
    }
    out.push_str(&lines.join("\n"));
    out.push('\n');
    out
}

enum Segment<'a> {
    Prose(Vec<&'a str>),
    Verbatim(Vec<&'a str>),
}

/// Split `body` into alternating prose and fenced spans (fences included).
fn segments(body: &str) -> Vec<Segment<'_>> {
    let body = body.strip_suffix('\n').unwrap_or(body);
    let mut out = Vec::new();
    let mut prose: Vec<&str> = Vec::new();
    let mut fence: Option<(&str, Vec<&str>)> = None;

    for line in body.split('\n') {
        if let Some((marker, mut span)) = fence.take() {
            span.push(line);
            if line.trim_start().starts_with(marker) {
                out.push(Segment::Verbatim(span));
            } else {
                fence = Some((marker, span));
            }
            continue;
        }
        match fence_marker(line) {
            Some(marker) => {
                if !prose.is_empty() {
                    out.push(Segment::Prose(std::mem::take(&mut prose)));
                }
                fence = Some((marker, vec![line]));
            }
            None => prose.push(line),
        }
    }
    if let Some((_, span)) = fence {
        out.push(Segment::Verbatim(span));
    }
    if !prose.is_empty() {
        out.push(Segment::Prose(prose));
    }
    out
}

fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    ["```", "~~~"]
        .into_iter()
        .find(|marker| trimmed.starts_with(marker))
}

fn normalize_line(line: &str, rules: &StyleRules) -> String {
    let line = line.trim_end();
    if line.is_empty() {
        return String::new();
    }
    if let Some(caps) = HEADING.captures(line) {
        let (title, spans) = lock_spans(&caps[2]);
        return format!("{} {}", &caps[1], unlock_spans(&sentence_case(&title), &spans))
            .trim_end()
            .to_string();
    }
    if STRUCTURAL.is_match(line) {
        let (locked, spans) = lock_spans(line);
        return unlock_spans(&scrub_forbidden(&locked, &rules.forbidden), &spans);
    }
    if line.starts_with("    ") || line.starts_with('\t') {
        return line.to_string();
    }

    let prefix_len = PROSE_PREFIX.find(line).map(|m| m.end()).unwrap_or(0);
    let (prefix, content) = line.split_at(prefix_len);
    let (mut text, spans) = lock_spans(content);
    for _ in 0..MAX_PASSES {
        let next = rewrite_prose(&text, rules);
        if next == text {
            break;
        }
        text = next;
    }
    format!("{prefix}{}", unlock_spans(&text, &spans))
        .trim_end()
        .to_string()
}

// One pass of the prose rules; a scrub can expose a passive or `will` form.
fn rewrite_prose(text: &str, rules: &StyleRules) -> String {
    let mut text = text.to_string();
    if rules.active_voice {
        text = passive_to_active(&text);
    }
    if rules.present_tense {
        text = future_to_present(&text);
    }
    text = scrub_sentences(&text, &rules.forbidden);
    if rules.sentence_max > 0 {
        text = split_long_sentences(&text, rules.sentence_max);
    }
    text
}

/// Replace inline code and links with opaque placeholders.
///
/// Placeholders contain no word characters or whitespace, so no prose rule
/// can match inside them.
pub fn lock_spans(text: &str) -> (String, Vec<String>) {
    let mut spans = Vec::new();
    let locked = LOCKED_SPAN
        .replace_all(text, |caps: &Captures| {
            spans.push(caps[0].to_string());
            placeholder(spans.len() - 1)
        })
        .into_owned();
    (locked, spans)
}

/// Restore spans removed by [`lock_spans`].
pub fn unlock_spans(text: &str, spans: &[String]) -> String {
    if spans.is_empty() {
        return text.to_string();
    }
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let index: usize = caps[1]
                .chars()
                .map(|ch| (ch as u32 - 0xE010) as usize)
                .fold(0, |acc, digit| acc * 10 + digit);
            spans.get(index).cloned().unwrap_or_default()
        })
        .into_owned()
}

fn placeholder(index: usize) -> String {
    let digits: String = index
        .to_string()
        .chars()
        .filter_map(|digit| digit.to_digit(10))
        .filter_map(|digit| char::from_u32(0xE010 + digit))
        .collect();
    format!("\u{E000}{digits}\u{E001}")
}

/// Sentence-case a heading title, keeping acronyms such as `API` or `IDs`.
pub fn sentence_case(title: &str) -> String {
    let mut words = Vec::new();
    for (index, token) in title.split_whitespace().enumerate() {
        let core = token.trim_matches(|ch: char| !ch.is_alphanumeric());
        if ACRONYM.is_match(core) {
            words.push(token.to_string());
            continue;
        }
        let lower = token.to_lowercase();
        if index == 0 {
            words.push(capitalize_first(&lower));
        } else {
            words.push(lower);
        }
    }
    words.join(" ")
}

/// Rewrite `X is|are|was|were <verb>ed by Y` into `Y <verb> X`, per sentence.
pub fn passive_to_active(text: &str) -> String {
    map_sentences(text, |sentence| {
        let mut current = sentence.to_string();
        for _ in 0..MAX_PASSES {
            let Some(caps) = PASSIVE.captures(&current) else {
                break;
            };
            let agent = caps["agent"].trim();
            let subject = caps["subj"].trim();
            if agent.is_empty() || subject.is_empty() || is_adverbial(agent) {
                break;
            }
            let participle = &caps["verb"];
            let verb = match &caps["aux"] {
                "was" | "were" => participle.to_ascii_lowercase(),
                _ => present_form(participle, is_plural(agent)),
            };
            current = format!(
                "{} {} {}{}",
                capitalize_first(agent),
                verb,
                lower_leading_determiner(subject),
                &caps["rest"]
            );
        }
        current
    })
}

// `by default`, `by design`: a manner phrase, not an actor.
fn is_adverbial(agent: &str) -> bool {
    const NON_AGENTS: [&str; 12] = [
        "default", "design", "hand", "mistake", "accident", "chance", "nature", "far", "now",
        "then", "itself", "themselves",
    ];
    let first = agent
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    NON_AGENTS.contains(&first.as_str())
}

/// Rewrite future `will <verb>` as `<verb>`.
pub fn future_to_present(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_PASSES {
        let next = FUTURE
            .replace_all(&current, |caps: &Captures| {
                let verb = &caps["verb"];
                if &caps["w"] == "W" {
                    capitalize_first(verb)
                } else {
                    verb.to_string()
                }
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn forbidden_patterns(terms: &[String]) -> Vec<Regex> {
    let mut patterns = Vec::new();
    for term in terms {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        let edge = |ch: Option<char>| {
            if ch.is_some_and(|ch| ch.is_alphanumeric() || ch == '_') {
                r"\b"
            } else {
                ""
            }
        };
        let pattern = format!(
            "(?i){}{}{}",
            edge(term.chars().next()),
            regex::escape(term),
            edge(term.chars().last())
        );
        match Regex::new(&pattern) {
            Ok(regex) => patterns.push(regex),
            Err(err) => tracing::warn!(term, error = %err, "skipping forbidden term"),
        }
    }
    patterns
}

/// Remove forbidden terms on token boundaries and tidy the spacing left behind.
pub fn scrub_forbidden(text: &str, forbidden: &[Regex]) -> String {
    if forbidden.is_empty() {
        return text.to_string();
    }
    let indent_len = text.len() - text.trim_start().len();
    let (indent, mut body) = (&text[..indent_len], text[indent_len..].to_string());
    for _ in 0..MAX_PASSES {
        let mut removed = false;
        for pattern in forbidden {
            if pattern.is_match(&body) {
                body = pattern.replace_all(&body, "").into_owned();
                removed = true;
            }
        }
        if !removed {
            break;
        }
        body = MULTI_SPACE.replace_all(&body, " ").into_owned();
        body = SPACE_BEFORE_PUNCT.replace_all(&body, "$1").into_owned();
        body = body.trim().to_string();
    }
    format!("{indent}{body}")
}

/// Scrub forbidden terms sentence by sentence, re-capitalizing a sentence
/// whose leading word was removed.
pub fn scrub_sentences(text: &str, forbidden: &[Regex]) -> String {
    if forbidden.is_empty() {
        return text.to_string();
    }
    map_sentences(text, |sentence| {
        let scrubbed = scrub_forbidden(sentence, forbidden);
        if scrubbed != sentence && sentence.starts_with(char::is_uppercase) {
            capitalize_first(&scrubbed)
        } else {
            scrubbed
        }
    })
}

/// Split sentences longer than `max` words at their first clause boundary.
pub fn split_long_sentences(text: &str, max: usize) -> String {
    map_sentences(text, |sentence| split_sentence(sentence, max))
}

fn split_sentence(sentence: &str, max: usize) -> String {
    if sentence.split_whitespace().count() <= max {
        return sentence.to_string();
    }
    let boundary = [", ", "; ", " - ", " – ", " — "]
        .into_iter()
        .filter_map(|sep| sentence.find(sep).map(|pos| (pos, sep)))
        .min_by_key(|(pos, _)| *pos);
    let Some((pos, sep)) = boundary else {
        return sentence.to_string();
    };
    let head = sentence[..pos]
        .trim_end()
        .trim_end_matches([',', ';', ':', '.']);
    let tail = sentence[pos + sep.len()..].trim_start();
    if head.trim().is_empty() || tail.split_whitespace().next().is_none() {
        return sentence.to_string();
    }
    format!("{head}. {}", split_sentence(&capitalize_first(tail), max))
}

/// Apply `f` to each sentence, keeping the separators between them.
fn map_sentences(text: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let Some(&(next_index, next)) = chars.peek() else {
            continue;
        };
        if !next.is_whitespace() {
            continue;
        }
        let mut sep_end = next_index;
        while let Some(&(ws_index, ws)) = chars.peek() {
            if !ws.is_whitespace() {
                break;
            }
            sep_end = ws_index + ws.len_utf8();
            chars.next();
        }
        out.push_str(&f(&text[start..index + ch.len_utf8()]));
        out.push_str(&text[index + ch.len_utf8()..sep_end]);
        start = sep_end;
    }
    if start < text.len() {
        out.push_str(&f(&text[start..]));
    }
    out
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_leading_determiner(subject: &str) -> String {
    const DETERMINERS: [&str; 15] = [
        "The", "A", "An", "This", "That", "These", "Those", "Your", "Our", "Its", "Each",
        "Every", "All", "Some", "Any",
    ];
    let first = subject.split_whitespace().next().unwrap_or_default();
    if DETERMINERS.contains(&first) {
        let mut chars = subject.chars();
        if let Some(head) = chars.next() {
            return head.to_lowercase().chain(chars).collect();
        }
    }
    subject.to_string()
}

fn is_plural(agent: &str) -> bool {
    let last = agent
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if matches!(last.as_str(), "they" | "we" | "you" | "i") {
        return true;
    }
    last.len() > 3 && last.ends_with('s') && !last.ends_with("ss") && !last.ends_with("us")
}

/// Present-tense form of a regular `-ed` participle.
fn present_form(participle: &str, plural: bool) -> String {
    let stem = base_form(&participle.to_ascii_lowercase());
    if plural {
        return stem;
    }
    if stem.ends_with(['s', 'x', 'z', 'o']) || stem.ends_with("ch") || stem.ends_with("sh") {
        return format!("{stem}es");
    }
    if let Some(head) = stem.strip_suffix('y') {
        if head.ends_with(|ch: char| !"aeiou".contains(ch)) {
            return format!("{head}ies");
        }
    }
    format!("{stem}s")
}

// Heuristic lemma recovery for regular verbs; irregular stems are out of reach.
fn base_form(participle: &str) -> String {
    if let Some(head) = participle.strip_suffix("ied") {
        return format!("{head}y");
    }
    let Some(stem) = participle.strip_suffix("ed") else {
        return participle.to_string();
    };
    let bytes = stem.as_bytes();
    let n = bytes.len();
    if n >= 3
        && bytes[n - 1] == bytes[n - 2]
        && !b"aeiouylsfz".contains(&bytes[n - 1])
    {
        return stem[..n - 1].to_string();
    }
    const SILENT_E_ENDINGS: [&str; 21] = [
        "at", "ut", "iz", "ur", "ir", "or", "ar", "id", "od", "ud", "bl", "dl", "gl", "pl",
        "tl", "kl", "ul", "us", "as", "os", "rs",
    ];
    const KEEP_BARE: [&str; 3] = ["ear", "oor", "oot"];
    let needs_e = stem.ends_with(['v', 'z', 'c', 'g'])
        || ["fin", "bin", "min", "lin", "ok", "ot"]
            .iter()
            .any(|ending| stem.ends_with(ending))
        || SILENT_E_ENDINGS.iter().any(|ending| stem.ends_with(ending));
    if needs_e && !KEEP_BARE.iter().any(|ending| stem.ends_with(ending)) && !stem.ends_with("zz") {
        return format!("{stem}e");
    }
    stem.to_string()
}

#[cfg(test)]
#[path = "style_tests.rs"]
mod tests;
