//! Source attribution marker detection and insertion.

const MARKER: &str = "source:";

/// True when any line starts with a `Source:` marker followed by whitespace.
pub fn has_attribution(text: &str) -> bool {
    text.lines().any(is_marker_line)
}

fn is_marker_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    let Some(head) = trimmed.get(..MARKER.len()) else {
        return false;
    };
    if !head.eq_ignore_ascii_case(MARKER) {
        return false;
    }
    trimmed[MARKER.len()..]
        .chars()
        .next()
        .is_some_and(char::is_whitespace)
}

/// Append a `Source:` line unless one is present.
pub fn ensure_attribution(text: &str, source: &str) -> String {
    if has_attribution(text) {
        return text.to_string();
    }
    let mut out = text.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str("Source: ");
    out.push_str(source);
    out.push('\n');
    out
}
