//! Publisher collaborator: idempotent, atomic persistence of artifacts.
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Persists a mapping of relative path to text.
///
/// Writing content identical to what is stored is a no-op, and partial content
/// is never observable. Returns the paths actually written.
pub trait Publisher {
    fn write(&self, files: &BTreeMap<String, String>) -> Result<Vec<String>>;
}

/// Writes under a project root via temp file + rename.
#[derive(Debug, Clone)]
pub struct FsPublisher {
    root: PathBuf,
}

impl FsPublisher {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, rel_path: &str) -> Result<PathBuf> {
        let rel = Path::new(rel_path);
        if rel_path.is_empty()
            || rel
                .components()
                .any(|part| !matches!(part, Component::Normal(_)))
        {
            return Err(anyhow!("refusing to publish outside the project root: {rel_path}"));
        }
        Ok(self.root.join(rel))
    }
}

impl Publisher for FsPublisher {
    fn write(&self, files: &BTreeMap<String, String>) -> Result<Vec<String>> {
        let mut written = Vec::new();
        for (rel_path, text) in files {
            let dest = self.resolve(rel_path)?;
            if fs::read(&dest).is_ok_and(|existing| existing == text.as_bytes()) {
                tracing::debug!(path = %rel_path, "unchanged; skipped");
                continue;
            }
            publish_file(&dest, text.as_bytes())?;
            tracing::debug!(path = %rel_path, "published");
            written.push(rel_path.clone());
        }
        Ok(written)
    }
}

fn publish_file(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("stage {}", dest.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("stage {}", dest.display()))?;
    tmp.persist(dest)
        .map_err(|err| err.error)
        .with_context(|| format!("publish {}", dest.display()))?;
    Ok(())
}

/// Append a dated run line to the decisions log, at most once per day.
pub fn record_decision(root: &Path, rel_path: &str, date: &str) -> Result<bool> {
    let path = root.join(rel_path);
    let line = format!("- {date}: pipeline executed");
    let existing = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    if existing.lines().any(|entry| entry.trim_end() == line) {
        return Ok(false);
    }
    let mut next = existing;
    if !next.is_empty() && !next.ends_with('\n') {
        next.push('\n');
    }
    next.push_str(&line);
    next.push('\n');
    publish_file(&path, next.as_bytes())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(path, text)| (path.to_string(), text.to_string()))
            .collect()
    }

    #[test]
    fn writes_new_content_and_skips_identical() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let publisher = FsPublisher::new(dir.path().to_path_buf());
        let batch = files(&[("docs/a.md", "alpha\n"), ("docs/nested/b.md", "beta\n")]);

        let first = publisher.write(&batch).expect("first write");
        assert_eq!(first, vec!["docs/a.md", "docs/nested/b.md"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("docs/nested/b.md")).expect("read"),
            "beta\n"
        );

        let second = publisher.write(&batch).expect("second write");
        assert!(second.is_empty());

        let changed = files(&[("docs/a.md", "alpha v2\n"), ("docs/nested/b.md", "beta\n")]);
        assert_eq!(publisher.write(&changed).expect("third write"), vec!["docs/a.md"]);
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let publisher = FsPublisher::new(dir.path().to_path_buf());
        publisher
            .write(&files(&[("out/a.md", "alpha\n")]))
            .expect("write");
        let names: Vec<String> = fs::read_dir(dir.path().join("out"))
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md"]);
    }

    #[test]
    fn rejects_paths_escaping_the_root() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let publisher = FsPublisher::new(dir.path().to_path_buf());
        for bad in ["../x.md", "/etc/x.md", ""] {
            assert!(publisher.write(&files(&[(bad, "x")])).is_err(), "{bad}");
        }
    }

    #[test]
    fn decision_line_is_recorded_once_per_day() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let rel = "docs/evidence/decisions.md";
        assert!(record_decision(dir.path(), rel, "2026-10-19").expect("first"));
        assert!(!record_decision(dir.path(), rel, "2026-10-19").expect("again"));
        assert!(record_decision(dir.path(), rel, "2026-10-20").expect("next day"));
        assert_eq!(
            fs::read_to_string(dir.path().join(rel)).expect("read"),
            "- 2026-10-19: pipeline executed\n- 2026-10-20: pipeline executed\n"
        );
    }
}
