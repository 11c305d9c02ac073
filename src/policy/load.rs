//! Policy loading with permissive and strict modes.
//!
//! Permissive mode never fails: a malformed document yields defaults and a
//! logged [`PolicyLoadDegraded`]. Strict mode turns the same conditions into
//! [`PolicyError`]s.
use crate::error::{PolicyError, PolicyLoadDegraded};
use crate::paths::ProjectPaths;
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// How loading reacts to malformed documents and unknown keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PolicyMode {
    #[default]
    Permissive,
    Strict,
}

/// A typed policy document with a fixed file name and known top-level keys.
pub trait PolicyDocument: DeserializeOwned + Default {
    const FILE_NAME: &'static str;
    const KEYS: &'static [&'static str];
}

/// Loaded policy plus where it came from and any degradation.
#[derive(Debug, Clone)]
pub struct LoadedPolicy<T> {
    pub policy: T,
    pub source: Option<PathBuf>,
    pub degraded: Vec<PolicyLoadDegraded>,
}

/// Load the first existing candidate for `T`, or defaults when none exists.
pub fn load_policy<T: PolicyDocument>(
    paths: &ProjectPaths,
    mode: PolicyMode,
) -> Result<LoadedPolicy<T>> {
    let Some(path) = paths
        .policy_candidates(T::FILE_NAME)
        .into_iter()
        .find(|candidate| candidate.is_file())
    else {
        tracing::debug!(policy = T::FILE_NAME, "no policy file; using defaults");
        return Ok(LoadedPolicy {
            policy: T::default(),
            source: None,
            degraded: Vec::new(),
        });
    };

    let mut degraded = Vec::new();
    let policy = match parse_document::<T>(&path, mode, &mut degraded) {
        Ok(policy) => policy,
        Err(err) if mode == PolicyMode::Permissive => {
            degraded.push(PolicyLoadDegraded {
                path: path.clone(),
                reason: err.to_string(),
            });
            T::default()
        }
        Err(err) => return Err(err.into()),
    };
    for entry in &degraded {
        tracing::warn!(policy = %entry.path.display(), reason = %entry.reason, "policy load degraded");
    }
    tracing::debug!(policy = %path.display(), "policy loaded");
    Ok(LoadedPolicy {
        policy,
        source: Some(path),
        degraded,
    })
}

fn parse_document<T: PolicyDocument>(
    path: &Path,
    mode: PolicyMode,
    degraded: &mut Vec<PolicyLoadDegraded>,
) -> Result<T, PolicyError> {
    let malformed = |message: String| PolicyError::Malformed {
        path: path.to_path_buf(),
        message,
    };
    let text = fs::read_to_string(path).map_err(|err| malformed(format!("read failed: {err}")))?;
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(&text).map_err(|err| malformed(err.to_string()))?;
    let mapping = match value {
        serde_yaml::Value::Null => return Ok(T::default()),
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => return Err(malformed("top level must be a mapping".to_string())),
    };

    let unknown: Vec<String> = mapping
        .keys()
        .map(|key| match key.as_str() {
            Some(name) => name.to_string(),
            None => format!("{key:?}"),
        })
        .filter(|name| !T::KEYS.contains(&name.as_str()))
        .collect();
    if !unknown.is_empty() {
        match mode {
            PolicyMode::Strict => {
                return Err(PolicyError::UnknownKeys {
                    path: path.to_path_buf(),
                    keys: unknown,
                });
            }
            PolicyMode::Permissive => degraded.push(PolicyLoadDegraded {
                path: path.to_path_buf(),
                reason: format!("ignored unknown keys [{}]", unknown.join(", ")),
            }),
        }
    }

    serde_yaml::from_value(serde_yaml::Value::Mapping(mapping)).map_err(|err| malformed(err.to_string()))
}
