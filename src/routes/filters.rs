use std::collections::BTreeMap;
use regex::RegexBuilder;
use crate::errors::FuzzError;

/// Paths grouped by the webroot file that serves them.
pub type PathsByFile = BTreeMap<String, Vec<String>>;

/// Keeps paths starting with `prefix`, compared case-insensitively. Files left
/// without paths are dropped.
pub fn limit_paths_to_prefix(paths: &PathsByFile, prefix: &str) -> PathsByFile {
    let prefix = prefix.to_lowercase();
    retain_paths(paths, |path| path.to_lowercase().starts_with(&prefix))
}

/// Drops paths matching `pattern` (case-insensitive). An empty pattern
/// excludes nothing.
pub fn exclude_paths(paths: &PathsByFile, pattern: &str) -> Result<PathsByFile, FuzzError> {
    if pattern.is_empty() {
        return Ok(paths.clone());
    }
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| FuzzError::Route(format!("Invalid exclusion pattern '{}': {}", pattern, e)))?;
    Ok(retain_paths(paths, |path| !regex.is_match(path)))
}

fn retain_paths<F: Fn(&str) -> bool>(paths: &PathsByFile, keep: F) -> PathsByFile {
    let mut out = PathsByFile::new();
    for (file, list) in paths {
        let kept: Vec<String> = list.iter().filter(|p| keep(p)).cloned().collect();
        if !kept.is_empty() {
            out.insert(file.clone(), kept);
        }
    }
    out
}
