//! Enumerates files under a folder, applying include patterns and a
//! per-directory cap so one oversized directory can't stall a job.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use retrieva_common::RetrievaError;

/// An empty pattern list means "every file"; otherwise a file must match
/// at least one glob to be enumerated.
fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>, RetrievaError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| RetrievaError::invalid_input(format!("invalid pattern {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| RetrievaError::invalid_input(format!("invalid pattern set: {e}")))?;
    Ok(Some(set))
}

/// Walks `root` respecting `.gitignore`, keeping only files that match
/// `patterns` (if any), and stopping a directory's descent once it has
/// yielded `max_files_per_directory` entries. Returns paths in sorted
/// order so runs are deterministic.
///
/// # Errors
/// `InvalidInput` on a malformed pattern or an unreadable directory entry.
pub fn enumerate_files(
    root: &Path,
    patterns: &[String],
    max_files_per_directory: usize,
) -> Result<Vec<PathBuf>, RetrievaError> {
    let include = build_globset(patterns)?;
    let mut files = Vec::new();
    let mut per_directory: HashMap<PathBuf, usize> = HashMap::new();

    for entry in WalkBuilder::new(root).hidden(false).build() {
        let entry = entry.map_err(|e| RetrievaError::invalid_input(format!("walk error: {e}")))?;
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        if let Some(set) = &include {
            if !set.is_match(path) {
                continue;
            }
        }

        let parent = path.parent().unwrap_or(root).to_path_buf();
        let count = per_directory.entry(parent).or_insert(0);
        if *count >= max_files_per_directory {
            continue;
        }
        *count = count.saturating_add(1);
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn enumerates_all_files_with_no_patterns() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        fs::write(dir.path().join("b.md"), "# hi").unwrap();

        let files = enumerate_files(dir.path(), &[], 100).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn include_pattern_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        fs::write(dir.path().join("b.md"), "# hi").unwrap();

        let files = enumerate_files(dir.path(), &["**/*.rs".to_string()], 100).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.rs"));
    }

    #[test]
    fn per_directory_cap_truncates_a_large_directory() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            fs::write(dir.path().join(format!("file{i}.txt")), "x").unwrap();
        }

        let files = enumerate_files(dir.path(), &[], 3).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn gitignored_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "ignored.txt\n").unwrap();
        fs::write(dir.path().join("ignored.txt"), "x").unwrap();
        fs::write(dir.path().join("kept.txt"), "x").unwrap();

        let files = enumerate_files(dir.path(), &[], 100).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("kept.txt"));
    }
}
