//! Manifest store: which source files the current index represents.
//!
//! The manifest is a plain-text file, one absolute path per line, sorted.
//! It is only trustworthy next to a healthy index: the lifecycle manager
//! treats a manifest without valid index artifacts as stale and ignores it.

use grounded_core::AppResult;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Read the manifest. A missing file reads as an empty set; entries for
/// files that no longer exist are kept, since the diff against the current
/// scan is what detects deletions.
pub fn load(path: &Path) -> AppResult<BTreeSet<PathBuf>> {
    if !path.exists() {
        return Ok(BTreeSet::new());
    }

    let content = fs::read_to_string(path)?;

    let files = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect::<BTreeSet<_>>();

    tracing::debug!("Loaded manifest with {} entries from {:?}", files.len(), path);
    Ok(files)
}

/// Write the manifest atomically (temp file + rename), sorted.
///
/// Called only after the index artifacts have been renamed into place, so a
/// crash mid-save can leave an old manifest next to a new index (harmless:
/// the next refresh sees a diff and rebuilds) but never the reverse.
pub fn save(path: &Path, files: &BTreeSet<PathBuf>) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut content = String::new();
    for file in files {
        content.push_str(&file.to_string_lossy());
        content.push('\n');
    }

    let tmp = path.with_extension("txt.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;

    tracing::debug!("Saved manifest with {} entries to {:?}", files.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_manifest_is_empty() {
        let temp = TempDir::new().unwrap();
        let files = load(&temp.path().join("manifest.txt")).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.txt");

        let files: BTreeSet<PathBuf> = ["/kb/b.txt", "/kb/a.txt", "/kb/sub/c.md"]
            .iter()
            .map(PathBuf::from)
            .collect();

        save(&path, &files).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, files);
    }

    #[test]
    fn test_saved_manifest_is_sorted_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.txt");

        let files: BTreeSet<PathBuf> = ["/kb/z.txt", "/kb/a.txt"].iter().map(PathBuf::from).collect();
        save(&path, &files).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["/kb/a.txt", "/kb/z.txt"]);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.txt");
        fs::write(&path, "/kb/a.txt\n\n  \n/kb/b.txt\n").unwrap();

        let files = load(&path).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.txt");
        save(&path, &BTreeSet::new()).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("txt.tmp").exists());
    }
}
