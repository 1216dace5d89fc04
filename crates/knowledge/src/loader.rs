//! Document discovery and text extraction.
//!
//! The loader walks the knowledge root for files whose extension is on the
//! allow-list and extracts clean text per format. A single unreadable or
//! corrupt file is skipped with a warning; it never aborts the scan.

use futures::StreamExt;
use grounded_core::{AppError, AppResult};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Source document format, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    PlainText,
    Markdown,
    Html,
    Pdf,
}

impl SourceFormat {
    /// Detect the format from a path; `None` means the file is not indexed.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("txt") => Some(Self::PlainText),
            Some("md") | Some("markdown") => Some(Self::Markdown),
            Some("html") | Some("htm") => Some(Self::Html),
            Some("pdf") => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }
}

/// A source document: its identity (absolute path) and extracted text.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub text: String,
}

/// Enumerate indexable files under `root`, recursively.
///
/// Returns a sorted set of absolute paths. A missing root or an unreadable
/// directory entry yields a warning, not an error; the result may simply be
/// empty.
pub fn scan(root: &Path) -> BTreeSet<PathBuf> {
    let root = match fs::canonicalize(root) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Knowledge root {:?} not accessible: {}", root, e);
            return BTreeSet::new();
        }
    };

    let mut paths = BTreeSet::new();

    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {:?}: {}", root, e);
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().is_file() && SourceFormat::from_path(path).is_some() {
            paths.insert(path.to_path_buf());
        }
    }

    tracing::debug!("Scan of {:?} found {} indexable files", root, paths.len());
    paths
}

/// Extract text from a single file.
pub fn load(path: &Path) -> AppResult<Document> {
    let format = SourceFormat::from_path(path).ok_or_else(|| {
        AppError::Document(format!("Unsupported file type: {:?}", path))
    })?;

    let text = match format {
        SourceFormat::PlainText => read_text(path)?,
        SourceFormat::Markdown => clean_markdown(&read_text(path)?),
        SourceFormat::Html => clean_html(&read_text(path)?),
        SourceFormat::Pdf => extract_pdf(path)?,
    };

    Ok(Document {
        path: path.to_path_buf(),
        format,
        text,
    })
}

/// Load a set of documents with a bounded number of extractions in flight.
///
/// Files that fail to load are skipped with a warning; the returned set may
/// be a strict subset of `paths`.
pub async fn load_documents(paths: &BTreeSet<PathBuf>, concurrency: usize) -> Vec<Document> {
    let concurrency = concurrency.max(1);

    let results: Vec<Option<(PathBuf, AppResult<Document>)>> =
        futures::stream::iter(paths.iter().cloned().map(|path| async move {
            let loaded = tokio::task::spawn_blocking(move || {
                let doc = load(&path);
                (path, doc)
            })
            .await;
            match loaded {
                Ok(pair) => Some(pair),
                Err(e) => {
                    tracing::warn!("Document load task failed: {}", e);
                    None
                }
            }
        }))
        .buffered(concurrency)
        .collect()
        .await;

    let mut documents = Vec::new();
    for (path, result) in results.into_iter().flatten() {
        match result {
            Ok(doc) if doc.text.trim().is_empty() => {
                tracing::warn!("Skipping {:?}: no extractable text", path);
            }
            Ok(doc) => documents.push(doc),
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", path, e);
            }
        }
    }

    documents
}

fn read_text(path: &Path) -> AppResult<String> {
    let raw = fs::read_to_string(path)?;

    if raw.contains('\0') {
        return Err(AppError::Document(format!(
            "File {:?} looks binary, refusing to index",
            path
        )));
    }

    Ok(raw)
}

/// Extract text from a PDF.
fn extract_pdf(path: &Path) -> AppResult<String> {
    pdf_extract::extract_text(path)
        .map_err(|e| AppError::Document(format!("Failed to extract PDF {:?}: {}", path, e)))
}

/// Clean markdown: drop code fences and horizontal rules, strip header
/// markers, keep prose.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || trimmed.starts_with("---") {
            continue;
        }

        let stripped = trimmed.trim_start_matches('#').trim();
        if !stripped.is_empty() {
            result.push_str(stripped);
            result.push('\n');
        } else {
            // preserve paragraph breaks for the chunker
            if !result.ends_with("\n\n") && !result.is_empty() {
                result.push('\n');
            }
        }
    }

    result.trim().to_string()
}

/// Clean HTML by stripping tags and script/style bodies.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;

            let rest = &text[i..];
            if starts_with_ci(rest, "<script") {
                in_script = true;
            } else if starts_with_ci(rest, "</script") {
                in_script = false;
            } else if starts_with_ci(rest, "<style") {
                in_style = true;
            } else if starts_with_ci(rest, "</style") {
                in_style = false;
            }
        } else if ch == '>' {
            in_tag = false;
        } else if !in_tag && !in_script && !in_style {
            result.push(ch);
        }
    }

    result
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn starts_with_ci(haystack: &str, needle: &str) -> bool {
    haystack.len() >= needle.len()
        && haystack.as_bytes()[..needle.len()].eq_ignore_ascii_case(needle.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            SourceFormat::from_path(Path::new("notes.md")),
            Some(SourceFormat::Markdown)
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("doc.PDF")),
            Some(SourceFormat::Pdf)
        );
        assert_eq!(SourceFormat::from_path(Path::new("image.png")), None);
        assert_eq!(SourceFormat::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn test_scan_filters_by_extension() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "alpha").unwrap();
        fs::write(temp.path().join("b.md"), "beta").unwrap();
        fs::write(temp.path().join("c.png"), [0u8, 1, 2]).unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/d.txt"), "delta").unwrap();

        let paths = scan(temp.path());
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let paths = scan(Path::new("/definitely/not/a/real/dir"));
        assert!(paths.is_empty());
    }

    #[test]
    fn test_load_skips_binary_text() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("weird.txt");
        fs::write(&path, "abc\0def").unwrap();

        assert!(load(&path).is_err());
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Title\n\nSome text\n\n```rust\ncode here\n```\n\nMore text";
        let output = clean_markdown(input);
        assert!(output.contains("Title"));
        assert!(output.contains("Some text"));
        assert!(output.contains("More text"));
        assert!(!output.contains("code here"));
        assert!(!output.contains("```"));
    }

    #[test]
    fn test_clean_html() {
        let input = "<html><body><p>Hello <b>world</b></p><script>var x;</script></body></html>";
        let output = clean_html(input);
        assert_eq!(output, "Hello world");
    }

    #[tokio::test]
    async fn test_load_documents_skips_failures() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("good.txt"), "plenty of text here").unwrap();
        fs::write(temp.path().join("bad.txt"), "abc\0def").unwrap();

        let paths = scan(temp.path());
        assert_eq!(paths.len(), 2);

        let docs = load_documents(&paths, 2).await;
        assert_eq!(docs.len(), 1);
        assert!(docs[0].path.ends_with("good.txt"));
    }
}
