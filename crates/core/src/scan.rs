use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Snapshot of one file taken at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub stem: String,
    /// Original case, without the leading dot. Empty when the file has none.
    pub extension: String,
    pub modified: DateTime<Local>,
    pub created: DateTime<Local>,
}

impl FileEntry {
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = fs::metadata(path)?;
        let modified: DateTime<Local> = meta.modified()?.into();
        // ctime is not available everywhere; fall back to mtime.
        let created = meta.created().map(DateTime::<Local>::from).unwrap_or(modified);

        Ok(Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|v| v.to_string_lossy().to_string())
                .unwrap_or_default(),
            stem: path
                .file_stem()
                .map(|v| v.to_string_lossy().to_string())
                .unwrap_or_default(),
            extension: path
                .extension()
                .map(|v| v.to_string_lossy().to_string())
                .unwrap_or_default(),
            modified,
            created,
        })
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Mtime,
    Ctime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileScan {
    pub entries: Vec<FileEntry>,
    pub scanned_files: usize,
    pub skipped_filtered: usize,
    pub skipped_unreadable: Vec<SkippedFile>,
}

/// Normalizes user supplied extensions: lower case, no leading dot, blanks dropped.
pub fn normalize_extensions<I, S>(values: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Lists regular files under `root` in traversal order. An empty
/// `extensions` set matches every file. Only a failure to read `root`
/// itself is fatal; anything below it is recorded as skipped.
pub fn enumerate_files(
    root: &Path,
    extensions: &HashSet<String>,
    recursive: bool,
) -> Result<FileScan> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    collect_entries(
        root,
        WalkDir::new(root).min_depth(1).max_depth(max_depth),
        extensions,
    )
}

fn collect_entries<I>(root: &Path, walker: I, extensions: &HashSet<String>) -> Result<FileScan>
where
    I: IntoIterator<Item = walkdir::Result<DirEntry>>,
{
    let mut scan = FileScan::default();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(err)
                    .with_context(|| format!("フォルダ走査に失敗しました: {}", root.display()));
            }
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                warn!(path = %path.display(), error = %err, "読み取れない項目をスキップします");
                scan.skipped_unreadable.push(SkippedFile {
                    path,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        scan.scanned_files += 1;

        let path = entry.path();
        if !matches_extension(path, extensions) {
            scan.skipped_filtered += 1;
            continue;
        }

        // The mapping file is JSON, so every recorded path must be UTF-8.
        if path.to_str().is_none() {
            warn!(path = %path.display(), "UTF-8でないパスをスキップします");
            scan.skipped_unreadable.push(SkippedFile {
                path: path.to_path_buf(),
                reason: "パスがUTF-8ではありません".to_string(),
            });
            continue;
        }

        match FileEntry::from_path(path) {
            Ok(file) => scan.entries.push(file),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "読み取れないファイルをスキップします");
                scan.skipped_unreadable.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(scan)
}

/// Orders entries by `key`; ties fall back to the full path so counter
/// assignment is reproducible.
pub fn sort_entries(entries: &mut [FileEntry], key: SortKey) {
    entries.sort_by(|a, b| {
        let primary = match key {
            SortKey::Name => a.file_name.cmp(&b.file_name),
            SortKey::Mtime => a.modified.cmp(&b.modified),
            SortKey::Ctime => a.created.cmp(&b.created),
        };
        primary.then_with(|| a.path.cmp(&b.path))
    });
}

fn matches_extension(path: &Path, extensions: &HashSet<String>) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .map(|ext| extensions.contains(&ext.to_string_lossy().to_lowercase()))
        .unwrap_or(false)
}
