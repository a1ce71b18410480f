use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MAPPING_FILE_PREFIX: &str = "rename_map_";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenameOperation {
    pub src: PathBuf,
    pub dst: PathBuf,
}

impl RenameOperation {
    pub fn new(src: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
        }
    }
}

/// Renames that actually happened on disk, in the order they happened.
/// Stored as a plain JSON array of `{"src", "dst"}` records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenameMapping {
    operations: Vec<RenameOperation>,
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("対応表ファイルが存在しません: {}", .0.display())]
    NotFound(PathBuf),
    #[error("対応表ファイルを読めませんでした: {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("対応表ファイルが壊れています: {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("対応表のシリアライズに失敗しました")]
    Serialize(#[source] serde_json::Error),
    #[error("対応表ファイルを書き込めませんでした: {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RenameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: RenameOperation) {
        self.operations.push(operation);
    }

    pub fn operations(&self) -> &[RenameOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn to_json(&self) -> Result<String, MappingError> {
        serde_json::to_string_pretty(self).map_err(MappingError::Serialize)
    }

    pub fn load(path: &Path) -> Result<Self, MappingError> {
        if !path.exists() {
            return Err(MappingError::NotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path).map_err(|source| MappingError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| MappingError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), MappingError> {
        let body = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| MappingError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }
        fs::write(path, body).map_err(|source| MappingError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

impl FromIterator<RenameOperation> for RenameMapping {
    fn from_iter<T: IntoIterator<Item = RenameOperation>>(iter: T) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}

/// `<root>/rename_map_<YYYYmmddTHHMMSS>.json`
pub fn default_mapping_path(root: &Path, now: DateTime<Local>) -> PathBuf {
    root.join(format!(
        "{}{}.json",
        MAPPING_FILE_PREFIX,
        now.format("%Y%m%dT%H%M%S")
    ))
}
