use crate::mapping::{RenameMapping, RenameOperation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedUndo {
    pub operation: RenameOperation,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UndoResult {
    pub restored: Vec<RenameOperation>,
    /// Records whose `dst` is missing or whose `src` is occupied again.
    pub skipped: Vec<SkippedUndo>,
    pub failed: Vec<SkippedUndo>,
}

impl UndoResult {
    pub fn restored_count(&self) -> usize {
        self.restored.len()
    }
}

/// Moves every `dst` back to its `src`, in stored order, but only when
/// `dst` exists and `src` does not. Nothing here stops the remaining records.
pub fn undo_mapping(mapping: &RenameMapping) -> UndoResult {
    let mut result = UndoResult::default();

    for op in mapping.operations() {
        if !exists(&op.dst) {
            warn!(dst = %op.dst.display(), "取り消し対象が見つからないためスキップします");
            result.skipped.push(SkippedUndo {
                operation: op.clone(),
                reason: format!("リネーム後のファイルがありません: {}", op.dst.display()),
            });
            continue;
        }
        if exists(&op.src) {
            warn!(src = %op.src.display(), "元の場所が使用中のためスキップします");
            result.skipped.push(SkippedUndo {
                operation: op.clone(),
                reason: format!("元のファイル名が既に存在します: {}", op.src.display()),
            });
            continue;
        }

        match fs::rename(&op.dst, &op.src) {
            Ok(()) => {
                info!(from = %op.dst.display(), to = %op.src.display(), "元に戻しました");
                result.restored.push(op.clone());
            }
            Err(err) => {
                warn!(from = %op.dst.display(), to = %op.src.display(), error = %err, "取り消しに失敗しました");
                result.failed.push(SkippedUndo {
                    operation: op.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    result
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}
