use crate::mapping::{default_mapping_path, RenameMapping, RenameOperation};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub apply: bool,
    pub verbose: bool,
    /// Where to write the mapping. Defaults to a timestamped file under `root`.
    pub mapping_path: Option<PathBuf>,
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationOutcome {
    Previewed,
    Renamed,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReport {
    pub operation: RenameOperation,
    pub outcome: OperationOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub applied: bool,
    pub planned: usize,
    pub operations: Vec<OperationReport>,
    pub mapping_path: Option<PathBuf>,
    pub mapping_error: Option<String>,
}

impl ExecutionReport {
    pub fn renamed(&self) -> usize {
        self.count(|o| matches!(o, OperationOutcome::Renamed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, OperationOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&OperationOutcome) -> bool) -> usize {
        self.operations.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Runs the plan. In preview mode nothing on disk changes. In apply mode a
/// failing operation is reported and skipped; only successful renames are
/// written to the mapping, once, after the whole batch. An apply run with no
/// success still writes an empty mapping.
pub fn execute_plan(operations: &[RenameOperation], options: &ExecuteOptions) -> ExecutionReport {
    let mut report = ExecutionReport {
        applied: options.apply,
        planned: operations.len(),
        operations: Vec::with_capacity(operations.len()),
        mapping_path: None,
        mapping_error: None,
    };

    if !options.apply {
        for op in operations {
            debug!(src = %op.src.display(), dst = %op.dst.display(), "プレビュー");
            report.operations.push(OperationReport {
                operation: op.clone(),
                outcome: OperationOutcome::Previewed,
            });
        }
        return report;
    }

    let mut mapping = RenameMapping::new();
    for op in operations {
        let outcome = match rename_one(op) {
            Ok(()) => {
                if options.verbose {
                    info!(src = %op.src.display(), dst = %op.dst.display(), "リネームしました");
                }
                mapping.push(op.clone());
                OperationOutcome::Renamed
            }
            Err(reason) => {
                warn!(src = %op.src.display(), dst = %op.dst.display(), %reason, "リネームに失敗しました");
                OperationOutcome::Failed { reason }
            }
        };
        report.operations.push(OperationReport {
            operation: op.clone(),
            outcome,
        });
    }

    let path = options
        .mapping_path
        .clone()
        .unwrap_or_else(|| default_mapping_path(&options.root, Local::now()));
    match mapping.save(&path) {
        Ok(()) => {
            info!(path = %path.display(), count = mapping.len(), "対応表を保存しました");
            report.mapping_path = Some(path);
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "対応表の保存に失敗しました");
            report.mapping_error = Some(format!("{err}"));
        }
    }

    report
}

fn rename_one(op: &RenameOperation) -> Result<(), String> {
    if !exists(&op.src) {
        return Err(format!("元ファイルが見つかりません: {}", op.src.display()));
    }
    if exists(&op.dst) {
        return Err(format!("リネーム先が既に存在します: {}", op.dst.display()));
    }
    fs::rename(&op.src, &op.dst).map_err(|err| err.to_string())
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options(root: &Path, apply: bool) -> ExecuteOptions {
        ExecuteOptions {
            apply,
            verbose: true,
            mapping_path: Some(root.join("map.json")),
            root: root.to_path_buf(),
        }
    }

    #[test]
    fn preview_changes_nothing() {
        let temp = tempdir().expect("tempdir");
        let src = temp.path().join("a.jpg");
        fs::write(&src, b"a").expect("write");
        let ops = [RenameOperation::new(&src, temp.path().join("pic_1.jpg"))];

        let report = execute_plan(&ops, &options(temp.path(), false));
        assert_eq!(report.planned, 1);
        assert_eq!(report.operations[0].outcome, OperationOutcome::Previewed);
        assert!(src.exists());
        assert!(!temp.path().join("pic_1.jpg").exists());
        assert!(!temp.path().join("map.json").exists());
        assert_eq!(report.mapping_path, None);
    }

    #[test]
    fn apply_renames_and_records_only_successes() {
        let temp = tempdir().expect("tempdir");
        let a = temp.path().join("a.jpg");
        let b = temp.path().join("b.jpg");
        let c = temp.path().join("c.jpg");
        fs::write(&a, b"a").expect("write");
        fs::write(&c, b"c").expect("write");
        fs::write(temp.path().join("taken.jpg"), b"t").expect("write");

        let ops = [
            RenameOperation::new(&a, temp.path().join("pic_1.jpg")),
            RenameOperation::new(&b, temp.path().join("pic_2.jpg")),
            RenameOperation::new(&c, temp.path().join("taken.jpg")),
        ];
        let report = execute_plan(&ops, &options(temp.path(), true));

        assert_eq!(report.renamed(), 1);
        assert_eq!(report.failed(), 2);
        assert!(temp.path().join("pic_1.jpg").exists());
        assert!(c.exists(), "blocked source must stay in place");
        assert_eq!(
            fs::read(temp.path().join("taken.jpg")).expect("read"),
            b"t",
            "existing destination must not be overwritten"
        );

        let mapping_path = report.mapping_path.expect("mapping written");
        let mapping = RenameMapping::load(&mapping_path).expect("load");
        assert_eq!(mapping.operations(), &ops[..1]);
    }

    #[test]
    fn apply_uses_default_mapping_path_under_root() {
        let temp = tempdir().expect("tempdir");
        let a = temp.path().join("a.jpg");
        fs::write(&a, b"a").expect("write");
        let ops = [RenameOperation::new(&a, temp.path().join("pic_1.jpg"))];

        let opts = ExecuteOptions {
            mapping_path: None,
            ..options(temp.path(), true)
        };
        let report = execute_plan(&ops, &opts);
        let path = report.mapping_path.expect("mapping written");
        assert_eq!(path.parent(), Some(temp.path()));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("rename_map_") && name.ends_with(".json"));
    }

    #[test]
    fn mapping_write_failure_keeps_applied_renames() {
        let temp = tempdir().expect("tempdir");
        let a = temp.path().join("a.jpg");
        fs::write(&a, b"a").expect("write");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"file, not dir").expect("write");
        let ops = [RenameOperation::new(&a, temp.path().join("pic_1.jpg"))];

        let opts = ExecuteOptions {
            mapping_path: Some(blocker.join("map.json")),
            ..options(temp.path(), true)
        };
        let report = execute_plan(&ops, &opts);
        assert_eq!(report.renamed(), 1);
        assert!(report.mapping_error.is_some());
        assert!(temp.path().join("pic_1.jpg").exists());
    }

    #[test]
    fn apply_with_no_success_writes_empty_mapping() {
        let temp = tempdir().expect("tempdir");
        let ops = [RenameOperation::new(
            temp.path().join("gone.jpg"),
            temp.path().join("pic_1.jpg"),
        )];
        let report = execute_plan(&ops, &options(temp.path(), true));
        assert_eq!(report.failed(), 1);

        let path = report.mapping_path.expect("mapping written");
        assert_eq!(path, temp.path().join("map.json"));
        assert!(RenameMapping::load(&path).expect("load").is_empty());
    }
}
