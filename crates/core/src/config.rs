use crate::planner::DEFAULT_PATTERN;
use crate::scan::SortKey;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pattern: String,
    pub start: i64,
    pub digits: usize,
    pub sort_by: SortKey,
    pub recursive: bool,
    pub exif_date: bool,
    pub extensions: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            start: 1,
            digits: 0,
            sort_by: SortKey::Name,
            recursive: false,
            exif_date: false,
            extensions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    /// Holds the location of the most recently written mapping.
    pub last_mapping_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LastMapping {
    mapping: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "batch-renamer", "batch-renamer")
        .context("OS標準設定ディレクトリを取得できませんでした")?;
    Ok(AppPaths::in_dir(proj.config_dir()))
}

impl AppPaths {
    pub fn in_dir(config_dir: &Path) -> Self {
        Self {
            config_path: config_dir.join("config.toml"),
            last_mapping_path: config_dir.join("last-mapping.json"),
            config_dir: config_dir.to_path_buf(),
        }
    }
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&app_paths()?)
}

pub fn load_config_from(paths: &AppPaths) -> Result<AppConfig> {
    if !paths.config_path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(&paths.config_path).with_context(|| {
        format!(
            "設定ファイルを読めませんでした: {}",
            paths.config_path.display()
        )
    })?;

    let config = toml::from_str::<AppConfig>(&raw).context("設定ファイルのパースに失敗しました")?;
    Ok(config)
}

#[cfg(test)]
fn save_config_to(paths: &AppPaths, config: &AppConfig) -> Result<()> {
    ensure_config_dir(paths)?;
    let body = toml::to_string_pretty(config).context("設定のシリアライズに失敗しました")?;
    fs::write(&paths.config_path, body).with_context(|| {
        format!(
            "設定ファイルを書き込めませんでした: {}",
            paths.config_path.display()
        )
    })?;
    Ok(())
}

pub fn record_last_mapping(paths: &AppPaths, mapping_path: &Path) -> Result<()> {
    ensure_config_dir(paths)?;
    let absolute = fs::canonicalize(mapping_path).unwrap_or_else(|_| mapping_path.to_path_buf());
    let body = serde_json::to_string_pretty(&LastMapping { mapping: absolute })
        .context("直近の対応表情報のシリアライズに失敗しました")?;
    fs::write(&paths.last_mapping_path, body).with_context(|| {
        format!(
            "直近の対応表情報を書き込めませんでした: {}",
            paths.last_mapping_path.display()
        )
    })
}

pub fn last_mapping(paths: &AppPaths) -> Result<PathBuf> {
    if !paths.last_mapping_path.exists() {
        anyhow::bail!("取り消し可能な履歴がありません");
    }
    let raw = fs::read_to_string(&paths.last_mapping_path).with_context(|| {
        format!(
            "直近の対応表情報を読めませんでした: {}",
            paths.last_mapping_path.display()
        )
    })?;
    let last = serde_json::from_str::<LastMapping>(&raw).context("直近の対応表情報が壊れています")?;
    Ok(last.mapping)
}

pub fn clear_last_mapping(paths: &AppPaths) -> Result<()> {
    if !paths.last_mapping_path.exists() {
        return Ok(());
    }
    fs::remove_file(&paths.last_mapping_path).with_context(|| {
        format!(
            "直近の対応表情報の削除に失敗しました: {}",
            paths.last_mapping_path.display()
        )
    })
}

fn ensure_config_dir(paths: &AppPaths) -> Result<()> {
    fs::create_dir_all(&paths.config_dir).with_context(|| {
        format!(
            "設定ディレクトリを作成できませんでした: {}",
            paths.config_dir.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_yields_defaults() {
        let temp = tempdir().expect("tempdir");
        let paths = AppPaths::in_dir(temp.path());
        assert_eq!(load_config_from(&paths).expect("load"), AppConfig::default());
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let temp = tempdir().expect("tempdir");
        let paths = AppPaths::in_dir(temp.path());
        fs::write(&paths.config_path, "pattern = \"IMG_{counter}\"\nsort_by = \"mtime\"\n")
            .expect("write");

        let config = load_config_from(&paths).expect("load");
        assert_eq!(config.pattern, "IMG_{counter}");
        assert_eq!(config.sort_by, SortKey::Mtime);
        assert_eq!(config.start, 1);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let temp = tempdir().expect("tempdir");
        let paths = AppPaths::in_dir(&temp.path().join("nested"));
        let config = AppConfig {
            digits: 4,
            exif_date: true,
            extensions: vec!["jpg".to_string()],
            ..AppConfig::default()
        };
        save_config_to(&paths, &config).expect("save");
        assert_eq!(load_config_from(&paths).expect("load"), config);
    }

    #[test]
    fn last_mapping_pointer_lifecycle() {
        let temp = tempdir().expect("tempdir");
        let paths = AppPaths::in_dir(temp.path());
        assert!(last_mapping(&paths).is_err());

        let mapping = temp.path().join("rename_map.json");
        fs::write(&mapping, b"[]").expect("write");
        record_last_mapping(&paths, &mapping).expect("record");
        assert_eq!(
            last_mapping(&paths).expect("read"),
            fs::canonicalize(&mapping).expect("canonicalize")
        );

        clear_last_mapping(&paths).expect("clear");
        assert!(last_mapping(&paths).is_err());
    }
}
