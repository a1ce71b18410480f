use crate::collision::{PathOccupancy, TargetResolver};
use crate::context::{build_context, ContextOptions, ExifDateSource};
use crate::mapping::RenameOperation;
use crate::sanitize::sanitize_filename;
use crate::scan::{enumerate_files, sort_entries, FileEntry, SkippedFile, SortKey};
use crate::template::{Placeholder, Template, TemplateError};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_PATTERN: &str = "{prefix}{counter}";

/// Everything that decides the new names, independent of which files are renamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingRules {
    pub pattern: String,
    pub start: i64,
    pub digits: Option<usize>,
    pub prefix: String,
    pub suffix: String,
    pub use_exif_date: bool,
}

impl Default for NamingRules {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            start: 1,
            digits: None,
            prefix: String::new(),
            suffix: String::new(),
            use_exif_date: false,
        }
    }
}

impl NamingRules {
    pub fn compile(&self) -> Result<Template, TemplateError> {
        Template::parse(&self.pattern)?.with_counter_padding(self.digits)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub root: PathBuf,
    pub extensions: HashSet<String>,
    pub recursive: bool,
    pub sort_by: SortKey,
    pub rules: NamingRules,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RenameStats {
    pub scanned_files: usize,
    pub matched_files: usize,
    pub skipped_filtered: usize,
    pub skipped_unreadable: usize,
    pub planned: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    pub root: PathBuf,
    pub pattern: String,
    pub operations: Vec<RenameOperation>,
    pub skipped: Vec<SkippedFile>,
    pub stats: RenameStats,
}

/// Assigns a unique destination to every file, in order, without touching
/// the file system except through `occupancy`. Counter values start at
/// `rules.start` and grow by one per file.
pub fn plan_renames(
    files: &[FileEntry],
    rules: &NamingRules,
    exif: &dyn ExifDateSource,
    occupancy: &dyn PathOccupancy,
) -> Result<Vec<RenameOperation>, TemplateError> {
    let template = rules.compile()?;
    check_counter_range(rules.start, files.len())?;
    let keeps_own_extension = template.references(Placeholder::Ext);
    let context_options = ContextOptions {
        use_exif_date: rules.use_exif_date,
        prefix: &rules.prefix,
        suffix: &rules.suffix,
    };

    let mut resolver = TargetResolver::new(occupancy);
    let mut operations = Vec::with_capacity(files.len());

    for (offset, file) in (0_i64..).zip(files) {
        let counter = rules.start + offset;
        let context = build_context(file, counter, &context_options, exif);
        let rendered = template.render(&context)?;
        let name = target_file_name(&rendered, &file.extension, keeps_own_extension);

        let parent = file.path.parent().unwrap_or_else(|| Path::new(""));
        let target = resolver.resolve(&parent.join(name));
        debug!(
            src = %file.path.display(),
            dst = %target.display(),
            counter,
            date_source = ?context.date_source,
            "計画"
        );

        operations.push(RenameOperation::new(file.path.clone(), target));
    }

    Ok(operations)
}

/// The last file gets `start + files - 1`; that value must be representable.
fn check_counter_range(start: i64, files: usize) -> Result<(), TemplateError> {
    let last_offset = files.saturating_sub(1);
    i64::try_from(last_offset)
        .ok()
        .and_then(|offset| start.checked_add(offset))
        .map(|_| ())
        .ok_or(TemplateError::CounterOverflow { start, files })
}

/// Sanitizes the rendered stem and re-appends the original extension unless
/// the pattern already placed `{ext}` itself.
pub fn target_file_name(rendered: &str, extension: &str, keeps_own_extension: bool) -> String {
    let sanitized = sanitize_filename(rendered);
    if keeps_own_extension || extension.is_empty() {
        sanitized
    } else {
        format!("{}.{}", sanitized, extension)
    }
}

pub fn generate_plan(
    options: &PlanOptions,
    exif: &dyn ExifDateSource,
    occupancy: &dyn PathOccupancy,
) -> Result<RenamePlan> {
    // Template errors must surface before the directory is even read.
    options.rules.compile()?;

    if !options.root.is_dir() {
        anyhow::bail!("フォルダが存在しません: {}", options.root.display());
    }

    let mut scan = enumerate_files(&options.root, &options.extensions, options.recursive)?;
    sort_entries(&mut scan.entries, options.sort_by);

    let operations = plan_renames(&scan.entries, &options.rules, exif, occupancy)?;

    let stats = RenameStats {
        scanned_files: scan.scanned_files,
        matched_files: scan.entries.len(),
        skipped_filtered: scan.skipped_filtered,
        skipped_unreadable: scan.skipped_unreadable.len(),
        planned: operations.len(),
    };

    Ok(RenamePlan {
        root: options.root.clone(),
        pattern: options.rules.pattern.clone(),
        operations,
        skipped: scan.skipped_unreadable,
        stats,
    })
}
