use crate::scan::FileEntry;
use chrono::{DateTime, Local};
use std::path::Path;
use tracing::debug;

/// Source of a capture date for a file. Implementations fold every
/// internal failure into `None`.
pub trait ExifDateSource {
    fn read_date(&self, path: &Path) -> Option<DateTime<Local>>;
}

/// Capability used when EXIF dates are not requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExif;

impl ExifDateSource for NoExif {
    fn read_date(&self, _path: &Path) -> Option<DateTime<Local>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    Exif,
    FileModified,
}

/// Values available to the template for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingContext {
    pub counter: i64,
    pub orig: String,
    pub ext: String,
    pub date: DateTime<Local>,
    pub date_source: DateSource,
    pub mtime: DateTime<Local>,
    pub prefix: String,
    pub suffix: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ContextOptions<'a> {
    pub use_exif_date: bool,
    pub prefix: &'a str,
    pub suffix: &'a str,
}

pub fn build_context(
    entry: &FileEntry,
    counter: i64,
    options: &ContextOptions<'_>,
    exif: &dyn ExifDateSource,
) -> NamingContext {
    let exif_date = if options.use_exif_date {
        exif.read_date(&entry.path)
    } else {
        None
    };

    let (date, date_source) = match exif_date {
        Some(date) => (date, DateSource::Exif),
        None => {
            if options.use_exif_date {
                debug!(path = %entry.path.display(), "EXIF日時がないため更新日時を使用します");
            }
            (entry.modified, DateSource::FileModified)
        }
    };

    NamingContext {
        counter,
        orig: entry.stem.clone(),
        ext: entry.extension.clone(),
        date,
        date_source,
        mtime: entry.modified,
        prefix: options.prefix.to_string(),
        suffix: options.suffix.to_string(),
    }
}
