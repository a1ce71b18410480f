use crate::context::ExifDateSource;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

const DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

/// Reads capture dates with kamadak-exif. Any failure is reported as "no date".
#[derive(Debug, Clone, Copy, Default)]
pub struct KamadakExifReader;

impl ExifDateSource for KamadakExifReader {
    fn read_date(&self, path: &Path) -> Option<DateTime<Local>> {
        match read_exif_date(path) {
            Ok(date) => date,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "EXIFを読み取れませんでした");
                None
            }
        }
    }
}

pub fn read_exif_date(path: &Path) -> Result<Option<DateTime<Local>>> {
    let file = File::open(path)
        .with_context(|| format!("EXIF読み込み対象を開けませんでした: {}", path.display()))?;
    let mut buf = BufReader::new(file);
    let exif = Reader::new()
        .read_from_container(&mut buf)
        .with_context(|| format!("EXIFを解析できませんでした: {}", path.display()))?;

    Ok(DATE_TAGS.iter().find_map(|tag| {
        let field = exif.get_field(*tag, In::PRIMARY)?;
        match &field.value {
            Value::Ascii(values) => values
                .iter()
                .find_map(|raw| parse_date(&String::from_utf8_lossy(raw))),
            _ => None,
        }
    }))
}

fn parse_date(input: &str) -> Option<DateTime<Local>> {
    let normalized = input.trim().trim_end_matches('\0');

    let candidates = [
        "%Y:%m:%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
    ];

    for fmt in candidates {
        if let Ok(dt) = DateTime::parse_from_str(normalized, fmt) {
            return Some(dt.with_timezone(&Local));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(normalized, fmt) {
            if let Some(local) = Local.from_local_datetime(&naive).single() {
                return Some(local);
            }
        }
    }

    None
}
