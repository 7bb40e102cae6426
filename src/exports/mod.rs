//! External export loading
//!
//! Reads the manually downloaded data dumps and normalizes every row into a
//! [`HistoryRecord`]. A bad row is counted and skipped; a file that cannot be
//! read as its declared format fails that source only.

pub mod goodreads;
pub mod strava;

pub use goodreads::GoodreadsParser;
pub use strava::StravaParser;

use crate::error::{Result, WrapupError};
use crate::record::{HistoryRecord, RecordBounds, Source};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

/// The supported third-party export schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// Goodreads "Export Library" CSV (export-A)
    Goodreads,
    /// Strava bulk-export `activities.csv` (export-B)
    Strava,
}

impl ExportFormat {
    pub fn source(&self) -> Source {
        match self {
            ExportFormat::Goodreads => Source::Goodreads,
            ExportFormat::Strava => Source::Strava,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Goodreads => "goodreads",
            ExportFormat::Strava => "strava",
        }
    }

    pub fn parser(&self) -> Box<dyn ExportParser> {
        match self {
            ExportFormat::Goodreads => Box::new(GoodreadsParser),
            ExportFormat::Strava => Box::new(StravaParser),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header positions of an export file; duplicate names resolve to the first column
#[derive(Debug, Clone, Default)]
pub struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    pub fn new(headers: &csv::StringRecord) -> Self {
        let mut index = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            let name = name.trim_start_matches('\u{feff}').trim();
            index.entry(name.to_string()).or_insert(i);
        }
        Self { index }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

/// One data row with named access
pub struct Row<'a> {
    columns: &'a Columns,
    record: &'a csv::StringRecord,
}

impl<'a> Row<'a> {
    pub fn new(columns: &'a Columns, record: &'a csv::StringRecord) -> Self {
        Self { columns, record }
    }

    /// Trimmed cell value; `None` when the column or the value is missing
    pub fn get(&self, name: &str) -> Option<&'a str> {
        let position = self.columns.position(name)?;
        self.record.get(position).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Numeric cell; thousands separators are ignored
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name)?.replace(',', "").parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

/// What became of one row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Record(HistoryRecord),
    /// Well-formed but not history (e.g. a to-read shelf entry)
    Filtered,
    Malformed(String),
}

/// Maps one export schema onto [`HistoryRecord`]
pub trait ExportParser: Send + Sync {
    fn format(&self) -> ExportFormat;

    /// Columns without which the file is not this format
    fn required_columns(&self) -> &'static [&'static str];

    fn parse_row(&self, row: &Row<'_>) -> RowOutcome;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Keep rows from this calendar year only
    pub year: Option<i32>,
    pub bounds: RecordBounds,
}

#[derive(Debug, Clone)]
pub struct LoadedExport {
    pub format: ExportFormat,
    pub records: Vec<HistoryRecord>,
    pub rows: usize,
    pub malformed: usize,
    pub filtered: usize,
}

/// Read and normalize one export file
pub fn load_export(path: &Path, format: ExportFormat, options: &LoadOptions) -> Result<LoadedExport> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => WrapupError::SourceNotFound(path.to_path_buf()),
        _ => WrapupError::ParseFailed { format: format.to_string(), reason: e.to_string() },
    })?;
    log::info!("Reading {} export from {}", format, path.display());

    load_from_reader(file, format, options)
}

/// Normalize an export from any reader
pub fn load_from_reader<R: io::Read>(reader: R, format: ExportFormat, options: &LoadOptions) -> Result<LoadedExport> {
    let parse_failed = |reason: String| WrapupError::ParseFailed { format: format.to_string(), reason };

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers().map_err(|e| parse_failed(e.to_string()))?.clone();
    let columns = Columns::new(&headers);

    let parser = format.parser();
    let missing: Vec<&str> =
        parser.required_columns().iter().copied().filter(|name| !columns.contains(name)).collect();
    if !missing.is_empty() {
        return Err(parse_failed(format!("missing required columns: {}", missing.join(", "))));
    }

    let mut loaded = LoadedExport { format, records: Vec::new(), rows: 0, malformed: 0, filtered: 0 };

    for result in reader.records() {
        loaded.rows += 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping unreadable {} row {}: {}", format, loaded.rows, e);
                loaded.malformed += 1;
                continue;
            }
        };

        match parser.parse_row(&Row::new(&columns, &record)) {
            RowOutcome::Record(history) => {
                if options.year.is_some_and(|year| history.date.year() != year) {
                    loaded.filtered += 1;
                } else if let Err(reason) = options.bounds.check(&history) {
                    log::warn!("Skipping {} row {}: {}", format, loaded.rows, reason);
                    loaded.malformed += 1;
                } else {
                    loaded.records.push(history);
                }
            }
            RowOutcome::Filtered => loaded.filtered += 1,
            RowOutcome::Malformed(reason) => {
                log::warn!("Skipping malformed {} row {}: {}", format, loaded.rows, reason);
                loaded.malformed += 1;
            }
        }
    }

    log::info!(
        "Loaded {} {} records ({} malformed, {} filtered)",
        loaded.records.len(),
        format,
        loaded.malformed,
        loaded.filtered
    );

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_first_duplicate_wins() {
        let headers = csv::StringRecord::from(vec!["\u{feff}Activity ID", "Distance", "Name", "Distance"]);
        let columns = Columns::new(&headers);

        assert_eq!(columns.position("Activity ID"), Some(0));
        assert_eq!(columns.position("Distance"), Some(1));
        assert!(!columns.contains("Calories"));
    }

    #[test]
    fn test_row_access() {
        let headers = csv::StringRecord::from(vec!["Title", "Pages", "Empty"]);
        let record = csv::StringRecord::from(vec![" Dune ", "1,024", "  "]);
        let columns = Columns::new(&headers);
        let row = Row::new(&columns, &record);

        assert_eq!(row.get("Title"), Some("Dune"));
        assert_eq!(row.number("Pages"), Some(1024.0));
        assert_eq!(row.get("Empty"), None);
        assert_eq!(row.get("Missing"), None);
    }

    #[test]
    fn test_missing_file_is_source_not_found() {
        let err = load_export(Path::new("/nonexistent/goodreads.csv"), ExportFormat::Goodreads, &LoadOptions::default())
            .unwrap_err();

        assert!(matches!(err, WrapupError::SourceNotFound(_)));
        assert!(err.is_source_level());
    }

    #[test]
    fn test_wrong_format_fails_whole_source() {
        let csv = "Activity Date,Activity Name\nJan 5, 2025,Run\n";
        let err = load_from_reader(csv.as_bytes(), ExportFormat::Goodreads, &LoadOptions::default()).unwrap_err();

        match err {
            WrapupError::ParseFailed { format, reason } => {
                assert_eq!(format, "goodreads");
                assert!(reason.contains("Title"));
            }
            other => panic!("Expected ParseFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_file_fails_whole_source() {
        let err = load_from_reader("".as_bytes(), ExportFormat::Strava, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, WrapupError::ParseFailed { .. }));
    }
}
