//! Versioned snapshot files
//!
//! A snapshot is written to a temporary file next to its destination and
//! renamed into place, so readers see either the previous snapshot or the new
//! one in full.

use crate::error::{Result, WrapupError};
use crate::merge::MergedDataset;
use crate::pipeline::SourceReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything the dashboard reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub year: Option<i32>,
    pub dataset: MergedDataset,
    pub sources: Vec<SourceReport>,
    pub summary: Option<String>,
}

impl Snapshot {
    pub fn new(dataset: MergedDataset, year: Option<i32>) -> Self {
        Self { version: SNAPSHOT_VERSION, generated_at: Utc::now(), year, dataset, sources: Vec::new(), summary: None }
    }

    pub fn with_sources(mut self, sources: Vec<SourceReport>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary;
        self
    }

    /// Load a snapshot, rejecting versions this build does not understand
    pub fn read(path: &Path) -> Result<Self> {
        let read_failed = |reason: String| WrapupError::SnapshotReadFailed(format!("{}: {}", path.display(), reason));

        let raw = fs::read_to_string(path).map_err(|e| read_failed(e.to_string()))?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| read_failed(e.to_string()))?;

        match value.get("version").and_then(serde_json::Value::as_u64) {
            Some(v) if v == u64::from(SNAPSHOT_VERSION) => {}
            Some(v) => return Err(read_failed(format!("unsupported snapshot version {}", v))),
            None => return Err(read_failed("missing snapshot version".to_string())),
        }

        serde_json::from_value(value).map_err(|e| read_failed(e.to_string()))
    }
}

/// Writes files by rename so a destination is never left half-written
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &json)?;
        log::info!("Wrote snapshot with {} records to {}", snapshot.dataset.len(), self.path.display());
        Ok(())
    }
}

/// Replace `path` with `contents` in one rename.
///
/// On failure the previous file, if any, is untouched and the temporary file
/// is removed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let write_failed = |reason: String| WrapupError::WriteFailed { path: path.to_path_buf(), reason };

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| write_failed(e.to_string()))?;
    tmp.write_all(contents).map_err(|e| write_failed(e.to_string()))?;
    tmp.as_file().sync_all().map_err(|e| write_failed(e.to_string()))?;
    tmp.persist(path).map_err(|e| write_failed(e.error.to_string()))?;

    log::debug!("Atomically replaced {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::Merger;
    use crate::pipeline::SourceStatus;
    use crate::record::{Category, HistoryRecord, Source};
    use chrono::NaiveDate;

    fn dataset() -> MergedDataset {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        Merger::default().merge_all(vec![
            HistoryRecord::new("Dune", Category::Book, day, Source::Scraped).with_rating(Some(5)),
            HistoryRecord::new("Lunch Ride", Category::Activity, day, Source::Strava)
                .with_activity_type(Some("Ride".to_string()))
                .with_distance_km(Some(21.37)),
        ])
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let snapshot = Snapshot::new(dataset(), Some(2025))
            .with_sources(vec![SourceReport::loaded(Source::Scraped, 1, 0, 0)])
            .with_summary(Some("You read a lot.".to_string()));
        SnapshotWriter::new(&path).write(&snapshot).unwrap();

        let read = Snapshot::read(&path).unwrap();
        assert_eq!(read, snapshot);
        assert_eq!(read.sources[0].status, SourceStatus::Loaded);
    }

    #[test]
    fn test_failed_write_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let writer = SnapshotWriter::new(&path);

        let first = Snapshot::new(dataset(), None);
        writer.write(&first).unwrap();

        // A directory in the way of the rename makes persisting fail
        let blocked = dir.path().join("blocked");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("occupant"), b"x").unwrap();
        let err = SnapshotWriter::new(&blocked).write(&first).unwrap_err();
        assert!(matches!(err, WrapupError::WriteFailed { .. }));

        assert_eq!(Snapshot::read(&path).unwrap(), first);
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 2);
    }

    #[test]
    fn test_missing_parent_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("snapshot.json");

        let err = write_atomic(&path, b"{}").unwrap_err();
        assert!(matches!(err, WrapupError::WriteFailed { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, r#"{"version": 99}"#).unwrap();

        let err = Snapshot::read(&path).unwrap_err();
        assert!(matches!(err, WrapupError::SnapshotReadFailed(msg) if msg.contains("version 99")));
    }
}
