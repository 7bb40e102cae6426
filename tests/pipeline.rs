use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;
use wrapup::exports::{load_export, ExportFormat, LoadOptions};
use wrapup::inference::InferenceConfig;
use wrapup::pipeline::SummaryOutcome;
use wrapup::{Category, Credentials, Merger, Pipeline, RunConfig, Snapshot, Source, SourceStatus, WrapupError};

const GOODREADS: &str = "\
Book Id,Title,Author,My Rating,Number of Pages,Date Read,Date Added,Exclusive Shelf
1,Dune,Frank Herbert,5,412,2025/03/01,2025/01/02,read
2,Dune,Frank Herbert,5,412,2025/03/01,2025/01/02,read
3,Piranesi,Susanna Clarke,4,272,2025/05/20,2025/04/01,read
4,Circe,Madeline Miller,0,393,,2025/06/01,currently-reading
5,Anathem,Neal Stephenson,0,937,,2025/02/01,to-read
6,Broken,Nobody,3,100,yesterday,,read
7,Old News,Somebody,3,200,2023/07/04,2023/07/01,read
";

const STRAVA: &str = "\
Activity ID,Activity Date,Activity Name,Activity Type,Elapsed Time,Distance,Calories
101,\"Jan 5, 2025, 7:30:12 AM\",Morning Run,Run,1800,5.20,320
102,\"Feb 9, 2025, 6:02:00 PM\",Sunday hit session,Workout,3600,0,450
103,not a date,Broken,Run,100,1.0,10
";

fn write_export(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("Failed to write fixture");
    path
}

fn exports_only(dir: &Path) -> RunConfig {
    RunConfig {
        skip_scrape: true,
        inference: None,
        snapshot_path: dir.join("snapshot.json"),
        ..RunConfig::default()
    }
}

/// Answer one chat-completions request with `text`; returns the endpoint URL
fn serve_completion(text: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
    let body = serde_json::json!({ "choices": [{ "message": { "role": "assistant", "content": text } }] }).to_string();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
    });

    endpoint
}

fn with_summary(dir: &Path, endpoint: String, summary_path: PathBuf) -> RunConfig {
    let mut config = exports_only(dir);
    config.inference = Some(InferenceConfig { endpoint, ..InferenceConfig::default() });
    config.summary_path = Some(summary_path);
    config.exports.strava = Some(write_export(dir, "activities.csv", STRAVA));
    config
}

#[test]
fn test_missing_export_still_produces_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = exports_only(dir.path());
    config.exports.goodreads = Some(write_export(dir.path(), "goodreads.csv", GOODREADS));
    config.exports.strava = Some(dir.path().join("activities.csv"));

    let report = Pipeline::new(config, None).run().expect("Run should survive a missing export");

    // Dune appears twice with the same identity
    assert_eq!(report.records, 4);
    assert_eq!(report.sources[0].status, SourceStatus::Skipped);
    assert_eq!(report.sources[1].source, Source::Goodreads);
    assert_eq!(report.sources[1].records, 5);
    assert_eq!(report.sources[1].malformed, 1);
    assert_eq!(report.sources[1].filtered, 1);
    assert!(matches!(&report.sources[2].status, SourceStatus::Failed(reason) if reason.contains("activities.csv")));

    let snapshot = Snapshot::read(&report.snapshot_path).unwrap();
    assert_eq!(snapshot.dataset.len(), 4);
    assert_eq!(snapshot.sources, report.sources);
    assert_eq!(snapshot.summary, None);
}

#[test]
fn test_record_count_is_sum_of_unique_contributions() {
    let dir = tempfile::tempdir().unwrap();
    let goodreads = write_export(dir.path(), "goodreads.csv", GOODREADS);
    let strava = write_export(dir.path(), "activities.csv", STRAVA);

    let options = LoadOptions::default();
    let books = load_export(&goodreads, ExportFormat::Goodreads, &options).unwrap();
    let workouts = load_export(&strava, ExportFormat::Strava, &options).unwrap();
    let unique_books = Merger::default().merge_all(books.records).len();
    let unique_workouts = Merger::default().merge_all(workouts.records).len();

    let mut config = exports_only(dir.path());
    config.exports.goodreads = Some(goodreads);
    config.exports.strava = Some(strava);
    let report = Pipeline::new(config, None).run().unwrap();

    assert_eq!(report.records, unique_books + unique_workouts);
    assert_eq!(report.records, 6);
    assert_eq!(report.malformed(), 2);
    assert_eq!(report.failed_sources().count(), 0);
}

#[test]
fn test_snapshot_matches_in_memory_merge() {
    let dir = tempfile::tempdir().unwrap();
    let goodreads = write_export(dir.path(), "goodreads.csv", GOODREADS);
    let strava = write_export(dir.path(), "activities.csv", STRAVA);

    let options = LoadOptions::default();
    let expected = Merger::default().merge(
        Vec::new(),
        load_export(&goodreads, ExportFormat::Goodreads, &options).unwrap().records,
        load_export(&strava, ExportFormat::Strava, &options).unwrap().records,
    );

    let mut config = exports_only(dir.path());
    config.exports.goodreads = Some(goodreads);
    config.exports.strava = Some(strava);
    let report = Pipeline::new(config, None).run().unwrap();

    let snapshot = Snapshot::read(&report.snapshot_path).unwrap();
    assert_eq!(snapshot.dataset, expected);

    let dates: Vec<_> = snapshot.dataset.records().iter().map(|r| r.date).collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);
}

#[test]
fn test_year_window_filters_exports() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = exports_only(dir.path());
    config.year = Some(2023);
    config.exports.goodreads = Some(write_export(dir.path(), "goodreads.csv", GOODREADS));
    config.exports.strava = Some(write_export(dir.path(), "activities.csv", STRAVA));

    let report = Pipeline::new(config, None).run().unwrap();
    let snapshot = Snapshot::read(&report.snapshot_path).unwrap();

    assert_eq!(report.records, 1);
    assert_eq!(snapshot.year, Some(2023));
    assert_eq!(snapshot.dataset.records()[0].item_title, "Old News");
    assert_eq!(snapshot.dataset.aggregates().by_category.get(&Category::Book), Some(&1));
}

#[test]
fn test_wrong_format_skips_only_that_source() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = exports_only(dir.path());
    // A Strava file handed in as the Goodreads export
    config.exports.goodreads = Some(write_export(dir.path(), "goodreads.csv", STRAVA));
    config.exports.strava = Some(write_export(dir.path(), "activities.csv", STRAVA));

    let report = Pipeline::new(config, None).run().unwrap();

    assert!(matches!(&report.sources[1].status, SourceStatus::Failed(reason) if reason.contains("missing required columns")));
    assert_eq!(report.sources[2].status, SourceStatus::Loaded);
    assert_eq!(report.records, 2);
}

#[test]
fn test_missing_access_key_still_writes_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = exports_only(dir.path());
    config.inference = Some(Default::default());
    config.summary_path = Some(dir.path().join("summary.txt"));
    config.exports.strava = Some(write_export(dir.path(), "activities.csv", STRAVA));

    let report = Pipeline::new(config, None).run().unwrap();

    assert_eq!(report.summary, SummaryOutcome::MissingKey);
    assert!(report.snapshot_path.exists());
    assert!(!dir.path().join("summary.txt").exists());
}

#[test]
fn test_failed_write_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let strava = write_export(dir.path(), "activities.csv", STRAVA);

    let mut config = exports_only(dir.path());
    config.exports.strava = Some(strava.clone());
    let first = Pipeline::new(config.clone(), None).run().unwrap();
    let before = fs::read_to_string(&first.snapshot_path).unwrap();

    config.snapshot_path = dir.path().join("missing").join("snapshot.json");
    let err = Pipeline::new(config, None).run().unwrap_err();

    assert!(matches!(err, WrapupError::WriteFailed { .. }));
    assert_eq!(fs::read_to_string(&first.snapshot_path).unwrap(), before);
}

#[test]
fn test_exhausted_budget_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = exports_only(dir.path());
    config.run_timeout = std::time::Duration::ZERO;
    config.exports.strava = Some(write_export(dir.path(), "activities.csv", STRAVA));

    let err = Pipeline::new(config, None).run().unwrap_err();

    assert!(matches!(err, WrapupError::Timeout(_)));
    assert!(!dir.path().join("snapshot.json").exists());
}

#[test]
fn test_generated_summary_lands_in_snapshot_and_text_file() {
    let dir = tempfile::tempdir().unwrap();
    let endpoint = serve_completion("You saved $0 and ran 3 miles!");
    let summary_path = dir.path().join("summary.txt");
    let config = with_summary(dir.path(), endpoint, summary_path.clone());

    let report = Pipeline::new(config, Some(Credentials::key_only(Some("sk-test".to_string())))).run().unwrap();

    assert_eq!(report.summary, SummaryOutcome::Generated);
    let snapshot = Snapshot::read(&report.snapshot_path).unwrap();
    assert_eq!(snapshot.summary.as_deref(), Some("You saved $0 and ran 3 miles!"));
    assert_eq!(fs::read_to_string(&summary_path).unwrap(), "You saved $0 and ran 3 miles!");
}

#[test]
fn test_unwritable_summary_file_keeps_run_and_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let endpoint = serve_completion("Great year!");
    let summary_path = dir.path().join("missing").join("summary.txt");
    let config = with_summary(dir.path(), endpoint, summary_path.clone());

    let report = Pipeline::new(config, Some(Credentials::key_only(Some("sk-test".to_string()))))
        .run()
        .expect("A summary file failure must not fail the run");

    assert!(matches!(&report.summary, SummaryOutcome::NotSaved(reason) if reason.contains("summary.txt")));
    assert!(!summary_path.exists());
    let snapshot = Snapshot::read(&report.snapshot_path).unwrap();
    assert_eq!(snapshot.summary.as_deref(), Some("Great year!"));
    assert_eq!(snapshot.dataset.len(), 2);
}
