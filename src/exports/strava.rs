use super::{ExportFormat, ExportParser, Row, RowOutcome};
use crate::record::{Category, HistoryRecord, Source, Status};
use chrono::{NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: [&str; 2] = ["%b %d, %Y, %I:%M:%S %p", "%Y-%m-%d %H:%M:%S"];

/// Keyword aliases for re-labelling generic workouts; later entries win
const TYPE_KEYWORDS: [(&str, &[&str]); 4] = [
    ("Tennis", &["tennis", "hit", "hitting"]),
    ("Basketball", &["basketball", "bball", "pickup"]),
    ("Volleyball", &["volleyball", "vball"]),
    ("Pickleball", &["pickleball", "pickle", "pb"]),
];

/// Strava bulk-export `activities.csv` (export-B).
///
/// Every row is a completed activity. The export repeats some header names
/// (`Distance`, `Elapsed Time`, `Max Speed`); the first, summary-unit column
/// is used. Speeds are read as km/h.
#[derive(Debug, Default, Clone, Copy)]
pub struct StravaParser;

pub fn parse_strava_date(value: &str) -> Option<NaiveDate> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|dt| dt.date())
        .or_else(|| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
}

/// Give generic workouts a sport from their name, e.g. "Sunday hit session" → Tennis
pub fn categorize_activity(activity_type: Option<&str>, name: &str) -> Option<String> {
    let generic = match activity_type {
        None => true,
        Some(t) => matches!(t.to_ascii_lowercase().as_str(), "workout" | "other" | ""),
    };
    if !generic {
        return activity_type.map(str::to_string);
    }

    let lower = name.to_lowercase();
    let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();

    TYPE_KEYWORDS
        .iter()
        .rev()
        .find(|(_, keywords)| keywords.iter().any(|k| words.contains(k)))
        .map(|(label, _)| label.to_string())
        .or_else(|| activity_type.map(str::to_string))
}

impl ExportParser for StravaParser {
    fn format(&self) -> ExportFormat {
        ExportFormat::Strava
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["Activity Date", "Activity Name"]
    }

    fn parse_row(&self, row: &Row<'_>) -> RowOutcome {
        let Some(raw_date) = row.get("Activity Date") else {
            return RowOutcome::Malformed("missing Activity Date".to_string());
        };
        let Some(date) = parse_strava_date(raw_date) else {
            return RowOutcome::Malformed(format!("unparsable Activity Date '{}'", raw_date));
        };
        let Some(name) = row.get("Activity Name") else {
            return RowOutcome::Malformed(format!("missing Activity Name on {}", date));
        };

        let elapsed = row.number("Elapsed Time").filter(|s| *s >= 0.0).map(|s| s.round() as u64);

        RowOutcome::Record(
            HistoryRecord::new(name, Category::Activity, date, Source::Strava)
                .with_status(Status::Completed)
                .with_activity_type(categorize_activity(row.get("Activity Type"), name))
                .with_distance_km(row.number("Distance"))
                .with_elapsed_secs(elapsed)
                .with_calories(row.number("Calories"))
                .with_speed_kmh(row.number("Average Speed"), row.number("Max Speed"))
                .with_elevation_gain_m(row.number("Elevation Gain"))
                .with_heart_rate(row.number("Average Heart Rate"), row.number("Max Heart Rate")),
        )
    }
}
