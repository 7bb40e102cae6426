//! The normalized history record every source is converted into

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of activity a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Book,
    Activity,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Book => "book",
            Category::Activity => "activity",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Completed,
    InProgress,
    CheckedOut,
    Returned,
    #[default]
    Unknown,
}

impl Status {
    pub fn is_known(&self) -> bool {
        !matches!(self, Status::Unknown)
    }
}

/// Where a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// Library checkout history scraped from the account pages
    Scraped,
    /// Goodreads library export (export-A)
    Goodreads,
    /// Strava activities export (export-B)
    Strava,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Scraped, Source::Goodreads, Source::Strava];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Scraped => "scraped",
            Source::Goodreads => "goodreads",
            Source::Strava => "strava",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scraped" | "library" => Ok(Source::Scraped),
            "goodreads" | "export-a" => Ok(Source::Goodreads),
            "strava" | "export-b" => Ok(Source::Strava),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

/// One activity entry: a checkout, a finished book, a workout.
///
/// `item_title`, `category` and `date` are always present; the rest is
/// whatever the source could provide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub item_title: String,
    pub category: Category,
    pub date: NaiveDate,
    #[serde(default)]
    pub status: Status,
    pub source: Source,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// 1-5 stars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_speed_kmh: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed_kmh: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_gain_m: Option<f64>,

    /// Beats per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_heart_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_heart_rate: Option<f64>,
}

impl HistoryRecord {
    pub fn new(item_title: impl Into<String>, category: Category, date: NaiveDate, source: Source) -> Self {
        Self {
            item_title: item_title.into().trim().to_string(),
            category,
            date,
            status: Status::Unknown,
            source,
            author: None,
            rating: None,
            pages: None,
            activity_type: None,
            distance_km: None,
            elapsed_secs: None,
            calories: None,
            avg_speed_kmh: None,
            max_speed_kmh: None,
            elevation_gain_m: None,
            avg_heart_rate: None,
            max_heart_rate: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
        self
    }

    pub fn with_rating(mut self, rating: Option<u8>) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_pages(mut self, pages: Option<u32>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_activity_type(mut self, activity_type: Option<String>) -> Self {
        self.activity_type = activity_type.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_distance_km(mut self, distance_km: Option<f64>) -> Self {
        self.distance_km = distance_km;
        self
    }

    pub fn with_elapsed_secs(mut self, elapsed_secs: Option<u64>) -> Self {
        self.elapsed_secs = elapsed_secs;
        self
    }

    pub fn with_calories(mut self, calories: Option<f64>) -> Self {
        self.calories = calories;
        self
    }

    /// Average and top speed, km/h
    pub fn with_speed_kmh(mut self, average: Option<f64>, max: Option<f64>) -> Self {
        self.avg_speed_kmh = average;
        self.max_speed_kmh = max;
        self
    }

    pub fn with_elevation_gain_m(mut self, elevation_gain_m: Option<f64>) -> Self {
        self.elevation_gain_m = elevation_gain_m;
        self
    }

    pub fn with_heart_rate(mut self, average: Option<f64>, max: Option<f64>) -> Self {
        self.avg_heart_rate = average;
        self.max_heart_rate = max;
        self
    }

    /// Number of populated optional fields; the merge keeps the record with more
    pub fn completeness(&self) -> usize {
        [
            self.status.is_known(),
            self.author.is_some(),
            self.rating.is_some(),
            self.pages.is_some(),
            self.activity_type.is_some(),
            self.distance_km.is_some(),
            self.elapsed_secs.is_some(),
            self.calories.is_some(),
            self.avg_speed_kmh.is_some(),
            self.max_speed_kmh.is_some(),
            self.elevation_gain_m.is_some(),
            self.avg_heart_rate.is_some(),
            self.max_heart_rate.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn identity(&self) -> IdentityKey {
        IdentityKey { date: self.date, title: normalize_title(&self.item_title), category: self.category }
    }
}

/// The tuple two records must share to describe the same event
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey {
    pub date: NaiveDate,
    pub title: String,
    pub category: Category,
}

/// Range of dates a record may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordBounds {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

impl RecordBounds {
    pub fn new(earliest: NaiveDate, latest: NaiveDate) -> Self {
        Self { earliest, latest }
    }

    /// 1900-01-01 up to the local date of the run
    pub fn up_to_today() -> Self {
        Self::up_to(Local::now().date_naive())
    }

    pub fn up_to(latest: NaiveDate) -> Self {
        let earliest = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN);
        Self { earliest, latest }
    }

    /// Why a record is unacceptable, if it is
    pub fn check(&self, record: &HistoryRecord) -> Result<(), String> {
        if record.item_title.trim().is_empty() {
            return Err("empty title".to_string());
        }
        if record.date < self.earliest {
            return Err(format!("date {} is before {}", record.date, self.earliest));
        }
        if record.date > self.latest {
            return Err(format!("date {} is in the future", record.date));
        }
        Ok(())
    }
}

impl Default for RecordBounds {
    fn default() -> Self {
        Self::up_to_today()
    }
}

/// Normalize a title so the same book matches across sources.
///
/// Lowercases, drops bracketed text, cuts subtitles, strips punctuation and
/// collapses whitespace. Falls back to the lowercased title when nothing
/// survives.
pub fn normalize_title(title: &str) -> String {
    let lower = title.trim().to_lowercase();

    let mut unbracketed = String::with_capacity(lower.len());
    let mut depth = 0usize;
    for c in lower.chars() {
        match c {
            '(' | '[' => {
                depth += 1;
                unbracketed.push(' ');
            }
            ')' | ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => unbracketed.push(c),
            _ => {}
        }
    }

    let mut cut = unbracketed.as_str();
    for sep in [":", " - ", " — ", "—"] {
        if let Some(idx) = cut.find(sep) {
            cut = &cut[..idx];
        }
    }

    let cleaned: String = cut
        .chars()
        .map(|c| if matches!(c, '.' | ',' | ';' | '!' | '?' | '\'' | '"' | '’') { ' ' } else { c })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        lower.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        collapsed
    }
}

/// Similarity of two titles in `0.0..=1.0`: one minus the edit distance over
/// the longer length. Compares titles as given, so normalize first.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / longest as f64
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current[j + 1] = (previous[j + 1] + 1).min(current[j] + 1).min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("Dune"), "dune");
        assert_eq!(normalize_title("  Dune (Dune Chronicles, #1) "), "dune");
        assert_eq!(normalize_title("Sapiens: A Brief History of Humankind"), "sapiens");
        assert_eq!(normalize_title("The Left Hand of Darkness [Large Print]"), "the left hand of darkness");
        assert_eq!(normalize_title("Why We Sleep — Unlocking the Power"), "why we sleep");
        assert_eq!(normalize_title("Don't Look Up!"), "don t look up");
        assert_eq!(normalize_title("Spider-Man"), "spider-man");
        assert_eq!(normalize_title("Catch-22 - A Novel"), "catch-22");
    }

    #[test]
    fn test_title_similarity() {
        assert_eq!(title_similarity("dune", "dune"), 1.0);
        assert_eq!(title_similarity("", ""), 1.0);
        assert_eq!(title_similarity("kitten", "sitting"), 1.0 - 3.0 / 7.0);
        assert!(title_similarity("the left hand of darknes", "the left hand of darkness") >= 0.9);
        assert!(title_similarity("dune", "dunk") < 0.9);
        assert!(title_similarity("über", "uber") > 0.7);
    }

    #[test]
    fn test_normalize_title_fallback() {
        assert_eq!(normalize_title("(Untitled)"), "(untitled)");
        assert_eq!(normalize_title(": Subtitle Only"), ": subtitle only");
    }

    #[test]
    fn test_identity_ignores_title_noise() {
        let a = HistoryRecord::new("Dune", Category::Book, date(2024, 3, 1), Source::Goodreads);
        let b = HistoryRecord::new("DUNE (Deluxe Edition)", Category::Book, date(2024, 3, 1), Source::Scraped);
        let c = HistoryRecord::new("Dune", Category::Activity, date(2024, 3, 1), Source::Strava);

        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), c.identity());
    }

    #[test]
    fn test_completeness() {
        let bare = HistoryRecord::new("Dune", Category::Book, date(2024, 3, 1), Source::Goodreads);
        assert_eq!(bare.completeness(), 0);

        let rich = bare
            .clone()
            .with_status(Status::Returned)
            .with_author(Some("Frank Herbert".to_string()))
            .with_rating(Some(5));
        assert_eq!(rich.completeness(), 3);

        let blank_author = bare.with_author(Some("   ".to_string()));
        assert_eq!(blank_author.author, None);
    }

    #[test]
    fn test_bounds_check() {
        let bounds = RecordBounds::up_to(date(2025, 6, 30));

        let ok = HistoryRecord::new("Dune", Category::Book, date(2025, 6, 30), Source::Scraped);
        assert!(bounds.check(&ok).is_ok());

        let future = HistoryRecord::new("Dune", Category::Book, date(2025, 7, 1), Source::Scraped);
        assert!(bounds.check(&future).unwrap_err().contains("future"));

        let ancient = HistoryRecord::new("Dune", Category::Book, date(1850, 1, 1), Source::Scraped);
        assert!(bounds.check(&ancient).is_err());

        let untitled = HistoryRecord::new("  ", Category::Book, date(2025, 1, 1), Source::Scraped);
        assert_eq!(bounds.check(&untitled).unwrap_err(), "empty title");
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!("scraped".parse::<Source>().unwrap(), Source::Scraped);
        assert_eq!("Export-A".parse::<Source>().unwrap(), Source::Goodreads);
        assert_eq!("strava".parse::<Source>().unwrap(), Source::Strava);
        assert!("kindle".parse::<Source>().is_err());
    }

    #[test]
    fn test_record_serialization_skips_empty_fields() {
        let record = HistoryRecord::new("Morning Run", Category::Activity, date(2025, 1, 5), Source::Strava)
            .with_status(Status::Completed)
            .with_distance_km(Some(5.2));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["category"], "activity");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["source"], "strava");
        assert_eq!(json["date"], "2025-01-05");
        assert!(json.get("author").is_none());
        assert!(json.get("max_heart_rate").is_none());
    }

    #[test]
    fn test_workout_metrics_count_towards_completeness() {
        let run = HistoryRecord::new("Morning Run", Category::Activity, date(2025, 1, 5), Source::Strava)
            .with_speed_kmh(Some(10.4), Some(16.0))
            .with_elevation_gain_m(Some(42.0))
            .with_heart_rate(Some(150.0), None);

        assert_eq!(run.completeness(), 4);
    }
}
