//! Aggregate statistics derived from the merged records

use crate::record::{normalize_title, Category, HistoryRecord, Source};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Assumed retail price of a library book
pub const BOOK_PRICE_USD: f64 = 23.0;

const KM_TO_MILES: f64 = 0.621371;
const TOP_AUTHORS: usize = 5;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongestBook {
    pub title: String,
    pub pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorCount {
    pub author: String,
    pub books: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BookStats {
    pub count: usize,
    pub average_rating: Option<f64>,
    pub total_pages: u64,
    pub longest: Option<LongestBook>,
    pub top_authors: Vec<AuthorCount>,
}

impl BookStats {
    /// One record per normalized title, the most complete one; a checkout and
    /// the matching Goodreads read count as a single book
    pub fn distinct<'a>(books: impl IntoIterator<Item = &'a HistoryRecord>) -> Vec<&'a HistoryRecord> {
        let mut by_title: BTreeMap<String, &HistoryRecord> = BTreeMap::new();
        for book in books {
            by_title
                .entry(normalize_title(&book.item_title))
                .and_modify(|kept| {
                    if book.completeness() > kept.completeness() {
                        *kept = book;
                    }
                })
                .or_insert(book);
        }
        by_title.into_values().collect()
    }

    pub fn compute<'a>(books: impl IntoIterator<Item = &'a HistoryRecord>) -> Self {
        let mut stats = BookStats::default();
        let mut rating_sum = 0u32;
        let mut rated = 0u32;
        let mut authors: BTreeMap<&str, usize> = BTreeMap::new();

        for book in books {
            stats.count += 1;
            if let Some(rating) = book.rating {
                rating_sum += u32::from(rating);
                rated += 1;
            }
            if let Some(pages) = book.pages {
                stats.total_pages += u64::from(pages);
                if stats.longest.as_ref().is_none_or(|longest| pages > longest.pages) {
                    stats.longest = Some(LongestBook { title: book.item_title.clone(), pages });
                }
            }
            if let Some(author) = book.author.as_deref() {
                *authors.entry(author).or_default() += 1;
            }
        }

        if rated > 0 {
            stats.average_rating = Some(round2(f64::from(rating_sum) / f64::from(rated)));
        }

        let mut ranked: Vec<(&str, usize)> = authors.into_iter().collect();
        // BTreeMap order makes the name tie-break alphabetical
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        stats.top_authors = ranked
            .into_iter()
            .take(TOP_AUTHORS)
            .map(|(author, books)| AuthorCount { author: author.to_string(), books })
            .collect();

        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ActivityStats {
    pub count: usize,
    pub total_distance_miles: f64,
    pub average_distance_miles: f64,
    pub longest_distance_miles: f64,
    pub longest_activity: Option<String>,
    pub total_hours: f64,
    pub total_calories: f64,
    pub by_type_counts: BTreeMap<String, usize>,
    pub by_type_distance_miles: BTreeMap<String, f64>,

    /// Keyed by `YYYY-MM`, then activity type
    pub by_month_by_type: BTreeMap<String, BTreeMap<String, usize>>,

    pub avg_speed_mph: Option<f64>,
    pub max_speed_mph: Option<f64>,
    pub total_elevation_gain_m: f64,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
}

impl ActivityStats {
    pub fn compute<'a>(activities: impl IntoIterator<Item = &'a HistoryRecord>) -> Self {
        let mut stats = ActivityStats::default();
        let mut total_km = 0.0;
        let mut with_distance = 0usize;
        let mut longest_km = 0.0;
        let mut total_secs = 0u64;
        let mut by_type_km: BTreeMap<String, f64> = BTreeMap::new();
        let mut avg_speeds = Vec::new();
        let mut max_speeds = Vec::new();
        let mut avg_heart_rates = Vec::new();
        let mut max_heart_rates = Vec::new();
        let mut elevation_m = 0.0;

        for activity in activities {
            stats.count += 1;
            let kind = activity.activity_type.clone().unwrap_or_else(|| "Unknown".to_string());
            *stats.by_type_counts.entry(kind.clone()).or_default() += 1;
            *stats
                .by_month_by_type
                .entry(activity.date.format("%Y-%m").to_string())
                .or_default()
                .entry(kind.clone())
                .or_default() += 1;

            avg_speeds.extend(activity.avg_speed_kmh);
            max_speeds.extend(activity.max_speed_kmh);
            avg_heart_rates.extend(activity.avg_heart_rate);
            max_heart_rates.extend(activity.max_heart_rate);
            elevation_m += activity.elevation_gain_m.unwrap_or(0.0);

            if let Some(km) = activity.distance_km {
                total_km += km;
                with_distance += 1;
                *by_type_km.entry(kind).or_default() += km;
                if km > longest_km {
                    longest_km = km;
                    stats.longest_activity = Some(activity.item_title.clone());
                }
            }
            total_secs += activity.elapsed_secs.unwrap_or(0);
            stats.total_calories += activity.calories.unwrap_or(0.0);
        }

        stats.total_distance_miles = round2(total_km * KM_TO_MILES);
        if with_distance > 0 {
            stats.average_distance_miles = round2(total_km / with_distance as f64 * KM_TO_MILES);
        }
        stats.longest_distance_miles = round2(longest_km * KM_TO_MILES);
        stats.total_hours = round2(total_secs as f64 / 3600.0);
        stats.total_calories = stats.total_calories.round();
        stats.by_type_distance_miles =
            by_type_km.into_iter().map(|(kind, km)| (kind, round2(km * KM_TO_MILES))).collect();
        stats.avg_speed_mph = mean(&avg_speeds).map(|kmh| round2(kmh * KM_TO_MILES));
        stats.max_speed_mph = max(&max_speeds).map(|kmh| round2(kmh * KM_TO_MILES));
        stats.total_elevation_gain_m = elevation_m.round();
        stats.avg_heart_rate = mean(&avg_heart_rates).map(round1);
        stats.max_heart_rate = max(&max_heart_rates).map(f64::round);

        stats
    }
}

/// What borrowing instead of buying was worth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LibraryStats {
    pub checkouts: usize,
    pub estimated_savings_usd: f64,
}

/// Read-only summary attached to a merged dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Aggregates {
    pub total: usize,

    /// Keyed by `YYYY-MM`
    pub by_month: BTreeMap<String, usize>,
    pub by_category: BTreeMap<Category, usize>,
    pub by_month_by_category: BTreeMap<String, BTreeMap<Category, usize>>,
    pub by_source: BTreeMap<Source, usize>,

    pub books: BookStats,
    pub activities: ActivityStats,
    pub library: LibraryStats,
}

impl Aggregates {
    pub fn compute(records: &[HistoryRecord]) -> Self {
        let mut aggregates = Aggregates { total: records.len(), ..Default::default() };

        for record in records {
            let month = record.date.format("%Y-%m").to_string();
            *aggregates.by_month.entry(month.clone()).or_default() += 1;
            *aggregates.by_category.entry(record.category).or_default() += 1;
            *aggregates.by_month_by_category.entry(month).or_default().entry(record.category).or_default() += 1;
            *aggregates.by_source.entry(record.source).or_default() += 1;
        }

        let books = BookStats::distinct(records.iter().filter(|r| r.category == Category::Book));
        aggregates.books = BookStats::compute(books);
        aggregates.activities = ActivityStats::compute(records.iter().filter(|r| r.category == Category::Activity));

        let checkouts = records.iter().filter(|r| r.source == Source::Scraped).count();
        aggregates.library =
            LibraryStats { checkouts, estimated_savings_usd: round2(checkouts as f64 * BOOK_PRICE_USD) };

        aggregates
    }
}
