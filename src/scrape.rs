//! History scraping
//!
//! Walks the paginated checkout history of an authenticated session and turns
//! every listed entry into a [`HistoryRecord`]. Pages are fetched one at a
//! time through a [`ListingSource`], newest first.

use crate::browser::BrowserSession;
use crate::deadline::Deadline;
use crate::dom::{self, ListingItem, ListingPage, ListingSelectors};
use crate::error::{Result, WrapupError};
use crate::record::{Category, HistoryRecord, RecordBounds, Source, Status};
use crate::tools::utils::page_url;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Title recorded for entries whose title could not be read
pub const UNKNOWN_TITLE: &str = "(unknown title)";

const CHECKOUT_PHRASES: [&str; 2] = ["checked out on", "borrowed on"];
const RETURN_PHRASES: [&str; 2] = ["returned on", "returned"];

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Listing URL; `{page}` is replaced by the 1-based page number
    pub history_url: String,

    pub selectors: ListingSelectors,

    /// Hard cap on pages requested in one run
    pub max_pages: u32,

    /// Loads of one page before an unexpected structure is fatal
    pub max_attempts: u32,

    pub retry_delay: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            history_url: "https://sfpl.bibliocommons.com/v2/recentlyreturned?page={page}".to_string(),
            selectors: ListingSelectors::default(),
            max_pages: 100,
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Anything that can produce rendered history pages
pub trait ListingSource {
    /// Load page `page` (1-based) and read its listing
    fn fetch_page(&mut self, page: u32) -> Result<ListingPage>;
}

/// [`ListingSource`] backed by the session tab
pub struct BrowserListing<'a> {
    session: &'a BrowserSession,
    config: &'a ScrapeConfig,
}

impl<'a> BrowserListing<'a> {
    pub fn new(session: &'a BrowserSession, config: &'a ScrapeConfig) -> Self {
        Self { session, config }
    }
}

impl ListingSource for BrowserListing<'_> {
    fn fetch_page(&mut self, page: u32) -> Result<ListingPage> {
        let url = page_url(&self.config.history_url, page);
        log::debug!("Loading history page {} ({})", page, url);

        self.session.navigate(&url)?;
        self.session.wait_for_navigation()?;

        dom::extract_listing(self.session, &self.config.selectors)
    }
}

/// Why pagination ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// A page brought no entries that had not been seen already
    NoNewItems,
    /// A page had new entries but none of them became a record or fell outside the year
    NoNewRecords,
    /// The page signalled that nothing follows it
    EndOfResults,
    /// An entry older than the requested year was reached
    ReachedOlderYear,
    PageLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeReport {
    pub pages: u32,
    pub items_seen: usize,
    pub records: usize,
    /// Entries without a usable date, or rejected by the record bounds
    pub malformed: usize,
    /// Entries outside the requested year
    pub filtered: usize,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub records: Vec<HistoryRecord>,
    pub report: ScrapeReport,
}

enum Conversion {
    Record(HistoryRecord),
    Filtered,
    OlderThanWindow,
    Malformed(String),
}

pub struct HistoryScraper {
    config: ScrapeConfig,
    year: Option<i32>,
    bounds: RecordBounds,
}

impl HistoryScraper {
    pub fn new(config: ScrapeConfig) -> Self {
        Self { config, year: None, bounds: RecordBounds::default() }
    }

    /// Keep entries from `year` only, and stop at the first older one
    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn with_bounds(mut self, bounds: RecordBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Collect records page by page until the listing runs out
    pub fn scrape<S: ListingSource>(&self, source: &mut S, deadline: &Deadline) -> Result<ScrapeOutcome> {
        let mut records = Vec::new();
        let mut seen: HashSet<(Option<String>, String)> = HashSet::new();
        let mut report = ScrapeReport {
            pages: 0,
            items_seen: 0,
            records: 0,
            malformed: 0,
            filtered: 0,
            stop_reason: StopReason::PageLimit,
        };

        let mut page_no = 1;
        while page_no <= self.config.max_pages {
            deadline.check()?;

            let page = self.fetch_matching(source, page_no)?;
            report.pages += 1;

            let fresh: Vec<ListingItem> =
                page.items.into_iter().filter(|item| seen.insert((item.title.clone(), item.text.clone()))).collect();
            log::info!("History page {}: {} new entries", page_no, fresh.len());

            if fresh.is_empty() {
                report.stop_reason = StopReason::NoNewItems;
                break;
            }

            let usable_before = records.len() + report.filtered;
            let mut reached_older = false;
            for item in fresh {
                report.items_seen += 1;
                match self.convert(item) {
                    Conversion::Record(record) => records.push(record),
                    Conversion::Filtered => report.filtered += 1,
                    Conversion::Malformed(reason) => {
                        log::warn!("Skipping history entry on page {}: {}", page_no, reason);
                        report.malformed += 1;
                    }
                    Conversion::OlderThanWindow => {
                        reached_older = true;
                        break;
                    }
                }
            }

            if reached_older {
                report.stop_reason = StopReason::ReachedOlderYear;
                break;
            }
            if page.end_of_results {
                report.stop_reason = StopReason::EndOfResults;
                break;
            }
            if records.len() + report.filtered == usable_before {
                log::warn!("History page {} yielded no usable entries, stopping", page_no);
                report.stop_reason = StopReason::NoNewRecords;
                break;
            }
            page_no += 1;
        }

        report.records = records.len();
        log::info!(
            "Scraped {} records from {} pages ({} malformed, {} outside window)",
            report.records,
            report.pages,
            report.malformed,
            report.filtered
        );

        Ok(ScrapeOutcome { records, report })
    }

    fn fetch_matching<S: ListingSource>(&self, source: &mut S, page_no: u32) -> Result<ListingPage> {
        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            let page = source.fetch_page(page_no)?;
            if page.matched {
                return Ok(page);
            }

            log::warn!("History page {} has an unexpected structure (attempt {}/{})", page_no, attempt, attempts);
            if attempt < attempts {
                std::thread::sleep(self.config.retry_delay);
            }
        }

        Err(WrapupError::ScrapeFailed(format!(
            "page {} did not match the expected listing structure after {} attempts",
            page_no, attempts
        )))
    }

    fn convert(&self, item: ListingItem) -> Conversion {
        let date = match find_date(&item.text, &CHECKOUT_PHRASES).or_else(|| find_date(&item.text, &RETURN_PHRASES)) {
            Some(date) => date,
            None => return Conversion::Malformed(format!("no checkout date in {:?}", item.text)),
        };

        if let Some(year) = self.year {
            if date.year() > year {
                return Conversion::Filtered;
            }
            if date.year() < year {
                return Conversion::OlderThanWindow;
            }
        }

        let status = classify_status(item.status.as_deref().unwrap_or(&item.text));
        let title = item.title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let record = HistoryRecord::new(title, Category::Book, date, Source::Scraped)
            .with_status(status)
            .with_author(item.author);

        match self.bounds.check(&record) {
            Ok(()) => Conversion::Record(record),
            Err(reason) => Conversion::Malformed(reason),
        }
    }
}

/// Parse the date that follows the first of `phrases` found in `text`,
/// e.g. `Checked out on: Nov 10, 2025`
pub fn find_date(text: &str, phrases: &[&str]) -> Option<NaiveDate> {
    let lower = text.to_ascii_lowercase();

    phrases.iter().find_map(|phrase| {
        let idx = lower.find(phrase)?;
        let rest = text[idx + phrase.len()..].trim_start_matches(|c: char| c == ':' || c.is_whitespace());
        parse_listing_date(rest)
    })
}

fn parse_listing_date(rest: &str) -> Option<NaiveDate> {
    let tokens: Vec<&str> = rest.split_whitespace().take(3).collect();
    if tokens.len() < 3 {
        return None;
    }

    let year = tokens[2].trim_end_matches(|c: char| !c.is_ascii_digit());
    let candidate = format!("{} {} {}", tokens[0], tokens[1].trim_end_matches(','), year);

    NaiveDate::parse_from_str(&candidate, "%b %d %Y").ok()
}

/// Read a checkout status out of free text
pub fn classify_status(text: &str) -> Status {
    let lower = text.to_ascii_lowercase();
    if lower.contains("returned") {
        Status::Returned
    } else if lower.contains("due") || lower.contains("checked out") {
        Status::CheckedOut
    } else {
        Status::Unknown
    }
}
