use super::{ExportFormat, ExportParser, Row, RowOutcome};
use crate::record::{Category, HistoryRecord, Source, Status};
use chrono::NaiveDate;

const DATE_FORMATS: [&str; 3] = ["%Y/%m/%d", "%Y-%m-%d", "%m/%d/%Y"];

/// Goodreads library export (export-A).
///
/// `read` shelf entries become completed books dated by `Date Read`;
/// `currently-reading` entries become in-progress books, dated by `Date Added`
/// when no read date exists. Every other shelf is filtered out.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoodreadsParser;

impl GoodreadsParser {
    fn shelf_status(shelf: &str) -> Option<Status> {
        match shelf.to_ascii_lowercase().as_str() {
            "read" => Some(Status::Completed),
            "currently-reading" => Some(Status::InProgress),
            _ => None,
        }
    }
}

pub fn parse_goodreads_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter().find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

impl ExportParser for GoodreadsParser {
    fn format(&self) -> ExportFormat {
        ExportFormat::Goodreads
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["Title", "Exclusive Shelf"]
    }

    fn parse_row(&self, row: &Row<'_>) -> RowOutcome {
        let Some(title) = row.get("Title") else {
            return RowOutcome::Malformed("missing Title".to_string());
        };
        let Some(shelf) = row.get("Exclusive Shelf") else {
            return RowOutcome::Malformed(format!("missing Exclusive Shelf for '{}'", title));
        };
        let Some(status) = Self::shelf_status(shelf) else {
            return RowOutcome::Filtered;
        };

        let raw_date = match status {
            Status::InProgress => row.get("Date Read").or_else(|| row.get("Date Added")),
            _ => row.get("Date Read"),
        };
        let Some(raw_date) = raw_date else {
            return RowOutcome::Malformed(format!("missing Date Read for '{}'", title));
        };
        let Some(date) = parse_goodreads_date(raw_date) else {
            return RowOutcome::Malformed(format!("unparsable date '{}' for '{}'", raw_date, title));
        };

        // Goodreads writes 0 for unrated books
        let rating = row.number("My Rating").map(|r| r as u8).filter(|r| (1..=5).contains(r));
        let pages = row.number("Number of Pages").filter(|p| *p > 0.0).map(|p| p as u32);

        RowOutcome::Record(
            HistoryRecord::new(title, Category::Book, date, Source::Goodreads)
                .with_status(status)
                .with_author(row.get("Author").map(str::to_string))
                .with_rating(rating)
                .with_pages(pages),
        )
    }
}
