//! # wrapup
//!
//! A yearly wrap-up of reading and workouts. The crate logs into a library
//! account through Chrome DevTools Protocol (CDP), scrapes the checkout
//! history, merges it with Goodreads and Strava exports and writes one
//! versioned snapshot for a dashboard to read.
//!
//! ## Running
//!
//! ```bash
//! # Library login comes from USERNAME / PASSWORD (or a .env file)
//! cargo run -- --goodreads goodreads_library_export.csv --strava activities.csv --year 2025
//!
//! # Exports only, no browser
//! cargo run -- --no-scrape --goodreads goodreads_library_export.csv
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use wrapup::{Credentials, Pipeline, RunConfig};
//!
//! # fn main() -> wrapup::Result<()> {
//! let mut config = RunConfig::default();
//! config.year = Some(2025);
//! config.exports.goodreads = Some("goodreads_library_export.csv".into());
//!
//! let report = Pipeline::new(config, Some(Credentials::from_env()?)).run()?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```
//!
//! Merging works without a browser:
//!
//! ```rust,no_run
//! use std::path::Path;
//! use wrapup::exports::{load_export, ExportFormat, LoadOptions};
//! use wrapup::Merger;
//!
//! # fn main() -> wrapup::Result<()> {
//! let books = load_export(Path::new("goodreads.csv"), ExportFormat::Goodreads, &LoadOptions::default())?;
//! let runs = load_export(Path::new("activities.csv"), ExportFormat::Strava, &LoadOptions::default())?;
//!
//! let dataset = Merger::default().merge(Vec::new(), books.records, runs.records);
//! println!("{} records, {} per month", dataset.len(), dataset.aggregates().by_month.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`browser`]: Chrome session launch and lifetime
//! - [`tools`]: navigate / input / click / wait_for operations on the session
//! - [`dom`]: listing extraction from rendered history pages
//! - [`auth`]: login through the session
//! - [`scrape`]: paginated history scraping
//! - [`exports`]: Goodreads and Strava export loaders
//! - [`merge`] and [`stats`]: de-duplication, ordering and aggregates
//! - [`snapshot`]: atomic, versioned snapshot files
//! - [`inference`]: generated year-in-review text
//! - [`pipeline`]: one run, end to end

pub mod auth;
pub mod browser;
pub mod config;
pub mod deadline;
pub mod dom;
pub mod error;
pub mod exports;
pub mod inference;
pub mod merge;
pub mod pipeline;
pub mod record;
pub mod scrape;
pub mod snapshot;
pub mod stats;
pub mod tools;

pub use auth::{Authenticator, LoginConfig};
pub use browser::{BrowserSession, LaunchOptions};
pub use config::{Credentials, ExportPaths, RunConfig};
pub use error::{Result, WrapupError};
pub use merge::{MergePolicy, MergedDataset, Merger};
pub use pipeline::{Pipeline, RunReport, SourceReport, SourceStatus};
pub use record::{Category, HistoryRecord, Source, Status};
pub use scrape::{HistoryScraper, ScrapeConfig};
pub use snapshot::{Snapshot, SnapshotWriter};
pub use tools::{Tool, ToolContext, ToolRegistry, ToolResult};
