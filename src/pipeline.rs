//! One export run, end to end
//!
//! Authenticate and scrape, load both exports, merge, optionally summarize,
//! then write the snapshot. Session-level failures abort the run before
//! anything is written; a missing or unreadable export only drops that source.
//! The optional summary text file is written last and never fails the run.

use crate::auth::Authenticator;
use crate::browser::BrowserSession;
use crate::config::{Credentials, RunConfig};
use crate::deadline::Deadline;
use crate::error::{Result, WrapupError};
use crate::exports::{self, ExportFormat, LoadOptions};
use crate::inference::InferenceClient;
use crate::merge::{MergedDataset, Merger};
use crate::record::{HistoryRecord, RecordBounds, Source};
use crate::scrape::{BrowserListing, HistoryScraper, ScrapeOutcome};
use crate::snapshot::{write_atomic, Snapshot, SnapshotWriter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "state", content = "reason")]
pub enum SourceStatus {
    Loaded,
    /// Not configured for this run
    Skipped,
    /// Configured but unusable; the run went on without it
    Failed(String),
}

/// How one source fared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: Source,
    pub status: SourceStatus,
    pub records: usize,
    pub malformed: usize,
    pub filtered: usize,
}

impl SourceReport {
    pub fn loaded(source: Source, records: usize, malformed: usize, filtered: usize) -> Self {
        Self { source, status: SourceStatus::Loaded, records, malformed, filtered }
    }

    pub fn skipped(source: Source) -> Self {
        Self { source, status: SourceStatus::Skipped, records: 0, malformed: 0, filtered: 0 }
    }

    pub fn failed(source: Source, reason: impl Into<String>) -> Self {
        Self { source, status: SourceStatus::Failed(reason.into()), records: 0, malformed: 0, filtered: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Disabled,
    /// Summary requested but no access key was configured
    MissingKey,
    Generated,
    /// Generated and kept in the snapshot, but the text file could not be written
    NotSaved(String),
    Failed(String),
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snapshot_path: PathBuf,
    pub records: usize,
    pub sources: Vec<SourceReport>,
    pub summary: SummaryOutcome,
}

impl RunReport {
    pub fn malformed(&self) -> usize {
        self.sources.iter().map(|s| s.malformed).sum()
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| matches!(s.status, SourceStatus::Failed(_)))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Wrote {} records to {}", self.records, self.snapshot_path.display())?;
        for report in &self.sources {
            match &report.status {
                SourceStatus::Loaded => writeln!(
                    f,
                    "  {:<10} loaded  {} records, {} malformed, {} filtered",
                    report.source.as_str(),
                    report.records,
                    report.malformed,
                    report.filtered
                )?,
                SourceStatus::Skipped => writeln!(f, "  {:<10} skipped", report.source.as_str())?,
                SourceStatus::Failed(reason) => writeln!(f, "  {:<10} failed  {}", report.source.as_str(), reason)?,
            }
        }
        match &self.summary {
            SummaryOutcome::Disabled => write!(f, "Summary: disabled"),
            SummaryOutcome::MissingKey => write!(f, "Summary: skipped (no access key)"),
            SummaryOutcome::Generated => write!(f, "Summary: generated"),
            SummaryOutcome::NotSaved(reason) => write!(f, "Summary: generated, text file not written ({})", reason),
            SummaryOutcome::Failed(reason) => write!(f, "Summary: failed ({})", reason),
        }
    }
}

/// Load one export, turning source-level failures into a report.
///
/// Errors that are not source-level are returned and end the run.
pub fn load_source(
    format: ExportFormat,
    path: Option<&Path>,
    options: &LoadOptions,
) -> Result<(Vec<HistoryRecord>, SourceReport)> {
    let source = format.source();
    let Some(path) = path else {
        log::info!("No {} export configured", format);
        return Ok((Vec::new(), SourceReport::skipped(source)));
    };

    match exports::load_export(path, format, options) {
        Ok(loaded) => {
            log::info!(
                "Loaded {} {} records ({} malformed, {} filtered)",
                loaded.records.len(),
                format,
                loaded.malformed,
                loaded.filtered
            );
            let report = SourceReport::loaded(source, loaded.records.len(), loaded.malformed, loaded.filtered);
            Ok((loaded.records, report))
        }
        Err(e) if e.is_source_level() => {
            log::warn!("Skipping {} source: {}", format, e);
            Ok((Vec::new(), SourceReport::failed(source, e.to_string())))
        }
        Err(e) => Err(e),
    }
}

pub struct Pipeline {
    config: RunConfig,
    credentials: Option<Credentials>,
}

impl Pipeline {
    /// `credentials` need a login only when scraping is enabled
    pub fn new(config: RunConfig, credentials: Option<Credentials>) -> Self {
        Self { config, credentials }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunReport> {
        let deadline = Deadline::after(self.config.run_timeout);
        let options = LoadOptions { year: self.config.year, bounds: RecordBounds::up_to_today() };
        let mut sources = Vec::with_capacity(Source::ALL.len());

        let scraped = if self.config.skip_scrape {
            log::info!("Scraping disabled, building from exports only");
            sources.push(SourceReport::skipped(Source::Scraped));
            Vec::new()
        } else {
            let outcome = self.scrape(&deadline, options.bounds)?;
            let report = &outcome.report;
            sources.push(SourceReport::loaded(Source::Scraped, report.records, report.malformed, report.filtered));
            outcome.records
        };
        deadline.check()?;

        let (goodreads, report) =
            load_source(ExportFormat::Goodreads, self.config.exports.goodreads.as_deref(), &options)?;
        sources.push(report);
        let (strava, report) = load_source(ExportFormat::Strava, self.config.exports.strava.as_deref(), &options)?;
        sources.push(report);
        deadline.check()?;

        let dataset = Merger::new(self.config.merge.clone()).merge(scraped, goodreads, strava);

        let (summary_text, mut summary) = self.summarize(&dataset, &deadline);

        // Nothing is written once the budget is spent
        deadline.check()?;

        let records = dataset.len();
        let snapshot = Snapshot::new(dataset, self.config.year)
            .with_sources(sources.clone())
            .with_summary(summary_text.clone());
        SnapshotWriter::new(&self.config.snapshot_path).write(&snapshot)?;

        // The snapshot is already in place, so this can no longer fail the run
        if let (Some(path), Some(text)) = (&self.config.summary_path, &summary_text) {
            match write_atomic(path, text.as_bytes()) {
                Ok(()) => log::info!("Wrote summary to {}", path.display()),
                Err(e) => {
                    log::warn!("Summary kept in snapshot only: {}", e);
                    summary = SummaryOutcome::NotSaved(e.to_string());
                }
            }
        }

        Ok(RunReport { snapshot_path: self.config.snapshot_path.clone(), records, sources, summary })
    }

    /// Log in and walk the history listing.
    ///
    /// The browser session lives only inside this call and is released on
    /// every path out of it.
    fn scrape(&self, deadline: &Deadline, bounds: RecordBounds) -> Result<ScrapeOutcome> {
        let credentials = self.credentials.as_ref().filter(|c| c.has_login()).ok_or_else(|| {
            WrapupError::Config("library credentials are required unless scraping is skipped".to_string())
        })?;

        let session = BrowserSession::launch(self.config.launch.clone())?;
        Authenticator::new(self.config.login.clone()).login(&session, credentials)?;
        deadline.check()?;

        let scraper = HistoryScraper::new(self.config.scrape.clone()).with_year(self.config.year).with_bounds(bounds);
        let mut listing = BrowserListing::new(&session, &self.config.scrape);
        let outcome = scraper.scrape(&mut listing, deadline)?;

        log::info!(
            "Scraped {} records from {} pages ({:?})",
            outcome.report.records,
            outcome.report.pages,
            outcome.report.stop_reason
        );
        Ok(outcome)
    }

    /// Failures here never end the run
    fn summarize(&self, dataset: &MergedDataset, deadline: &Deadline) -> (Option<String>, SummaryOutcome) {
        let Some(config) = &self.config.inference else {
            return (None, SummaryOutcome::Disabled);
        };
        let Some(api_key) = self.credentials.as_ref().and_then(Credentials::api_key) else {
            log::warn!("No model access key configured, skipping summary");
            return (None, SummaryOutcome::MissingKey);
        };

        let mut config = config.clone();
        config.timeout = config.timeout.min(deadline.remaining());

        let result = InferenceClient::new(config, api_key)
            .and_then(|client| client.summarize(dataset.aggregates(), self.config.year));
        match result {
            Ok(text) => (Some(text), SummaryOutcome::Generated),
            Err(e) => {
                log::warn!("Summary generation failed: {}", e);
                (None, SummaryOutcome::Failed(e.to_string()))
            }
        }
    }
}
