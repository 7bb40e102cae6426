//! wrapup command line
//!
//! Runs one export: scrape the library history, merge it with the export
//! files and write the snapshot the dashboard reads.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use wrapup::{Credentials, MergePolicy, Pipeline, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "wrapup", version, about = "Build a yearly reading and activity snapshot")]
struct Cli {
    /// Goodreads library export (CSV)
    #[arg(long, env = "GOODREADS_EXPORT")]
    goodreads: Option<PathBuf>,

    /// Strava activities export (CSV)
    #[arg(long, env = "STRAVA_EXPORT")]
    strava: Option<PathBuf>,

    /// Only keep records from this calendar year
    #[arg(long)]
    year: Option<i32>,

    /// Snapshot destination
    #[arg(short, long, default_value = "wrapup_snapshot.json")]
    output: PathBuf,

    /// Also write the generated summary to this text file
    #[arg(long)]
    summary_output: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// Build from the export files only
    #[arg(long)]
    no_scrape: bool,

    /// Skip the generated summary
    #[arg(long)]
    no_summary: bool,

    /// Merge tie-break order, e.g. `goodreads,scraped,strava`
    #[arg(long)]
    priority: Option<MergePolicy>,

    /// Abort the run after this many seconds
    #[arg(long, default_value_t = 900)]
    timeout_secs: u64,

    #[arg(long)]
    max_pages: Option<u32>,

    /// History listing URL with a `{page}` placeholder
    #[arg(long)]
    history_url: Option<String>,

    #[arg(long)]
    login_url: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        let mut config = RunConfig {
            year: self.year,
            skip_scrape: self.no_scrape,
            snapshot_path: self.output,
            summary_path: self.summary_output,
            run_timeout: Duration::from_secs(self.timeout_secs),
            ..RunConfig::default()
        };

        config.exports.goodreads = self.goodreads;
        config.exports.strava = self.strava;
        config.launch = config.launch.headless(!self.headed);
        if let Some(path) = self.chrome_path {
            config.launch = config.launch.chrome_path(path);
        }
        if let Some(policy) = self.priority {
            config.merge = policy;
        }
        if self.no_summary {
            config.inference = None;
        }
        if let Some(max_pages) = self.max_pages {
            config.scrape.max_pages = max_pages;
        }
        if let Some(url) = self.history_url {
            config.scrape.history_url = url;
        }
        if let Some(url) = self.login_url {
            config.login.login_url = url;
        }

        config
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let credentials = if cli.no_scrape {
        Credentials::key_only_from_env()
    } else {
        Credentials::from_env().context("Library login is required unless --no-scrape is given")?
    };

    let config = cli.into_config();
    log::debug!("Run configuration: {:?}", config);

    let report = Pipeline::new(config, Some(credentials)).run().context("Run aborted, previous snapshot left untouched")?;

    println!("{}", report);
    Ok(())
}
