//! Run configuration
//!
//! Secrets come from the environment exactly once, through
//! [`Credentials::from_env`]. Everything a run needs is then carried in a
//! [`RunConfig`] value handed to the pipeline.

use crate::auth::LoginConfig;
use crate::browser::LaunchOptions;
use crate::error::{Result, WrapupError};
use crate::inference::InferenceConfig;
use crate::merge::MergePolicy;
use crate::scrape::ScrapeConfig;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const USERNAME_VAR: &str = "USERNAME";
pub const PASSWORD_VAR: &str = "PASSWORD";
pub const API_KEY_VAR: &str = "MODEL_ACCESS_KEY";

/// Library login plus the inference access key.
///
/// Held in memory only; `Debug` never prints the secrets.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
    api_key: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>, api_key: Option<String>) -> Self {
        Self { username: username.into(), password: password.into(), api_key }
    }

    /// Only the inference key, for runs that never log in
    pub fn key_only(api_key: Option<String>) -> Self {
        Self { username: String::new(), password: String::new(), api_key }
    }

    /// Read `USERNAME`, `PASSWORD` and `MODEL_ACCESS_KEY`, loading `.env` first
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read just `MODEL_ACCESS_KEY`, loading `.env` first
    pub fn key_only_from_env() -> Self {
        load_dotenv();
        Self::key_only(std::env::var(API_KEY_VAR).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Build credentials from any variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let username =
            non_empty(USERNAME_VAR).ok_or_else(|| WrapupError::Config(format!("{} is not set", USERNAME_VAR)))?;
        let password =
            non_empty(PASSWORD_VAR).ok_or_else(|| WrapupError::Config(format!("{} is not set", PASSWORD_VAR)))?;

        Ok(Self { username, password, api_key: non_empty(API_KEY_VAR) })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn has_login(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        log::debug!("No .env file loaded: {}", e);
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Locations of the manually downloaded export dumps
#[derive(Debug, Clone, Default)]
pub struct ExportPaths {
    /// Goodreads library export (export-A)
    pub goodreads: Option<PathBuf>,
    /// Strava activities export (export-B)
    pub strava: Option<PathBuf>,
}

/// Everything one run needs
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Restrict every source to this calendar year
    pub year: Option<i32>,

    /// Skip the browser stage entirely and build from exports only
    pub skip_scrape: bool,

    pub launch: LaunchOptions,
    pub login: LoginConfig,
    pub scrape: ScrapeConfig,
    pub exports: ExportPaths,
    pub merge: MergePolicy,

    /// `None` disables the generated summary
    pub inference: Option<InferenceConfig>,

    pub snapshot_path: PathBuf,

    /// Where to also write the generated summary as plain text
    pub summary_path: Option<PathBuf>,

    /// Overall budget; exceeding it aborts the run before anything is written
    pub run_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            year: None,
            skip_scrape: false,
            launch: LaunchOptions::default(),
            login: LoginConfig::default(),
            scrape: ScrapeConfig::default(),
            exports: ExportPaths::default(),
            merge: MergePolicy::default(),
            inference: Some(InferenceConfig::default()),
            snapshot_path: PathBuf::from("wrapup_snapshot.json"),
            summary_path: None,
            run_timeout: Duration::from_secs(15 * 60),
        }
    }
}
