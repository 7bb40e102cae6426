use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while collecting, merging and persisting history
#[derive(Debug, Error)]
pub enum WrapupError {
    /// Chrome could not be started
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// A page could not be loaded, or a page load timed out
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// The login form was submitted but no post-login signal appeared
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Tool '{tool}' failed: {reason}")]
    ToolExecutionFailed { tool: String, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The history listing did not have the expected structure
    #[error("Scrape failed: {0}")]
    ScrapeFailed(String),

    /// An export file is missing
    #[error("Export file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// An export file could not be read as its declared format
    #[error("Failed to parse {format} export: {reason}")]
    ParseFailed { format: String, reason: String },

    /// The snapshot could not be persisted; the previous snapshot is untouched
    #[error("Failed to write {}: {reason}", path.display())]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Failed to read snapshot: {0}")]
    SnapshotReadFailed(String),

    #[error("Inference request failed: {0}")]
    InferenceFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run exceeded its time budget of {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl WrapupError {
    /// Whether this error only disqualifies one export source.
    ///
    /// Everything else is terminal for the run.
    pub fn is_source_level(&self) -> bool {
        matches!(self, WrapupError::SourceNotFound(_) | WrapupError::ParseFailed { .. })
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, WrapupError>;
