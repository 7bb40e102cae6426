//! Browser session management
//!
//! A [`BrowserSession`] owns one Chrome process and the tab used for the whole
//! run. The process is shut down when the session is dropped, on success and
//! failure paths alike.

pub mod config;
pub mod session;

pub use config::LaunchOptions;
pub use session::BrowserSession;
