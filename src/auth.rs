//! Session authentication
//!
//! Logs the session tab into the library account by filling the login form
//! through the tool registry, then waits for a post-login signal.

use crate::browser::BrowserSession;
use crate::config::Credentials;
use crate::error::{Result, WrapupError};
use crate::tools::wait::WaitCondition;
use serde_json::{json, Value};
use std::time::Duration;

/// Where the login form lives and how success shows
#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub login_url: String,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,

    /// Page signal that confirms an authenticated session
    pub success: WaitCondition,

    /// How long to wait for `success` after submitting
    pub signal_timeout: Duration,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            login_url: "https://sfpl.bibliocommons.com/user/login".to_string(),
            username_selector: "xpath=/html/body/div[2]/div[2]/main/div/div[2]/div[1]/div/div[2]/div[1]/form/div[2]/input"
                .to_string(),
            password_selector: "xpath=/html/body/div[2]/div[2]/main/div/div[2]/div[1]/div/div[2]/div[1]/form/div[3]/input"
                .to_string(),
            submit_selector: "xpath=/html/body/div[2]/div[2]/main/div/div[2]/div[1]/div/div[2]/div[1]/form/p[2]/input"
                .to_string(),
            success: WaitCondition::UrlLacks { url_lacks: "/user/login".to_string() },
            signal_timeout: Duration::from_secs(30),
        }
    }
}

/// A tool invocation that is part of the login sequence
#[derive(Debug, Clone)]
pub struct LoginStep {
    pub tool: &'static str,
    pub params: Value,
}

pub struct Authenticator {
    config: LoginConfig,
}

impl Authenticator {
    pub fn new(config: LoginConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoginConfig {
        &self.config
    }

    /// The tool calls that fill and submit the login form
    pub fn login_steps(&self, credentials: &Credentials) -> Vec<LoginStep> {
        vec![
            LoginStep { tool: "navigate", params: json!({ "url": self.config.login_url }) },
            LoginStep {
                tool: "input",
                params: json!({ "selector": self.config.username_selector, "text": credentials.username(), "clear": true }),
            },
            LoginStep {
                tool: "input",
                params: json!({ "selector": self.config.password_selector, "text": credentials.password(), "clear": true }),
            },
            LoginStep { tool: "click", params: json!({ "selector": self.config.submit_selector }) },
        ]
    }

    fn signal_params(&self) -> Result<Value> {
        let mut params = serde_json::to_value(&self.config.success)?;
        if let Value::Object(map) = &mut params {
            map.insert("timeout_ms".to_string(), json!(self.config.signal_timeout.as_millis() as u64));
        }
        Ok(params)
    }

    /// Log the session in.
    ///
    /// An unreachable login page is a [`WrapupError::NavigationFailed`]; a
    /// missing form or a missing post-login signal is
    /// [`WrapupError::AuthenticationFailed`]. Neither is retried.
    pub fn login(&self, session: &BrowserSession, credentials: &Credentials) -> Result<()> {
        log::info!("Logging in at {}", self.config.login_url);

        for step in self.login_steps(credentials) {
            session.execute_tool(step.tool, step.params).map_err(|e| match e {
                WrapupError::NavigationFailed(_) => e,
                other => WrapupError::AuthenticationFailed(format!("Login form step '{}' failed: {}", step.tool, other)),
            })?;
        }

        let signal = session.execute_tool("wait_for", self.signal_params()?)?;
        if !signal.success {
            return Err(WrapupError::AuthenticationFailed(
                signal.error.unwrap_or_else(|| "post-login signal did not appear".to_string()),
            ));
        }

        log::info!("Authenticated session established");
        Ok(())
    }
}
