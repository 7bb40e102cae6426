use crate::error::Result;
use crate::tools::{Tool, ToolContext, ToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What the page has to show before the wait is over
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum WaitCondition {
    /// An element matching the selector exists
    Element {
        /// CSS selector, or XPath prefixed with `xpath=`
        selector: String,
    },
    /// The current URL contains the fragment
    UrlContains {
        url_contains: String,
    },
    /// The current URL no longer contains the fragment
    UrlLacks {
        url_lacks: String,
    },
}

impl WaitCondition {
    /// Evaluate a URL condition; `None` for element conditions
    pub fn url_satisfied(&self, url: &str) -> Option<bool> {
        match self {
            WaitCondition::Element { .. } => None,
            WaitCondition::UrlContains { url_contains } => Some(url.contains(url_contains.as_str())),
            WaitCondition::UrlLacks { url_lacks } => Some(!url.contains(url_lacks.as_str())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WaitForParams {
    #[serde(flatten)]
    pub condition: WaitCondition,

    /// Give up after this many milliseconds (default: 15000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    15_000
}

/// Tool that blocks until a page signal appears.
///
/// A timeout is reported as a failed [`ToolResult`], not as an error, so callers
/// decide what a missing signal means.
#[derive(Default)]
pub struct WaitForTool;

impl Tool for WaitForTool {
    type Params = WaitForParams;

    fn name(&self) -> &str {
        "wait_for"
    }

    fn execute_typed(&self, params: WaitForParams, context: &mut ToolContext) -> Result<ToolResult> {
        let timeout = Duration::from_millis(params.timeout_ms);

        if let WaitCondition::Element { selector } = &params.condition {
            return Ok(match context.session.wait_for_element(selector, timeout) {
                Ok(_) => ToolResult::success_with(serde_json::json!({ "selector": selector })),
                Err(e) => ToolResult::failure(e.to_string()),
            });
        }

        let started = Instant::now();
        loop {
            let url = context.session.current_url();
            if params.condition.url_satisfied(&url).unwrap_or(false) {
                return Ok(ToolResult::success_with(serde_json::json!({
                    "url": url,
                    "waited_ms": started.elapsed().as_millis() as u64
                })));
            }
            if started.elapsed() >= timeout {
                return Ok(ToolResult::failure(format!(
                    "Condition {:?} not met after {}ms (last url: {})",
                    params.condition, params.timeout_ms, url
                )));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_params_element() {
        let params: WaitForParams = serde_json::from_value(serde_json::json!({"selector": ".account-menu"})).unwrap();
        assert_eq!(params.condition, WaitCondition::Element { selector: ".account-menu".to_string() });
        assert_eq!(params.timeout_ms, 15_000);
    }

    #[test]
    fn test_wait_params_url_lacks() {
        let params: WaitForParams =
            serde_json::from_value(serde_json::json!({"url_lacks": "/user/login", "timeout_ms": 500})).unwrap();
        assert_eq!(params.condition, WaitCondition::UrlLacks { url_lacks: "/user/login".to_string() });
        assert_eq!(params.timeout_ms, 500);
    }

    #[test]
    fn test_url_conditions() {
        let lacks = WaitCondition::UrlLacks { url_lacks: "/user/login".to_string() };
        assert_eq!(lacks.url_satisfied("https://lib.example/user/login"), Some(false));
        assert_eq!(lacks.url_satisfied("https://lib.example/user/dashboard"), Some(true));

        let contains = WaitCondition::UrlContains { url_contains: "dashboard".to_string() };
        assert_eq!(contains.url_satisfied("https://lib.example/user/dashboard"), Some(true));

        let element = WaitCondition::Element { selector: "#x".to_string() };
        assert_eq!(element.url_satisfied("https://lib.example"), None);
    }
}
