use crate::error::{Result, WrapupError};
use crate::tools::utils::normalize_url;
use crate::tools::{Tool, ToolContext, ToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Chrome renders failed loads under this scheme instead of erroring
const ERROR_PAGE_PREFIX: &str = "chrome-error://";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NavigateParams {
    pub url: String,

    /// Block until the page has loaded (default: true)
    #[serde(default = "default_wait")]
    pub wait_for_load: bool,
}

fn default_wait() -> bool {
    true
}

/// Whether the tab ended up on Chrome's own error page
pub fn is_error_page(url: &str) -> bool {
    url.starts_with(ERROR_PAGE_PREFIX)
}

/// Load a page in the session tab.
///
/// An unreachable page is a [`WrapupError::NavigationFailed`], whether the
/// load errors or Chrome swaps in its error page.
#[derive(Default)]
pub struct NavigateTool;

impl Tool for NavigateTool {
    type Params = NavigateParams;

    fn name(&self) -> &str {
        "navigate"
    }

    fn execute_typed(&self, params: NavigateParams, context: &mut ToolContext) -> Result<ToolResult> {
        let target = normalize_url(&params.url);
        context.session.navigate(&target)?;

        if !params.wait_for_load {
            return Ok(ToolResult::success_with(serde_json::json!({ "url": target })));
        }

        context.session.wait_for_navigation()?;
        let landed = context.session.current_url();
        if is_error_page(&landed) {
            return Err(WrapupError::NavigationFailed(format!("{} could not be reached", target)));
        }

        Ok(ToolResult::success_with(serde_json::json!({ "url": target, "landed": landed })))
    }
}
