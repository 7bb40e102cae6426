use crate::error::{Result, WrapupError};
use crate::tools::{Tool, ToolContext, ToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClickParams {
    /// CSS selector, or XPath prefixed with `xpath=`
    pub selector: String,
}

/// Click an element once it is rendered, waiting up to the session page timeout
#[derive(Default)]
pub struct ClickTool;

impl Tool for ClickTool {
    type Params = ClickParams;

    fn name(&self) -> &str {
        "click"
    }

    fn execute_typed(&self, params: ClickParams, context: &mut ToolContext) -> Result<ToolResult> {
        let session = context.session;
        session
            .wait_for_element(&params.selector, session.page_timeout())?
            .click()
            .map_err(|e| WrapupError::ToolExecutionFailed { tool: "click".to_string(), reason: e.to_string() })?;

        Ok(ToolResult::success_with(serde_json::json!({ "clicked": params.selector })))
    }
}
