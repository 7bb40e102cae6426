use crate::error::{Result, WrapupError};
use crate::tools::{Tool, ToolContext, ToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct InputParams {
    /// CSS selector (or `xpath=` selector) for the input element
    pub selector: String,

    /// Text to type into the element
    pub text: String,

    /// Clear existing content first (default: false)
    #[serde(default)]
    pub clear: bool,
}

// Passwords travel through this type
impl std::fmt::Debug for InputParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputParams")
            .field("selector", &self.selector)
            .field("text", &"<redacted>")
            .field("clear", &self.clear)
            .finish()
    }
}

#[derive(Default)]
pub struct InputTool;

impl Tool for InputTool {
    type Params = InputParams;

    fn name(&self) -> &str {
        "input"
    }

    fn execute_typed(&self, params: InputParams, context: &mut ToolContext) -> Result<ToolResult> {
        let session = context.session;
        let element = session.wait_for_element(&params.selector, session.page_timeout())?;

        if params.clear {
            element
                .call_js_fn("function() { this.value = ''; }", vec![], false)
                .map_err(|e| WrapupError::ToolExecutionFailed { tool: "input".to_string(), reason: e.to_string() })?;
        }

        element
            .click()
            .and_then(|el| el.type_into(&params.text))
            .map_err(|e| WrapupError::ToolExecutionFailed { tool: "input".to_string(), reason: e.to_string() })?;

        // Never echo the typed text
        Ok(ToolResult::success_with(serde_json::json!({
            "selector": params.selector
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_params_default_clear() {
        let params: InputParams =
            serde_json::from_value(serde_json::json!({"selector": "#user_pin", "text": "hunter2"})).unwrap();
        assert!(!params.clear);
    }

    #[test]
    fn test_input_params_debug_redacts_text() {
        let params: InputParams =
            serde_json::from_value(serde_json::json!({"selector": "#user_pin", "text": "hunter2"})).unwrap();
        let debug = format!("{:?}", params);
        assert!(debug.contains("#user_pin"));
        assert!(!debug.contains("hunter2"));
    }
}
