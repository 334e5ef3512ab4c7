//! Terminate tool: lets the model end the interaction.
//!
//! The agent treats `terminate` as a special tool: once it has run, the
//! step loop finishes instead of asking the model for another step.

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolResult};

pub const TERMINATE_TOOL_NAME: &str = "terminate";

const DESCRIPTION: &str = "Terminate the interaction when the request is met OR if the assistant \
cannot proceed further with the task. When you have finished all the tasks, call this tool to end the work.";

pub struct Terminate;

#[async_trait]
impl Tool for Terminate {
    fn name(&self) -> &str {
        TERMINATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The finish status of the interaction.",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let status = arguments["status"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'status' argument".into()))?;

        Ok(ToolResult::success(format!(
            "The interaction has been completed with status: {status}"
        )))
    }
}
