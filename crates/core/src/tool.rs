//! Tool trait and the tool-result composition model.
//!
//! Tools are the agent's capabilities. Each invocation yields a
//! [`ToolResult`]; a single logical action may produce several partial
//! results that are merged with [`ToolResult::combine`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The outcome of one tool invocation.
///
/// Every field is optional. A result is non-empty iff at least one field
/// holds a non-empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn concat_fields(left: &Option<String>, right: &Option<String>) -> Option<String> {
    match (non_empty(left), non_empty(right)) {
        (Some(l), Some(r)) => Some(format!("{l}{r}")),
        (l, r) => l.or(r).map(str::to_string),
    }
}

impl ToolResult {
    /// A successful result carrying only output.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::default()
        }
    }

    /// A failed result carrying only an error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        non_empty(&self.output).is_none()
            && non_empty(&self.error).is_none()
            && non_empty(&self.base64_image).is_none()
            && non_empty(&self.system).is_none()
    }

    /// Merge two partial results, left operand first.
    ///
    /// Text fields concatenate. Images cannot be concatenated, so two
    /// results that both carry one fail with [`ToolError::CannotCombine`].
    pub fn combine(&self, other: &ToolResult) -> Result<ToolResult, ToolError> {
        let base64_image = match (non_empty(&self.base64_image), non_empty(&other.base64_image)) {
            (Some(_), Some(_)) => {
                return Err(ToolError::CannotCombine(
                    "both results carry a base64 image".into(),
                ));
            }
            (l, r) => l.or(r).map(str::to_string),
        };

        Ok(ToolResult {
            output: concat_fields(&self.output, &other.output),
            error: concat_fields(&self.error, &other.error),
            base64_image,
            system: concat_fields(&self.system, &other.system),
        })
    }

    pub fn with_output(&self, output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..self.clone()
        }
    }

    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..self.clone()
        }
    }

    pub fn with_system(&self, system: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            ..self.clone()
        }
    }

    pub fn with_image(&self, base64_image: impl Into<String>) -> Self {
        Self {
            base64_image: Some(base64_image.into()),
            ..self.clone()
        }
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match non_empty(&self.error) {
            Some(error) => write!(f, "Error: {error}"),
            None => f.write_str(self.output.as_deref().unwrap_or_default()),
        }
    }
}

/// The core Tool trait.
///
/// Tools are registered in a [`ToolCollection`] and made available to the
/// agent's step handler, which forwards their definitions to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "terminate").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// An ordered collection of tools, looked up by name.
#[derive(Default)]
pub struct ToolCollection {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name in place.
    pub fn add(&mut self, tool: Box<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(mut self, tool: Box<dyn Tool>) -> Self {
        self.add(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// Tool definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(call.arguments.clone()).await
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            let text = arguments["text"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("missing 'text'".into()))?;
            Ok(ToolResult::success(text))
        }
    }

    #[test]
    fn combine_concatenates_output() {
        let merged = ToolResult::success("x").combine(&ToolResult::success("y")).unwrap();
        assert_eq!(merged.output.as_deref(), Some("xy"));
        assert!(merged.error.is_none());
    }

    #[test]
    fn combine_rejects_two_images() {
        let left = ToolResult::default().with_image("p1");
        let right = ToolResult::default().with_image("p2");
        let err = left.combine(&right).unwrap_err();
        assert!(matches!(err, ToolError::CannotCombine(_)));
    }

    #[test]
    fn combine_takes_the_present_side() {
        let merged = ToolResult::failure("e").combine(&ToolResult::default()).unwrap();
        assert_eq!(merged.error.as_deref(), Some("e"));

        let merged = ToolResult::default()
            .combine(&ToolResult::default().with_image("p1").with_system("sys"))
            .unwrap();
        assert_eq!(merged.base64_image.as_deref(), Some("p1"));
        assert_eq!(merged.system.as_deref(), Some("sys"));
        assert!(merged.output.is_none());
    }

    #[test]
    fn combine_concatenates_errors_and_system_in_order() {
        let left = ToolResult::failure("first;").with_system("a");
        let right = ToolResult::failure("second").with_system("b");
        let merged = left.combine(&right).unwrap();
        assert_eq!(merged.error.as_deref(), Some("first;second"));
        assert_eq!(merged.system.as_deref(), Some("ab"));
    }

    #[test]
    fn emptiness_ignores_blank_fields() {
        assert!(ToolResult::default().is_empty());
        assert!(ToolResult::success("").is_empty());
        assert!(!ToolResult::default().with_system("note").is_empty());
    }

    #[test]
    fn display_prefers_error() {
        assert_eq!(ToolResult::success("ok").to_string(), "ok");
        assert_eq!(ToolResult::success("ok").with_error("boom").to_string(), "Error: boom");
        assert_eq!(ToolResult::default().to_string(), "");
    }

    #[test]
    fn overrides_leave_other_fields_untouched() {
        let base = ToolResult::success("partial").with_system("tool restarted");
        let failed = base.with_error("timed out");
        assert_eq!(failed.output.as_deref(), Some("partial"));
        assert_eq!(failed.system.as_deref(), Some("tool restarted"));
        assert_eq!(failed.error.as_deref(), Some("timed out"));
        assert!(base.error.is_none());
    }

    #[test]
    fn collection_register_and_lookup() {
        let tools = ToolCollection::new().with(Box::new(EchoTool));
        assert!(tools.get("echo").is_some());
        assert!(tools.get("nonexistent").is_none());
        assert_eq!(tools.names(), vec!["echo"]);
    }

    #[test]
    fn collection_replaces_same_name() {
        let mut tools = ToolCollection::new();
        tools.add(Box::new(EchoTool));
        tools.add(Box::new(EchoTool));
        assert_eq!(tools.len(), 1);
        assert_eq!(tools.definitions()[0].name, "echo");
    }

    #[tokio::test]
    async fn collection_execute_tool() {
        let tools = ToolCollection::new().with(Box::new(EchoTool));
        let call = ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: serde_json::json!({"text": "hello world"}),
        };
        let result = tools.execute(&call).await.unwrap();
        assert_eq!(result.output.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn collection_execute_missing_tool() {
        let tools = ToolCollection::new();
        let call = ToolCall {
            id: "call_1".into(),
            name: "nonexistent".into(),
            arguments: serde_json::json!({}),
        };
        let err = tools.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
