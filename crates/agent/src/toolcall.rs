//! Tool-calling step handler: think (ask the model) then act (run its tools).
//!
//! Each step sends the system prompt, the agent's memory and the current
//! next-step prompt to the provider, records the assistant reply, and
//! executes whatever tool calls it carries. Observations are written back
//! to memory as `tool` messages correlated by call id.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use stepwise_config::AgentSettings;
use stepwise_core::error::{Result, ToolError};
use stepwise_core::message::{Message, MessageToolCall};
use stepwise_core::provider::{Provider, ProviderRequest, ToolChoice};
use stepwise_core::tool::{Tool, ToolCall, ToolCollection, ToolResult};
use stepwise_tools::terminate::TERMINATE_TOOL_NAME;
use tracing::{debug, info, warn};

use crate::base::{AgentCore, StepHandler};

const NOTHING_TO_DO: &str = "Thinking complete - no action needed";
const NOTHING_TO_EXECUTE: &str = "No content or commands to execute";

/// Called after a special tool (e.g. `terminate`) ran successfully.
///
/// Returning `true` finishes the agent. Without a hook every special tool
/// finishes the agent.
#[async_trait]
pub trait SpecialToolHook: Send + Sync {
    async fn on_special_tool(&self, name: &str, result: &ToolResult) -> Result<bool>;
}

/// The stock step handler.
pub struct ToolCallAgent {
    provider: Arc<dyn Provider>,
    tools: ToolCollection,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tool_choice: ToolChoice,
    special_tool_names: Vec<String>,
    special_hook: Option<Arc<dyn SpecialToolHook>>,
    /// Observations are cut to this many characters
    max_observe: Option<usize>,
    /// Calls selected by the last `think`, consumed by `act`
    tool_calls: Vec<MessageToolCall>,
}

impl ToolCallAgent {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            tools: ToolCollection::new(),
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            tool_choice: ToolChoice::Auto,
            special_tool_names: vec![TERMINATE_TOOL_NAME.to_string()],
            special_hook: None,
            max_observe: None,
            tool_calls: Vec::new(),
        }
    }

    /// Build from settings. Tools are added separately.
    pub fn from_settings(provider: Arc<dyn Provider>, settings: &AgentSettings) -> Self {
        Self {
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            tool_choice: settings.tool_choice,
            max_observe: settings.max_observe,
            ..Self::new(provider, settings.model.clone())
        }
    }

    pub fn with_tools(mut self, tools: ToolCollection) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool(mut self, tool: Box<dyn Tool>) -> Self {
        self.tools.add(tool);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    pub fn with_special_tool_names(mut self, names: Vec<String>) -> Self {
        self.special_tool_names = names;
        self
    }

    pub fn with_special_hook(mut self, hook: Arc<dyn SpecialToolHook>) -> Self {
        self.special_hook = Some(hook);
        self
    }

    pub fn with_max_observe(mut self, max_observe: Option<usize>) -> Self {
        self.max_observe = max_observe;
        self
    }

    pub fn tools(&self) -> &ToolCollection {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolCollection {
        &mut self.tools
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tool_choice(&self) -> ToolChoice {
        self.tool_choice
    }

    /// Calls selected by the model but not yet executed.
    pub fn pending_tool_calls(&self) -> &[MessageToolCall] {
        &self.tool_calls
    }

    fn is_special_tool(&self, name: &str) -> bool {
        self.special_tool_names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Ask the model for its next move. Returns whether there is anything to act on.
    pub async fn think(&mut self, core: &mut AgentCore) -> Result<bool> {
        if let Some(prompt) = core.next_step_prompt().map(str::to_string) {
            core.add_message(Message::user(prompt));
        }

        let mut messages = Vec::with_capacity(core.messages().len() + 1);
        if let Some(system) = core.system_prompt() {
            messages.push(Message::system(system));
        }
        messages.extend(core.messages().iter().cloned());

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.definitions(),
            tool_choice: self.tool_choice,
        };

        let response = self.provider.complete(request).await?;
        debug!(
            provider = self.provider.name(),
            model = %response.model,
            tool_calls = response.message.tool_calls.len(),
            "Provider responded"
        );

        let content = response.message.content;
        self.tool_calls = response.message.tool_calls;

        info!(agent = %core.name(), "Thoughts: {content}");
        info!(
            agent = %core.name(),
            "Selected {} tools to use: {:?}",
            self.tool_calls.len(),
            self.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );

        match self.tool_choice {
            ToolChoice::None => {
                if !self.tool_calls.is_empty() {
                    warn!(agent = %core.name(), "Tried to use tools when they weren't available");
                    self.tool_calls.clear();
                }
                if content.is_empty() {
                    return Ok(false);
                }
                core.add_message(Message::assistant(content));
                Ok(true)
            }
            ToolChoice::Auto | ToolChoice::Required => {
                let has_content = !content.is_empty();
                core.add_message(Message::from_tool_calls(content, self.tool_calls.clone()));

                if !self.tool_calls.is_empty() || self.tool_choice == ToolChoice::Required {
                    // a missing call under `required` is reported by `act`
                    return Ok(true);
                }
                Ok(has_content)
            }
        }
    }

    /// Execute the calls selected by `think` and record their observations.
    pub async fn act(&mut self, core: &mut AgentCore) -> Result<String> {
        if self.tool_calls.is_empty() {
            if self.tool_choice == ToolChoice::Required {
                return Err(ToolError::ToolCallRequired.into());
            }
            return Ok(core
                .memory()
                .last()
                .map(|m| m.content.clone())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| NOTHING_TO_EXECUTE.to_string()));
        }

        let calls = std::mem::take(&mut self.tool_calls);
        let mut observations = Vec::with_capacity(calls.len());

        for call in calls {
            let (mut observation, base64_image) = self.execute_tool(core, &call).await?;

            if let Some(limit) = self.max_observe {
                if observation.chars().count() > limit {
                    observation = observation.chars().take(limit).collect();
                }
            }

            info!(tool = %call.name, "Tool completed its mission");
            core.add_message(
                Message::tool(observation.clone(), call.id, Some(call.name)).with_image(base64_image),
            );
            observations.push(observation);
        }

        Ok(observations.join("\n\n"))
    }

    /// Run one call and render its observation text.
    ///
    /// Unknown tools, malformed arguments and tool failures become
    /// observations the model can react to. Only a failing special-tool
    /// hook is returned as an error.
    async fn execute_tool(
        &self,
        core: &mut AgentCore,
        call: &MessageToolCall,
    ) -> Result<(String, Option<String>)> {
        let name = call.name.as_str();
        if self.tools.get(name).is_none() {
            return Ok((format!("Error: Unknown tool '{name}'"), None));
        }

        let raw_args = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };
        let arguments: Value = match serde_json::from_str(raw_args) {
            Ok(v) => v,
            Err(e) => {
                warn!(tool = name, arguments = %call.arguments, "Invalid tool arguments: {e}");
                return Ok((
                    format!("Error: Parsing arguments for {name}: Invalid JSON format"),
                    None,
                ));
            }
        };

        info!(tool = name, "Activating tool");
        let tool_call = ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        };

        match self.tools.execute(&tool_call).await {
            Ok(result) => {
                self.handle_special_tool(core, name, &result).await?;

                let observation = if result.is_empty() {
                    format!("Cmd `{name}` completed with no output")
                } else {
                    format!("Observed output of cmd `{name}` executed:\n{result}")
                };
                Ok((observation, result.base64_image))
            }
            Err(e) => {
                warn!(tool = name, "Tool execution failed: {e}");
                Ok((format!("Error: Tool '{name}' encountered a problem: {e}"), None))
            }
        }
    }

    async fn handle_special_tool(
        &self,
        core: &mut AgentCore,
        name: &str,
        result: &ToolResult,
    ) -> Result<()> {
        if !self.is_special_tool(name) {
            return Ok(());
        }

        let should_finish = match &self.special_hook {
            Some(hook) => hook.on_special_tool(name, result).await?,
            None => true,
        };

        if should_finish {
            info!(tool = name, "Special tool has completed the task");
            core.finish();
        }
        Ok(())
    }
}

#[async_trait]
impl StepHandler for ToolCallAgent {
    async fn step(&mut self, core: &mut AgentCore) -> Result<String> {
        if !self.think(core).await? {
            return Ok(NOTHING_TO_DO.to_string());
        }
        self.act(core).await
    }
}
