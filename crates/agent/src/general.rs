//! The general-purpose agent: a [`ToolCallAgent`] with the built-in prompts
//! and `terminate` always available.

use std::sync::Arc;
use stepwise_config::AgentSettings;
use stepwise_core::provider::Provider;
use stepwise_core::tool::Tool;
use stepwise_tools::Terminate;

use crate::base::{Agent, AgentCore};
use crate::prompt::{NEXT_STEP_PROMPT, SYSTEM_PROMPT};
use crate::toolcall::ToolCallAgent;

const DESCRIPTION: &str = "A versatile agent that can solve various tasks using multiple tools";

/// Build an agent from settings, a provider and the caller's tools.
///
/// Prompts set in `settings` replace the built-in ones. `Terminate` is
/// registered last, so a caller-supplied tool of the same name is replaced.
pub fn general_agent(
    settings: &AgentSettings,
    provider: Arc<dyn Provider>,
    tools: Vec<Box<dyn Tool>>,
) -> Agent<ToolCallAgent> {
    let core = AgentCore::from_settings(settings)
        .with_description(settings.description.as_deref().unwrap_or(DESCRIPTION))
        .with_system_prompt(settings.system_prompt.as_deref().unwrap_or(SYSTEM_PROMPT))
        .with_next_step_prompt(
            settings
                .next_step_prompt
                .as_deref()
                .unwrap_or(NEXT_STEP_PROMPT),
        );

    let mut handler = ToolCallAgent::from_settings(provider, settings);
    for tool in tools {
        handler.tools_mut().add(tool);
    }
    handler.tools_mut().add(Box::new(Terminate));

    tracing::debug!(
        agent = %core.name(),
        tools = ?handler.tools().names(),
        "Built general agent"
    );

    Agent::new(core, handler)
}
