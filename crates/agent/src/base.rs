//! The agent state machine: lifecycle state, memory, and the bounded step loop.

use async_trait::async_trait;
use futures::future::BoxFuture;
use stepwise_config::AgentSettings;
use stepwise_core::agent::AgentState;
use stepwise_core::error::{Error, Result};
use stepwise_core::message::{Memory, Message, MessageExtras, Role};
use tracing::{info, warn};

/// Prepended to `next_step_prompt` each time the agent is found repeating itself.
pub const STUCK_PROMPT: &str = "Observed duplicate responses. Consider new strategies and avoid \
repeating ineffective paths already attempted.";

/// Returned by [`Agent::run`] when there is nothing to report (`max_steps = 0`).
pub const NO_STEPS_EXECUTED: &str = "No steps executed";

/// One iteration's worth of work: typically a model call and an optional
/// tool dispatch.
///
/// Implementations may append to memory and may call
/// [`AgentCore::finish`] to end the loop early. An error fails the whole
/// run and leaves the agent in `ERROR`.
#[async_trait]
pub trait StepHandler: Send {
    async fn step(&mut self, core: &mut AgentCore) -> Result<String>;
}

/// The state every agent owns regardless of how it steps.
#[derive(Debug, Clone)]
pub struct AgentCore {
    name: String,
    description: Option<String>,
    system_prompt: Option<String>,
    next_step_prompt: Option<String>,
    memory: Memory,
    state: AgentState,
    max_steps: u32,
    current_step: u32,
    duplicate_threshold: usize,
}

impl AgentCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            system_prompt: None,
            next_step_prompt: None,
            memory: Memory::new(),
            state: AgentState::Idle,
            max_steps: 10,
            current_step: 0,
            duplicate_threshold: 2,
        }
    }

    /// Build from settings. Prompts left unset in `settings` stay unset.
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            description: settings.description.clone(),
            system_prompt: settings.system_prompt.clone(),
            next_step_prompt: settings.next_step_prompt.clone(),
            max_steps: settings.max_steps,
            duplicate_threshold: settings.duplicate_threshold,
            ..Self::new(settings.name.clone())
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_next_step_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.next_step_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_duplicate_threshold(mut self, threshold: usize) -> Self {
        self.duplicate_threshold = threshold;
        self
    }

    pub fn with_memory(mut self, memory: Memory) -> Self {
        self.memory = memory;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn next_step_prompt(&self) -> Option<&str> {
        self.next_step_prompt.as_deref()
    }

    pub fn set_next_step_prompt(&mut self, prompt: Option<String>) {
        self.next_step_prompt = prompt;
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn set_state(&mut self, state: AgentState) {
        self.state = state;
    }

    /// Mark the task done; the loop exits after the current step.
    pub fn finish(&mut self) {
        self.state = AgentState::Finished;
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn duplicate_threshold(&self) -> usize {
        self.duplicate_threshold
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn messages(&self) -> &[Message] {
        self.memory.messages()
    }

    pub fn add_message(&mut self, message: Message) {
        self.memory.add_message(message);
    }

    /// Append a message built from a role name.
    ///
    /// Fails with [`Error::UnsupportedRole`] for unknown roles and with
    /// [`Error::MissingToolCallId`] for tool messages without a call id.
    /// Memory is untouched on failure. `extra` is only read for tool messages.
    pub fn update_memory(
        &mut self,
        role: &str,
        content: impl Into<String>,
        base64_image: Option<String>,
        extra: MessageExtras,
    ) -> Result<()> {
        let message = match role.parse::<Role>()? {
            Role::System => Message::system(content),
            Role::User => Message::user(content),
            Role::Assistant => Message::assistant(content),
            Role::Tool => {
                let tool_call_id = extra.tool_call_id.ok_or(Error::MissingToolCallId)?;
                Message::tool(content, tool_call_id, extra.name)
            }
        };
        self.memory.add_message(message.with_image(base64_image));
        Ok(())
    }

    /// Whether the latest message repeats earlier assistant output often
    /// enough to count as a loop.
    pub fn is_stuck(&self) -> bool {
        let messages = self.memory.messages();
        if messages.len() < 2 {
            return false;
        }
        let Some((last, earlier)) = messages.split_last() else {
            return false;
        };
        if last.content.is_empty() {
            return false;
        }

        let duplicate_count = earlier
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant && m.content == last.content)
            .count();

        duplicate_count >= self.duplicate_threshold
    }

    /// Push the model toward a different strategy. Repeated detections stack.
    pub fn handle_stuck_state(&mut self) {
        let previous = self.next_step_prompt.as_deref().unwrap_or_default();
        self.next_step_prompt = Some(format!("{STUCK_PROMPT}\n{previous}"));
        warn!(agent = %self.name, "Agent detected stuck state. Added prompt: {STUCK_PROMPT}");
    }
}

/// An agent: owned state plus the handler that performs each step.
pub struct Agent<S> {
    core: AgentCore,
    handler: S,
}

impl<S: StepHandler> Agent<S> {
    pub fn new(core: AgentCore, handler: S) -> Self {
        Self { core, handler }
    }

    pub fn core(&self) -> &AgentCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    pub fn handler(&self) -> &S {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut S {
        &mut self.handler
    }

    /// Run the step loop until the handler finishes or `max_steps` is hit.
    ///
    /// Returns one `Step i: …` line per step, plus a termination line when
    /// the budget ran out. Fails without touching memory or counters unless
    /// the agent is `IDLE`.
    pub async fn run(&mut self, request: Option<&str>) -> Result<String> {
        if self.core.state != AgentState::Idle {
            return Err(Error::InvalidInvocation(format!(
                "Cannot run agent from state: {}",
                self.core.state
            )));
        }

        if let Some(request) = request.filter(|r| !r.is_empty()) {
            self.core.add_message(Message::user(request));
        }

        let results = self
            .state_context(AgentState::Running, |agent| Box::pin(agent.step_loop()))
            .await?;

        if results.is_empty() {
            Ok(NO_STEPS_EXECUTED.to_string())
        } else {
            Ok(results.join("\n"))
        }
    }

    /// Switch to `new_state` for the duration of `body`.
    ///
    /// On success the previous state is restored. On failure the agent is
    /// left in `ERROR` and the error is returned; the previous state is not
    /// restored over it.
    pub async fn state_context<T, F>(&mut self, new_state: AgentState, body: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut Self) -> BoxFuture<'a, Result<T>>,
    {
        let previous = self.core.state;
        self.core.state = new_state;

        match body(self).await {
            Ok(value) => {
                self.core.state = previous;
                Ok(value)
            }
            Err(e) => {
                self.core.state = AgentState::Error;
                warn!(agent = %self.core.name, error = %e, "Agent step failed");
                Err(e)
            }
        }
    }

    async fn step_loop(&mut self) -> Result<Vec<String>> {
        let mut results = Vec::new();

        while self.core.current_step < self.core.max_steps
            && self.core.state != AgentState::Finished
        {
            self.core.current_step += 1;
            info!(
                agent = %self.core.name,
                "Executing step {}/{}",
                self.core.current_step,
                self.core.max_steps
            );

            let step_result = self.handler.step(&mut self.core).await?;

            if self.core.is_stuck() {
                self.core.handle_stuck_state();
            }

            results.push(format!("Step {}: {}", self.core.current_step, step_result));
        }

        if self.core.max_steps > 0
            && self.core.current_step >= self.core.max_steps
            && self.core.state != AgentState::Finished
        {
            self.core.current_step = 0;
            self.core.state = AgentState::Idle;
            results.push(format!("Terminated: Reached max steps ({})", self.core.max_steps));
        }

        Ok(results)
    }
}
