//! The agent step loop at the heart of Stepwise.
//!
//! An [`Agent`] owns its state, its memory and a [`StepHandler`]. Each run:
//!
//! 1. **Check** the agent is `IDLE` and record the caller's request
//! 2. **Enter** `RUNNING` for the duration of the loop
//! 3. **Step** until the handler moves the agent to `FINISHED` or the step
//!    budget runs out, watching for repeated replies after every step
//! 4. **Return** one summary line per step
//!
//! [`ToolCallAgent`] is the stock step handler: ask the model, run the tools
//! it picked, record the observations.

pub mod base;
pub mod general;
pub mod prompt;
pub mod toolcall;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use base::{Agent, AgentCore, NO_STEPS_EXECUTED, STUCK_PROMPT, StepHandler};
pub use general::general_agent;
pub use toolcall::{SpecialToolHook, ToolCallAgent};
