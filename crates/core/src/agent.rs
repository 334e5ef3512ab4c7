//! Agent lifecycle state.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Lifecycle state of an agent.
///
/// A run may only start from `Idle`. A failed step leaves the agent in
/// `Error`; a step handler ends the loop early by moving to `Finished`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    Finished,
    Error,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "IDLE",
            AgentState::Running => "RUNNING",
            AgentState::Finished => "FINISHED",
            AgentState::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IDLE" => Ok(AgentState::Idle),
            "RUNNING" => Ok(AgentState::Running),
            "FINISHED" => Ok(AgentState::Finished),
            "ERROR" => Ok(AgentState::Error),
            _ => Err(Error::InvalidState(s.to_string())),
        }
    }
}
