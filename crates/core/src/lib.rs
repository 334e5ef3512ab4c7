//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise agent harness.
//! It defines the domain model that the tool and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! The model client and the tool capabilities are traits here. Implementations
//! live outside core, so the agent loop can be driven by mocks in tests and by
//! real backends in production without changes.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod agent;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Memory, Message, MessageExtras, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolCollection, ToolResult};
pub use agent::AgentState;
