//! Built-in tool implementations for Stepwise.
//!
//! Capability plugins (browsers, file savers, interpreters) live outside
//! this workspace. The tools here are the ones the agent loop itself
//! relies on: ending a run, and constraining the model to a declared
//! response shape.

pub mod create_chat_completion;
pub mod terminate;

pub use create_chat_completion::{CreateChatCompletion, RecordField, RecordShape, ResponseShape};
pub use terminate::Terminate;
