//! Error types for the Stepwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! The model client and the tool layer each get their own error enum.

use thiserror::Error;

/// The top-level error type for all Stepwise operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Agent lifecycle ---
    #[error("Invalid invocation: {0}")]
    InvalidInvocation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // --- Memory ---
    #[error("Unsupported message role: {0}")]
    UnsupportedRole(String),

    #[error("Tool messages require a tool_call_id")]
    MissingToolCallId,

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Cannot combine tool results: {0}")]
    CannotCombine(String),

    #[error("Tool choice 'required' but no tool calls were provided")]
    ToolCallRequired,
}
