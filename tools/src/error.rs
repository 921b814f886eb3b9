//! Error types for tool dispatch.

use thiserror::Error;

use crate::calculator::CalcError;

/// Result type alias for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Errors that can occur while registering or dispatching tools.
#[derive(Error, Debug)]
pub enum ToolError {
    /// No tool is registered under this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A tool with this name is already registered.
    #[error("tool already registered: {0}")]
    AlreadyRegistered(String),

    /// Arguments do not match the tool's input spec.
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The tool ran but failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Arithmetic expression could not be evaluated.
    #[error("calculation error: {0}")]
    Calculation(#[from] CalcError),
}
