//! Error types for the dialogue layer.

use casebook_retrieval::RetrievalError;
use casebook_tools::ToolError;
use thiserror::Error;

/// Result type alias for dialogue operations.
pub type Result<T> = std::result::Result<T, DialogueError>;

/// Errors that can occur while running a conversation.
///
/// Only [`DialogueError::Checkpoint`] and [`DialogueError::Config`] ever
/// reach the caller of a turn; the rest are contained by the controller and
/// turned into conversational content.
#[derive(Error, Debug)]
pub enum DialogueError {
    /// Retrieval (or the encoder behind it) failed.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// The generator returned an error or an unusable reply.
    #[error("generator failure: {0}")]
    Generator(String),

    /// No API key is available for the generator.
    #[error("generator not configured: missing API key")]
    GeneratorNotConfigured,

    /// Tool lookup, validation or execution failed.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Persisting or restoring thread state failed.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Checkpoint-specific errors.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Thread id cannot be used as a storage key.
    #[error("invalid thread id: {0:?}")]
    InvalidThreadId(String),

    /// Failed to create the storage directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to read a checkpoint.
    #[error("failed to read checkpoint: {0}")]
    ReadFile(String),

    /// Failed to write a checkpoint.
    #[error("failed to write checkpoint: {0}")]
    WriteFile(String),

    /// A checkpoint file holds a different thread than its name says.
    #[error("checkpoint for {expected} holds thread {found}")]
    ThreadMismatch { expected: String, found: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
