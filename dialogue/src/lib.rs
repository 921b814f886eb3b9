//! # Casebook Dialogue
//!
//! Multi-turn question answering over the case corpus.
//!
//! - **Controller**: the per-turn state machine, in a retrieve-then-generate
//!   flow or an agent flow that calls tools
//! - **Generators**: the text-generation seam and a chat completions client
//! - **Checkpoints**: per-thread state, in memory or on disk
//! - **Conversation**: loads, runs and saves one turn under a thread lock
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Conversation                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  CheckpointStore::load ──► DialogueController ──► ::save        │
//! │                                  │                              │
//! │          ┌───────────────────────┴──────────────┐               │
//! │          ▼                                      ▼               │
//! │  Rag: Retrieve ──► Generate          Agent ◄──► ToolExec        │
//! │          │              │              │            │           │
//! │          ▼              ▼              ▼            ▼           │
//! │     Retriever       Generator      Generator   ToolRegistry     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use casebook_dialogue::{CasebookConfig, ThreadId};
//!
//! let config = CasebookConfig::load("casebook.toml").await?;
//! let conversation = config.build_conversation().await?;
//!
//! let thread = ThreadId::new();
//! let answer = conversation.respond(&thread, "paciente con insomnio").await?;
//! ```

pub mod checkpoint;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod generator;
pub mod llm;
pub mod message;
pub mod state;
pub mod tools;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use config::{
    CasebookConfig, CheckpointBackend, CheckpointConfig, DialogueConfig, GeneratorConfig,
};
pub use controller::{
    DialogueController, DialogueMode, Node, TurnReport, format_transcript, route_after_agent,
};
pub use conversation::Conversation;
pub use error::{CheckpointError, DialogueError, Result};
pub use generator::{AgentReply, Generator, RagPrompt};
pub use llm::ChatCompletionsGenerator;
pub use message::{Message, Role};
pub use state::{Scratch, StateDelta, ThreadId, ThreadState};
pub use tools::{CaseRetrievalTool, default_registry};

// Re-export from dependencies for convenience
pub use casebook_retrieval::{Retriever, RetrievalConfig};
pub use casebook_tools::{Tool, ToolCall, ToolRegistry};
