//! Per-thread dialogue state.
//!
//! A [`ThreadState`] is only ever changed through [`ThreadState::apply`],
//! which merges a [`StateDelta`] returned by a controller node. Messages are
//! appended, never removed or rewritten.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, Role};

/// Opaque identifier of one conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for ThreadId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ThreadId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Working fields for the turn in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scratch {
    /// The question being answered.
    pub question: String,

    /// Retrieved context for the question.
    pub context: String,
}

/// Everything known about one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    /// Key into the checkpoint store.
    pub thread_id: ThreadId,

    /// Full history, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Scratch fields.
    #[serde(default)]
    pub scratch: Scratch,
}

impl ThreadState {
    /// Empty state for a thread with no history.
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            messages: Vec::new(),
            scratch: Scratch::default(),
        }
    }

    /// Merge a node's output into the state.
    pub fn apply(&mut self, delta: StateDelta) {
        self.messages.extend(delta.messages);
        if let Some(question) = delta.question {
            self.scratch.question = question;
        }
        if let Some(context) = delta.context {
            self.scratch.context = context;
        }
    }

    /// Check if the thread has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Most recent assistant message.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.last_with_role(Role::Assistant)
    }

    /// Most recent user message.
    pub fn last_user(&self) -> Option<&Message> {
        self.last_with_role(Role::User)
    }

    fn last_with_role(&self, role: Role) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == role)
    }
}

/// Changes produced by one controller node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    /// Messages to append, in order.
    pub messages: Vec<Message>,

    /// New value for `scratch.question`.
    pub question: Option<String>,

    /// New value for `scratch.context`.
    pub context: Option<String>,
}

impl StateDelta {
    /// A delta that appends a single message.
    pub fn message(message: Message) -> Self {
        Self {
            messages: vec![message],
            ..Default::default()
        }
    }

    /// A delta that appends several messages.
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Set the question.
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    /// Set the context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}
