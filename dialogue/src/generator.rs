//! The text generator seam.
//!
//! The controller never talks to a model directly; it calls a
//! [`Generator`], which either answers a grounded RAG prompt or takes one
//! agent step over the message list.

use async_trait::async_trait;
use casebook_tools::{ToolCall, ToolDescriptor};

use crate::error::Result;
use crate::message::Message;

/// Inputs for a grounded answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RagPrompt {
    /// Earlier turns as a linear transcript.
    pub history: String,

    /// Retrieved case texts, joined.
    pub context: String,

    /// The question to answer.
    pub question: String,
}

impl RagPrompt {
    /// Render a template containing `{history}`, `{context}` and
    /// `{question}` placeholders.
    ///
    /// Substitution is a single pass, so placeholder-like text inside the
    /// substituted values is left alone.
    pub fn render(&self, template: &str) -> String {
        let fields = [
            ("{history}", self.history.as_str()),
            ("{context}", self.context.as_str()),
            ("{question}", self.question.as_str()),
        ];

        let mut rendered = String::with_capacity(template.len() + self.context.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let tail = &rest[start..];
            match fields.iter().find(|(key, _)| tail.starts_with(key)) {
                Some((key, value)) => {
                    rendered.push_str(value);
                    rest = &tail[key.len()..];
                }
                None => {
                    rendered.push('{');
                    rest = &tail[1..];
                }
            }
        }
        rendered.push_str(rest);
        rendered
    }
}

/// One agent step: a plain answer, tool-call requests, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    /// Reply text.
    pub content: String,

    /// Requested tool calls, in the order they should run.
    pub tool_calls: Vec<ToolCall>,
}

impl AgentReply {
    /// A plain answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A reply that requests tool calls.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls: calls,
        }
    }

    /// Convert into the assistant message appended to history.
    pub fn into_message(self) -> Message {
        Message::assistant(self.content).with_tool_calls(self.tool_calls)
    }
}

/// Trait for text generators.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Get the name of this generator.
    fn name(&self) -> &str;

    /// Answer a question grounded in retrieved context.
    async fn answer(&self, prompt: &RagPrompt) -> Result<String>;

    /// Take one agent step over the full message list.
    async fn chat(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<AgentReply>;
}
