//! The dialogue state machine.
//!
//! Two flows share one loop:
//!
//! ```text
//! RAG:    Start ──► Retrieve ──► Generate ──► End
//! Agent:  Start ──► Agent ──► (ToolExec ──► Agent)* ──► End
//! ```
//!
//! Every node reads the current [`ThreadState`] and returns a
//! [`StateDelta`]; the loop applies it before choosing the next node. Only
//! [`route_after_agent`] branches. Failures of the retriever, the generator
//! or a tool never escape a turn: they become messages in the history.

use std::sync::Arc;

use casebook_retrieval::Retriever;
use casebook_retrieval::config::DEFAULT_CONTEXT_SEPARATOR;
use casebook_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::generator::{Generator, RagPrompt};
use crate::message::Message;
use crate::state::{StateDelta, ThreadState};

/// Default bound on agent steps per turn.
pub const DEFAULT_MAX_AGENT_STEPS: usize = 6;

/// Default reply when retrieval or generation fails.
pub const DEFAULT_UNAVAILABLE_MESSAGE: &str =
    "Lo siento, la información solicitada no está disponible en este momento.";

/// Default reply when the agent runs out of steps.
pub const DEFAULT_STEP_LIMIT_MESSAGE: &str =
    "Lo siento, no pude completar la respuesta en el número de pasos permitido.";

/// A state of the dialogue machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Start,
    Retrieve,
    Generate,
    Agent,
    ToolExec,
    End,
}

/// Which flow a controller runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueMode {
    /// Retrieve, then answer.
    #[default]
    Rag,
    /// Let the generator call tools until it answers.
    Agent,
}

/// Decide where to go after an agent step.
///
/// The latest assistant message decides: tool-call requests lead to
/// [`Node::ToolExec`], anything else ends the turn.
pub fn route_after_agent(state: &ThreadState) -> Node {
    match state.last_assistant() {
        Some(message) if message.has_tool_calls() => Node::ToolExec,
        _ => Node::End,
    }
}

/// Render messages as a `role: content` transcript, one message per line.
///
/// Assistant messages that only carry tool calls are skipped.
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// What one turn did.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    /// The last assistant message's content.
    pub answer: String,

    /// Nodes visited, in order, ending with [`Node::End`].
    pub path: Vec<Node>,
}

enum Flow {
    Rag { retriever: Arc<Retriever> },
    Agent { tools: Arc<ToolRegistry> },
}

/// Runs one turn of a thread through the state machine.
pub struct DialogueController {
    flow: Flow,
    generator: Arc<dyn Generator>,
    top_k: usize,
    context_separator: String,
    max_agent_steps: usize,
    unavailable_message: String,
    step_limit_message: String,
}

impl DialogueController {
    fn new(flow: Flow, generator: Arc<dyn Generator>) -> Self {
        Self {
            flow,
            generator,
            top_k: casebook_retrieval::retriever::DEFAULT_TOP_K,
            context_separator: DEFAULT_CONTEXT_SEPARATOR.to_string(),
            max_agent_steps: DEFAULT_MAX_AGENT_STEPS,
            unavailable_message: DEFAULT_UNAVAILABLE_MESSAGE.to_string(),
            step_limit_message: DEFAULT_STEP_LIMIT_MESSAGE.to_string(),
        }
    }

    /// Controller for the retrieve-then-answer flow.
    pub fn rag(retriever: Arc<Retriever>, generator: Arc<dyn Generator>) -> Self {
        let top_k = retriever.default_k();
        Self {
            top_k,
            ..Self::new(Flow::Rag { retriever }, generator)
        }
    }

    /// Controller for the tool-using agent flow.
    pub fn agent(tools: Arc<ToolRegistry>, generator: Arc<dyn Generator>) -> Self {
        Self::new(Flow::Agent { tools }, generator)
    }

    /// Set the number of cases retrieved per question.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the separator placed between retrieved cases.
    pub fn with_context_separator(mut self, separator: impl Into<String>) -> Self {
        self.context_separator = separator.into();
        self
    }

    /// Set the bound on agent steps per turn (at least one).
    pub fn with_max_agent_steps(mut self, steps: usize) -> Self {
        self.max_agent_steps = steps.max(1);
        self
    }

    /// Set the reply used when retrieval or generation fails.
    pub fn with_unavailable_message(mut self, message: impl Into<String>) -> Self {
        self.unavailable_message = message.into();
        self
    }

    /// Set the reply used when the agent runs out of steps.
    pub fn with_step_limit_message(mut self, message: impl Into<String>) -> Self {
        self.step_limit_message = message.into();
        self
    }

    /// The flow this controller runs.
    pub fn mode(&self) -> DialogueMode {
        match self.flow {
            Flow::Rag { .. } => DialogueMode::Rag,
            Flow::Agent { .. } => DialogueMode::Agent,
        }
    }

    /// Run one user turn to completion, mutating `state`.
    pub async fn run_turn(&self, state: &mut ThreadState, input: &str) -> TurnReport {
        let mut path = Vec::new();
        let mut agent_steps = 0;
        let mut node = Node::Start;

        loop {
            path.push(node);
            debug!("Thread {} entering {node:?}", state.thread_id);

            node = match node {
                Node::End => break,
                Node::Start => {
                    state.apply(StateDelta::message(Message::user(input)));
                    match self.flow {
                        Flow::Rag { .. } => Node::Retrieve,
                        Flow::Agent { .. } => Node::Agent,
                    }
                }
                Node::Retrieve => {
                    let (delta, next) = self.retrieve(state).await;
                    state.apply(delta);
                    next
                }
                Node::Generate => {
                    let delta = self.generate(state).await;
                    state.apply(delta);
                    Node::End
                }
                Node::Agent if agent_steps >= self.max_agent_steps => {
                    warn!(
                        "Thread {} hit the agent step limit ({})",
                        state.thread_id, self.max_agent_steps
                    );
                    state.apply(StateDelta::message(Message::assistant(
                        &self.step_limit_message,
                    )));
                    Node::End
                }
                Node::Agent => {
                    agent_steps += 1;
                    let delta = self.agent_step(state).await;
                    state.apply(delta);
                    route_after_agent(state)
                }
                Node::ToolExec => {
                    let delta = self.execute_tools(state).await;
                    state.apply(delta);
                    Node::Agent
                }
            };
        }

        let answer = state
            .last_assistant()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        info!(
            "Thread {} turn finished after {} nodes",
            state.thread_id,
            path.len()
        );
        TurnReport { answer, path }
    }

    async fn retrieve(&self, state: &ThreadState) -> (StateDelta, Node) {
        let Flow::Rag { retriever } = &self.flow else {
            return (self.unavailable(), Node::End);
        };

        let question = state
            .last_user()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        match retriever.search(&question, self.top_k).await {
            Ok(cases) => {
                debug!("Retrieved {} cases", cases.len());
                let context = cases.join(&self.context_separator);
                (
                    StateDelta::default()
                        .with_question(question)
                        .with_context(context),
                    Node::Generate,
                )
            }
            Err(e) => {
                warn!("Retrieval failed: {e}");
                (
                    self.unavailable().with_question(question).with_context(""),
                    Node::End,
                )
            }
        }
    }

    async fn generate(&self, state: &ThreadState) -> StateDelta {
        // The in-flight user message is the question, not history.
        let earlier = match state.messages.split_last() {
            Some((_, earlier)) => earlier,
            None => &[],
        };

        let prompt = RagPrompt {
            history: format_transcript(earlier),
            context: state.scratch.context.clone(),
            question: state.scratch.question.clone(),
        };

        match self.generator.answer(&prompt).await {
            Ok(answer) => StateDelta::message(Message::assistant(answer)),
            Err(e) => {
                warn!("Generator {} failed: {e}", self.generator.name());
                self.unavailable()
            }
        }
    }

    async fn agent_step(&self, state: &ThreadState) -> StateDelta {
        let descriptors = match &self.flow {
            Flow::Agent { tools } => tools.descriptors(),
            Flow::Rag { .. } => Vec::new(),
        };

        match self.generator.chat(&state.messages, &descriptors).await {
            Ok(reply) => {
                debug!("Agent requested {} tool calls", reply.tool_calls.len());
                StateDelta::message(reply.into_message())
            }
            Err(e) => {
                warn!("Generator {} failed: {e}", self.generator.name());
                self.unavailable()
            }
        }
    }

    async fn execute_tools(&self, state: &ThreadState) -> StateDelta {
        let Flow::Agent { tools } = &self.flow else {
            return StateDelta::default();
        };
        let Some(request) = state.last_assistant() else {
            return StateDelta::default();
        };

        let mut results = Vec::with_capacity(request.tool_calls.len());
        for call in &request.tool_calls {
            let content = match tools.dispatch(call).await {
                Ok(output) => output,
                Err(e) => {
                    warn!("Tool call {} ({}) failed: {e}", call.id, call.name);
                    format!("Error: {e}")
                }
            };
            results.push(Message::tool_result(&call.id, content));
        }
        StateDelta::messages(results)
    }

    fn unavailable(&self) -> StateDelta {
        StateDelta::message(Message::assistant(&self.unavailable_message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DialogueError, Result};
    use crate::generator::AgentReply;
    use crate::message::Role;
    use crate::state::ThreadId;
    use async_trait::async_trait;
    use casebook_embeddings::{Encoder, HashingEncoder, VectorIndex};
    use casebook_retrieval::Corpus;
    use casebook_tools::{CalculatorTool, ToolCall, ToolDescriptor};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Replays canned agent replies, then fails.
    struct ScriptedGenerator {
        replies: Mutex<VecDeque<AgentReply>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<AgentReply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn answer(&self, prompt: &RagPrompt) -> Result<String> {
            Ok(format!("answer to {}", prompt.question))
        }

        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolDescriptor],
        ) -> Result<AgentReply> {
            self.replies
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| DialogueError::Generator("script exhausted".to_string()))
        }
    }

    /// Grounded answers always fail.
    struct BrokenAnswers;

    #[async_trait]
    impl Generator for BrokenAnswers {
        fn name(&self) -> &str {
            "broken"
        }

        async fn answer(&self, _prompt: &RagPrompt) -> Result<String> {
            Err(DialogueError::Generator("503: overloaded".to_string()))
        }

        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolDescriptor],
        ) -> Result<AgentReply> {
            Err(DialogueError::GeneratorNotConfigured)
        }
    }

    async fn retriever() -> Arc<Retriever> {
        let encoder = Arc::new(HashingEncoder::new(64));
        let texts = vec![
            "Nombre: A, ansiedad por examen".to_string(),
            "Nombre: B, insomnio por estrés laboral".to_string(),
        ];
        let vectors = encoder.encode_batch(&texts).await.unwrap();
        let index = VectorIndex::build(64, vectors).unwrap();
        Arc::new(Retriever::new(encoder, index, Corpus::from_texts(texts)).unwrap())
    }

    fn calculator_call(id: &str, expression: &str) -> ToolCall {
        ToolCall::new(id, "calculator", json!({"expression": expression}))
    }

    fn tools() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::new().with_tool(Arc::new(CalculatorTool)).unwrap())
    }

    fn state_with(messages: Vec<Message>) -> ThreadState {
        let mut state = ThreadState::new(ThreadId::from("t1"));
        state.apply(StateDelta::messages(messages));
        state
    }

    #[test]
    fn test_route_tool_call_reply_goes_to_tool_exec() {
        let state = state_with(vec![
            Message::user("2*3?"),
            AgentReply::tool_calls(vec![calculator_call("c1", "2*3")]).into_message(),
        ]);
        assert_eq!(route_after_agent(&state), Node::ToolExec);
    }

    #[test]
    fn test_route_plain_reply_ends() {
        let state = state_with(vec![Message::user("hola"), Message::assistant("hola")]);
        assert_eq!(route_after_agent(&state), Node::End);
        assert_eq!(route_after_agent(&state_with(Vec::new())), Node::End);
    }

    #[test]
    fn test_transcript_format() {
        let messages = vec![
            Message::user("¿qué le pasa a B?"),
            AgentReply::tool_calls(vec![calculator_call("c1", "1")]).into_message(),
            Message::assistant("B tiene insomnio"),
        ];
        assert_eq!(
            format_transcript(&messages),
            "user: ¿qué le pasa a B?\nassistant: B tiene insomnio"
        );
    }

    #[tokio::test]
    async fn test_rag_turn_walks_retrieve_then_generate() {
        let controller =
            DialogueController::rag(retriever().await, ScriptedGenerator::new(Vec::new()));
        let mut state = ThreadState::new(ThreadId::from("t1"));

        let report = controller.run_turn(&mut state, "insomnio").await;

        assert_eq!(report.answer, "answer to insomnio");
        assert_eq!(
            report.path,
            vec![Node::Start, Node::Retrieve, Node::Generate, Node::End]
        );
        assert_eq!(state.scratch.question, "insomnio");
        assert!(state.scratch.context.contains("Nombre: B"));
        assert_eq!(state.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_rag_generate_failure_becomes_message() {
        let controller = DialogueController::rag(retriever().await, Arc::new(BrokenAnswers))
            .with_unavailable_message("no disponible");
        let mut state = state_with(vec![Message::user("hola"), Message::assistant("hola")]);
        let earlier = state.messages.clone();

        let report = controller.run_turn(&mut state, "insomnio").await;

        assert_eq!(report.answer, "no disponible");
        assert_eq!(
            report.path,
            vec![Node::Start, Node::Retrieve, Node::Generate, Node::End]
        );
        assert_eq!(state.messages.len(), earlier.len() + 2);
        assert_eq!(&state.messages[..earlier.len()], earlier.as_slice());
        assert_eq!(state.messages[3].role, Role::Assistant);
        assert_eq!(state.messages[3].content, "no disponible");
    }

    #[tokio::test]
    async fn test_zero_step_bound_still_runs_one_step() {
        let generator = ScriptedGenerator::new(vec![AgentReply::text("hola")]);
        let controller = DialogueController::agent(tools(), generator).with_max_agent_steps(0);
        let mut state = ThreadState::new(ThreadId::from("t1"));

        let report = controller.run_turn(&mut state, "hola").await;

        assert_eq!(report.answer, "hola");
        assert_eq!(report.path, vec![Node::Start, Node::Agent, Node::End]);
    }

    #[tokio::test]
    async fn test_agent_runs_tools_then_answers() {
        let generator = ScriptedGenerator::new(vec![
            AgentReply::tool_calls(vec![
                calculator_call("c1", "2*3"),
                calculator_call("c2", "1/0"),
            ]),
            AgentReply::text("El resultado es 6"),
        ]);
        let controller = DialogueController::agent(tools(), generator);
        let mut state = ThreadState::new(ThreadId::from("t1"));

        let report = controller.run_turn(&mut state, "¿2*3?").await;

        assert_eq!(report.answer, "El resultado es 6");
        assert_eq!(
            report.path,
            vec![
                Node::Start,
                Node::Agent,
                Node::ToolExec,
                Node::Agent,
                Node::End
            ]
        );
        let roles: Vec<Role> = state.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Assistant]
        );
        assert_eq!(state.messages[2].content, "2*3 = 6");
        assert_eq!(state.messages[2].tool_call_id.as_deref(), Some("c1"));
        assert!(state.messages[3].content.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_and_loop_continues() {
        let generator = ScriptedGenerator::new(vec![
            AgentReply::tool_calls(vec![ToolCall::new("c1", "shell", json!({"cmd": "ls"}))]),
            AgentReply::text("No puedo hacer eso"),
        ]);
        let controller = DialogueController::agent(tools(), generator);
        let mut state = ThreadState::new(ThreadId::from("t1"));

        let report = controller.run_turn(&mut state, "lista archivos").await;

        assert_eq!(report.answer, "No puedo hacer eso");
        assert_eq!(state.messages[2].content, "Error: unknown tool: shell");
    }

    #[tokio::test]
    async fn test_agent_step_limit() {
        let replies = (0..10)
            .map(|i| AgentReply::tool_calls(vec![calculator_call(&format!("c{i}"), "1+1")]))
            .collect();
        let controller = DialogueController::agent(tools(), ScriptedGenerator::new(replies))
            .with_max_agent_steps(2)
            .with_step_limit_message("limit");
        let mut state = ThreadState::new(ThreadId::from("t1"));

        let report = controller.run_turn(&mut state, "loop").await;

        assert_eq!(report.answer, "limit");
        assert_eq!(
            report.path.iter().filter(|n| **n == Node::Agent).count(),
            3
        );
        assert_eq!(report.path.last(), Some(&Node::End));
    }

    #[tokio::test]
    async fn test_generator_failure_becomes_message() {
        let controller = DialogueController::agent(tools(), ScriptedGenerator::new(Vec::new()))
            .with_unavailable_message("no disponible");
        let mut state = ThreadState::new(ThreadId::from("t1"));

        let report = controller.run_turn(&mut state, "hola").await;

        assert_eq!(report.answer, "no disponible");
        assert_eq!(state.messages.len(), 2);
        assert_eq!(report.path, vec![Node::Start, Node::Agent, Node::End]);
    }
}
